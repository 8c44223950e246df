//! relay – command-line HTML → PDF converter.
//!
//! Usage:
//!   relay <input.html> [output.pdf] [--paper a4] [--landscape] [--title "My Report"]
//!         [--options opts.json] [--range "bytes=0-99"]
//!
//! If `output.pdf` is omitted the PDF is written next to the input file with
//! the same stem (e.g. `report.html` → `report.pdf`). With `--range` the
//! selected byte window is written instead of the whole document, exactly as
//! an HTTP client asking for that range would receive it.

use std::{env, fs, path::PathBuf, process};

use http::{header, HeaderMap, HeaderValue, Method};
use pdf_relay::{
    DocumentSource, FlowPdfFactory, Orientation, PaperSize, PdfFactory,
    RenderOptions, RequestHead, Result, StreamResponse,
};

struct Args {
    input: PathBuf,
    output: Option<PathBuf>,
    paper: Option<String>,
    landscape: bool,
    title: Option<String>,
    options: Option<PathBuf>,
    range: Option<String>,
}

fn main() {
    env_logger::init();

    let argv: Vec<String> = env::args().collect();
    let args = parse_args(&argv);

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn parse_args(argv: &[String]) -> Args {
    let prog = argv.first().map(String::as_str).unwrap_or("relay");
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut paper = None;
    let mut landscape = false;
    let mut title = None;
    let mut options = None;
    let mut range = None;
    let mut positional = 0usize;

    let mut iter = argv.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--landscape" | "-l" => landscape = true,
            "--title" | "-t" => title = Some(value_for(prog, arg, iter.next())),
            "--paper" | "-p" => paper = Some(value_for(prog, arg, iter.next())),
            "--options" | "-o" => options = Some(PathBuf::from(value_for(prog, arg, iter.next()))),
            "--range" | "-r" => range = Some(value_for(prog, arg, iter.next())),
            "--help" | "-h" => {
                print_usage(prog);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(prog);
                process::exit(1);
            }
            path => {
                if positional == 0 {
                    input = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output = Some(PathBuf::from(path));
                } else {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(prog);
                    process::exit(1);
                }
                positional += 1;
            }
        }
    }

    let Some(input) = input else {
        eprintln!("Error: no input file specified.");
        print_usage(prog);
        process::exit(1);
    };

    Args {
        input,
        output,
        paper,
        landscape,
        title,
        options,
        range,
    }
}

fn value_for(prog: &str, flag: &str, value: Option<&String>) -> String {
    match value {
        Some(v) => v.clone(),
        None => {
            eprintln!("Flag {flag} needs a value");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<()> {
    let options = match &args.options {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| pdf_relay::Error::io(path, e))?;
            RenderOptions::from_json(&json)?
        }
        None => RenderOptions::new(),
    };

    let factory = FlowPdfFactory::from_env();
    let mut doc = factory.make(&options)?;

    let effective = if options.is_empty() { factory.defaults() } else { &options };
    if args.paper.is_some() || args.landscape {
        let paper = match &args.paper {
            Some(name) => name.parse::<PaperSize>()?,
            None => effective.paper_size()?.unwrap_or_default(),
        };
        let orientation = if args.landscape {
            Orientation::Landscape
        } else {
            effective.orientation()?.unwrap_or_default()
        };
        doc.set_paper(paper, orientation);
    }

    let title = args.title.unwrap_or_else(|| {
        args.input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("relay output")
            .to_string()
    });
    doc.add_metadata([("Title", title.as_str()), ("Creator", "pdf-relay")]);
    doc.load(DocumentSource::Path(args.input.clone()), None)?;

    let output = args.output.unwrap_or_else(|| {
        let mut o = args.input.clone();
        o.set_extension("pdf");
        o
    });
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| pdf_relay::Error::io(parent, e))?;
        }
    }

    match args.range {
        None => {
            let written = doc.write_to_file(&output)?;
            eprintln!("Wrote '{}' ({written} bytes)", output.display());
        }
        Some(range) => {
            let mut headers = HeaderMap::new();
            let value = HeaderValue::from_str(&range)
                .map_err(|_| pdf_relay::Error::MalformedRange(range.clone()))?;
            headers.insert(header::RANGE, value);
            let request = RequestHead::new(Method::GET, headers);

            let prepared = StreamResponse::from_bytes(doc.render()?)
                .with_content_type("application/pdf")
                .prepare(&request)?;
            let status = prepared.status();
            let content_range = prepared
                .envelope()
                .header_str(header::CONTENT_RANGE)
                .unwrap_or("-")
                .to_string();
            let mut file = fs::File::create(&output).map_err(|e| pdf_relay::Error::io(&output, e))?;
            let written = prepared.send(&mut file)?;
            eprintln!(
                "Wrote '{}' ({written} bytes, status {status}, Content-Range {content_range})",
                output.display()
            );
        }
    }

    Ok(())
}

fn print_usage(prog: &str) {
    eprintln!("relay – HTML to PDF converter (pdf-relay)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input.html> [output.pdf] [--paper a4] [--landscape] [--title \"My Report\"]");
    eprintln!("        [--options opts.json] [--range \"bytes=0-99\"]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <input.html>   HTML file to convert");
    eprintln!("  [output.pdf]   Output path  (default: same stem as input with .pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --paper, -p    Paper size: a3, a4, a5, letter, legal or WxH in points");
    eprintln!("  --landscape    Use landscape page orientation");
    eprintln!("  --title, -t    Document title in PDF metadata (default: input filename stem)");
    eprintln!("  --options, -o  JSON file with render options");
    eprintln!("  --range, -r    Write only this byte range of the rendered PDF");
    eprintln!("  --help         Print this message");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PDF_RELAY_*    Default render options (e.g. PDF_RELAY_DEFAULT_PAPER_SIZE=letter)");
    eprintln!("  RUST_LOG       Log verbosity (e.g. RUST_LOG=debug)");
}
