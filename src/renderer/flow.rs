//! Flow renderer – lays scanned text blocks out top to bottom and emits PDF
//! bytes using `printpdf` (v0.8 ops-based API).
//!
//! This is a text-flow backend, not a layout engine: every block starts on a
//! new line, text is word-wrapped with an average-advance heuristic, and
//! lines spill onto new pages when the bottom margin is reached.

use std::fs;

use printpdf::*;

use crate::error::{Error, Result};
use crate::options::{self, Metadata, Orientation, PaperSize, RenderOptions};
use crate::renderer::markup::{self, BlockKind};
use crate::renderer::{security, Capabilities, Renderer};

const DEFAULT_TITLE: &str = "Document";
const LIST_INDENT_PT: f32 = 18.0;

/// Builtin PDF font family used for all text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontFamily {
    #[default]
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    fn from_option(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "helvetica" | "arial" | "sans-serif" => Some(FontFamily::Helvetica),
            "times" | "times-roman" | "serif" => Some(FontFamily::Times),
            "courier" | "monospace" => Some(FontFamily::Courier),
            _ => None,
        }
    }

    fn builtin(self, bold: bool) -> BuiltinFont {
        match (self, bold) {
            (FontFamily::Helvetica, false) => BuiltinFont::Helvetica,
            (FontFamily::Helvetica, true) => BuiltinFont::HelveticaBold,
            (FontFamily::Times, false) => BuiltinFont::TimesRoman,
            (FontFamily::Times, true) => BuiltinFont::TimesBold,
            (FontFamily::Courier, false) => BuiltinFont::Courier,
            (FontFamily::Courier, true) => BuiltinFont::CourierBold,
        }
    }

    /// Average glyph advance as a fraction of the font size.
    fn average_advance(self, bold: bool) -> f32 {
        match (self, bold) {
            (FontFamily::Courier, _) => 0.6,
            (_, true) => 0.55,
            (_, false) => 0.5,
        }
    }
}

/// One line of text placed on a page, origin at the page's top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    /// Distance from the top of the page to the top of the line box.
    pub y: f32,
    pub font_size: f32,
    pub bold: bool,
}

/// Pages of placed lines, ready for emission.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowLayout {
    pub title: String,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<Vec<PlacedLine>>,
}

/// The built-in [`Renderer`].
#[derive(Debug, Clone)]
pub struct FlowRenderer {
    html: Option<String>,
    paper: PaperSize,
    orientation: Orientation,
    family: FontFamily,
    font_size: f32,
    margin: f32,
    line_height: f32,
    remote_enabled: bool,
    info: Metadata,
    output: Option<Vec<u8>>,
}

impl Default for FlowRenderer {
    fn default() -> Self {
        Self {
            html: None,
            paper: PaperSize::A4,
            orientation: Orientation::Portrait,
            family: FontFamily::Helvetica,
            font_size: 12.0,
            margin: 40.0,
            line_height: 1.4,
            remote_enabled: false,
            info: Vec::new(),
            output: None,
        }
    }
}

impl FlowRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer with `options` already applied.
    pub fn with_options(options: &RenderOptions) -> Result<Self> {
        let mut renderer = Self::new();
        renderer.set_options(options)?;
        Ok(renderer)
    }

    fn info_value(&self, key: &str) -> Option<&str> {
        self.info
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Lay the loaded HTML out into pages without producing PDF bytes.
    pub fn layout(&self) -> Result<FlowLayout> {
        let html = self
            .html
            .as_deref()
            .ok_or(Error::NotInitialized("no HTML has been loaded"))?;
        let doc = markup::parse(html);

        let (page_w, page_h) = self.paper.oriented(self.orientation);
        let content_w = page_w - 2.0 * self.margin;
        let bottom = page_h - self.margin;
        if content_w <= 0.0 || bottom <= self.margin {
            return Err(Error::Options(format!(
                "margin {} leaves no room on a {page_w}x{page_h} page",
                self.margin
            )));
        }

        let title = self
            .info_value("Title")
            .map(str::to_string)
            .or(doc.title)
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let mut pages: Vec<Vec<PlacedLine>> = Vec::new();
        let mut page: Vec<PlacedLine> = Vec::new();
        let mut y = self.margin;

        for block in &doc.blocks {
            let (size, bold, indent, marker) = match &block.kind {
                BlockKind::Heading(level) => (self.font_size * heading_scale(*level), true, 0.0, None),
                BlockKind::Paragraph => (self.font_size, false, 0.0, None),
                BlockKind::ListItem { marker, depth } => (
                    self.font_size,
                    false,
                    LIST_INDENT_PT * *depth as f32,
                    (!marker.is_empty()).then_some(marker.as_str()),
                ),
            };
            let advance = size * self.line_height;
            let x = self.margin + indent;
            let lines = wrap_text(
                &block.text,
                size,
                self.family.average_advance(bold),
                content_w - indent,
            );

            for (i, line) in lines.into_iter().enumerate() {
                if y + advance > bottom && y > self.margin {
                    pages.push(std::mem::take(&mut page));
                    y = self.margin;
                }
                if i == 0 {
                    if let Some(marker) = marker {
                        page.push(PlacedLine {
                            text: marker.to_string(),
                            x: x - LIST_INDENT_PT * 0.75,
                            y,
                            font_size: size,
                            bold: false,
                        });
                    }
                }
                if !line.is_empty() {
                    page.push(PlacedLine {
                        text: line,
                        x,
                        y,
                        font_size: size,
                        bold,
                    });
                }
                y += advance;
            }
            y += size * 0.5;
        }
        pages.push(page);

        Ok(FlowLayout {
            title,
            page_width_pt: page_w,
            page_height_pt: page_h,
            pages,
        })
    }

    fn emit(&self, layout: &FlowLayout) -> Vec<u8> {
        let page_w = Mm(layout.page_width_pt * 0.352778); // pt → mm
        let page_h = Mm(layout.page_height_pt * 0.352778);

        let mut doc = PdfDocument::new(&layout.title);
        if let Some(author) = self.info_value("Author") {
            doc.metadata.info.author = author.to_string();
        }
        if let Some(subject) = self.info_value("Subject") {
            doc.metadata.info.subject = subject.to_string();
        }
        if let Some(creator) = self.info_value("Creator") {
            doc.metadata.info.creator = creator.to_string();
        }
        if let Some(keywords) = self.info_value("Keywords") {
            doc.metadata.info.keywords = keywords
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }

        let pages = layout
            .pages
            .iter()
            .map(|lines| {
                let mut ops = Vec::new();
                for line in lines {
                    push_line(&mut ops, line, self.family, layout.page_height_pt);
                }
                PdfPage::new(page_w, page_h, ops)
            })
            .collect();

        doc.with_pages(pages);
        // Raw text ops are dropped unless `secure` is off.
        let save = PdfSaveOptions {
            secure: false,
            ..PdfSaveOptions::default()
        };
        doc.save(&save, &mut Vec::new())
    }
}

impl Renderer for FlowRenderer {
    fn load_html(&mut self, html: &str, _encoding: Option<&str>) -> Result<()> {
        self.html = Some(html.to_string());
        self.output = None;
        Ok(())
    }

    fn load_html_file(&mut self, location: &str, encoding: Option<&str>) -> Result<()> {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            if !self.remote_enabled {
                return Err(Error::InvalidInput(format!(
                    "remote resource '{location}' requested but is_remote_enabled is off"
                )));
            }
            return Err(Error::Unsupported(
                "the flow renderer cannot fetch remote resources".to_string(),
            ));
        }
        let path = location.strip_prefix("file://").unwrap_or(location);
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let html = decode_bytes(bytes, encoding)?;
        log::debug!("loaded {} bytes of HTML from {path}", html.len());
        self.load_html(&html, encoding)
    }

    fn set_paper(&mut self, paper: PaperSize, orientation: Orientation) {
        self.paper = paper;
        self.orientation = orientation;
    }

    fn set_options(&mut self, options: &RenderOptions) -> Result<()> {
        if let Some(paper) = options.paper_size()? {
            self.paper = paper;
        }
        if let Some(orientation) = options.orientation()? {
            self.orientation = orientation;
        }
        if let Some(font) = options.get_str(options::DEFAULT_FONT) {
            self.family = FontFamily::from_option(font).unwrap_or_else(|| {
                log::warn!("font '{font}' is not a builtin family, using Helvetica");
                FontFamily::Helvetica
            });
        }
        if let Some(size) = options.get_f32(options::DEFAULT_FONT_SIZE) {
            self.font_size = positive(options::DEFAULT_FONT_SIZE, size)?;
        }
        if let Some(margin) = options.get_f32(options::MARGIN) {
            if margin < 0.0 {
                return Err(Error::Options(format!("margin must not be negative, got {margin}")));
            }
            self.margin = margin;
        }
        if let Some(lh) = options.get_f32(options::LINE_HEIGHT) {
            self.line_height = positive(options::LINE_HEIGHT, lh)?;
        }
        if let Some(remote) = options.get_bool(options::IS_REMOTE_ENABLED) {
            self.remote_enabled = remote;
        }
        for key in options.unknown_keys() {
            log::debug!("flow renderer ignores option '{key}'");
        }
        Ok(())
    }

    fn add_info(&mut self, key: &str, value: &str) {
        self.info.push((key.to_string(), value.to_string()));
    }

    fn render(&mut self) -> Result<()> {
        let layout = self.layout()?;
        log::debug!(
            "rendering '{}' onto {} page(s)",
            layout.title,
            layout.pages.len()
        );
        self.output = Some(self.emit(&layout));
        Ok(())
    }

    fn output(&self) -> Result<Vec<u8>> {
        self.output
            .clone()
            .ok_or(Error::NotInitialized("render() has not been called"))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { encryption: true }
    }

    /// Encrypts the current output in place. The next `render` starts
    /// from plain bytes again, so the caller re-applies the password.
    fn encrypt(&mut self, user_password: &str, owner_password: &str) -> Result<()> {
        let plain = self
            .output
            .as_deref()
            .ok_or(Error::NotInitialized("render() has not been called"))?;
        let encrypted = security::encrypt_pdf(plain, user_password, owner_password)?;
        self.output = Some(encrypted);
        Ok(())
    }
}

fn positive(name: &str, value: f32) -> Result<f32> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(Error::Options(format!("{name} must be positive, got {value}")))
    }
}

fn heading_scale(level: u8) -> f32 {
    match level {
        1 => 2.0,
        2 => 1.5,
        3 => 1.25,
        4 => 1.1,
        5 => 1.0,
        _ => 0.9,
    }
}

/// Decode file bytes. Latin-1 family encodings map bytes 1:1 onto code
/// points; everything else must be UTF-8.
fn decode_bytes(bytes: Vec<u8>, encoding: Option<&str>) -> Result<String> {
    match encoding.map(|e| e.trim().to_ascii_lowercase()) {
        Some(e) if matches!(e.as_str(), "iso-8859-1" | "latin1" | "latin-1" | "windows-1252") => {
            Ok(bytes.into_iter().map(char::from).collect())
        }
        _ => String::from_utf8(bytes)
            .map_err(|e| Error::InvalidInput(format!("HTML source is not valid UTF-8: {e}"))),
    }
}

/// Word-wrap text to fit within `max_width` points. `\n` forces a break.
pub fn wrap_text(text: &str, font_size: f32, advance: f32, max_width: f32) -> Vec<String> {
    let measure = |s: &str| s.chars().count() as f32 * font_size * advance;
    let mut lines: Vec<String> = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) > max_width && !current.is_empty() {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}

fn push_line(ops: &mut Vec<Op>, line: &PlacedLine, family: FontFamily, page_height: f32) {
    let font = family.builtin(line.bold);
    // PDF origin is bottom-left; baseline ≈ top of line + 0.75 × size.
    let baseline = page_height - line.y - line.font_size * 0.75;

    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(line.x),
            y: Pt(baseline),
        },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(line.font_size),
        font,
    });
    ops.push(Op::SetFillColor {
        col: Color::Rgb(Rgb {
            r: 0.0,
            g: 0.0,
            b: 0.0,
            icc_profile: None,
        }),
    });
    // An empty text op registers the font resource on the page; the glyph
    // bytes follow as a raw `Tj` so they reach the stream without a UTF-8
    // round trip.
    ops.push(Op::WriteTextBuiltinFont {
        items: Vec::new(),
        font,
    });
    ops.push(Op::Unknown {
        key: "Tj".to_string(),
        value: vec![DictItem::String {
            data: to_winansi(&line.text),
            literal: true,
        }],
    });
    ops.push(Op::EndTextSection);
}

/// Encode text as WinAnsiEncoding (Windows-1252) bytes, one per glyph, as
/// builtin fonts expect. Unmappable characters become `?`.
fn to_winansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}
