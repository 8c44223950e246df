//! Integration tests for pdf-relay.
//!
//! These tests validate:
//! - Range handling on rendered documents (status, headers, body window)
//! - Output path resolution
//! - The document adapter's delegation, memoization and encryption binding
//! - Download and stream responses, including temp-file cleanup

use std::cell::RefCell;
use std::rc::Rc;

use http::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use pdf_relay::options::{self, Orientation, PaperSize};
use pdf_relay::path::resolve;
use pdf_relay::renderer::Capabilities;
use pdf_relay::{
    Disposition, DocumentConfig, DocumentSource, Error, FlowPdfFactory, FlowRenderer,
    InvertedRangePolicy, PdfDocument, PdfFactory, RenderOptions, Renderer, RequestHead, Result,
    StreamResponse,
};

// =====================================================================
// Helpers
// =====================================================================

fn source_1000() -> Vec<u8> {
    (0..1000u32).map(|i| (i * 7 % 256) as u8).collect()
}

fn ranged(range: &'static str) -> RequestHead {
    let mut headers = HeaderMap::new();
    headers.insert("range", HeaderValue::from_static(range));
    RequestHead::new(Method::GET, headers)
}

fn serve(bytes: Vec<u8>, request: &RequestHead) -> http::Response<Vec<u8>> {
    StreamResponse::from_bytes(bytes)
        .into_http_response(request)
        .unwrap()
}

fn header<'a>(resp: &'a http::Response<Vec<u8>>, name: http::header::HeaderName) -> &'a str {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

const SAMPLE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Quarterly Report</title><style>p { color: red }</style></head>
<body>
  <h1>Quarterly Report</h1>
  <p>Revenue grew &amp; costs fell.</p>
  <ul><li>North</li><li>South</li></ul>
  <table><tr><td>Q1</td><td>100</td></tr></table>
</body>
</html>"#;

// =====================================================================
// Range handling
// =====================================================================

#[test]
fn full_response_reports_exact_length() {
    let mut doc = FlowPdfFactory::default().make(&RenderOptions::new()).unwrap();
    doc.load_html(SAMPLE_HTML, None).unwrap();
    let bytes = doc.render().unwrap();
    let resp = serve(bytes.clone(), &RequestHead::get());
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, CONTENT_LENGTH), bytes.len().to_string());
    assert_eq!(header(&resp, ACCEPT_RANGES), "bytes");
    assert_eq!(resp.body(), &bytes);
}

#[test]
fn closed_range_returns_partial_content() {
    let resp = serve(source_1000(), &ranged("bytes=0-99"));
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&resp, CONTENT_RANGE), "bytes 0-99/1000");
    assert_eq!(header(&resp, CONTENT_LENGTH), "100");
    assert_eq!(resp.body(), &source_1000()[..100]);
}

#[test]
fn open_ended_and_suffix_ranges_agree() {
    let open = serve(source_1000(), &ranged("bytes=900-"));
    let suffix = serve(source_1000(), &ranged("bytes=-100"));
    for resp in [&open, &suffix] {
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header(resp, CONTENT_RANGE), "bytes 900-999/1000");
        assert_eq!(header(resp, CONTENT_LENGTH), "100");
    }
    assert_eq!(open.body(), suffix.body());
    assert_eq!(open.body(), &source_1000()[900..]);
}

#[test]
fn out_of_bounds_range_is_416() {
    let resp = serve(source_1000(), &ranged("bytes=1000-1100"));
    assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header(&resp, CONTENT_RANGE), "bytes */1000");
    assert!(resp.body().is_empty());
}

#[test]
fn mismatched_if_range_serves_full_body() {
    let mut headers = HeaderMap::new();
    headers.insert("range", HeaderValue::from_static("bytes=0-99"));
    headers.insert("if-range", HeaderValue::from_static("\"stale\""));
    let request = RequestHead::new(Method::GET, headers);

    let resp = StreamResponse::from_bytes(source_1000())
        .with_etag("\"fresh\"")
        .unwrap()
        .into_http_response(&request)
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, CONTENT_LENGTH), "1000");
    assert!(resp.headers().get(CONTENT_RANGE).is_none());
}

#[test]
fn inverted_range_policy() {
    let full = serve(source_1000(), &ranged("bytes=500-100"));
    assert_eq!(full.status(), StatusCode::OK);
    assert_eq!(full.body().len(), 1000);

    let rejected = StreamResponse::from_bytes(source_1000())
        .with_inverted_range_policy(InvertedRangePolicy::Reject)
        .into_http_response(&ranged("bytes=500-100"))
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[test]
fn malformed_range_is_reported() {
    let err = StreamResponse::from_bytes(source_1000())
        .prepare(&ranged("bytes=ten-twenty"))
        .unwrap_err();
    assert!(matches!(err, Error::MalformedRange(_)));
}

#[test]
fn send_writes_window_to_writer() {
    let prepared = StreamResponse::from_bytes(source_1000())
        .prepare(&ranged("bytes=10-19"))
        .unwrap();
    let mut out = Vec::new();
    let written = prepared.send(&mut out).unwrap();
    assert_eq!(written, 10);
    assert_eq!(out, &source_1000()[10..20]);
}

// =====================================================================
// Output paths
// =====================================================================

#[cfg(unix)]
#[test]
fn resolve_ignores_trailing_separator() {
    assert_eq!(resolve("/tmp/docs", "report.pdf"), "/tmp/docs/report.pdf");
    assert_eq!(resolve("/tmp/docs/", "report.pdf"), "/tmp/docs/report.pdf");
}

// =====================================================================
// Document adapter
// =====================================================================

#[derive(Debug, Default)]
struct Calls {
    loaded: Vec<String>,
    papers: Vec<(PaperSize, Orientation)>,
    options: Vec<RenderOptions>,
    info: Vec<(String, String)>,
    renders: usize,
    encrypted: Vec<(String, String)>,
    capability_checks: usize,
}

/// Renderer that records every call made to it.
#[derive(Debug)]
struct RecordingRenderer {
    calls: Rc<RefCell<Calls>>,
    encryption: bool,
    output: Option<Vec<u8>>,
}

impl RecordingRenderer {
    fn new(encryption: bool) -> (Self, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let renderer = Self {
            calls: Rc::clone(&calls),
            encryption,
            output: None,
        };
        (renderer, calls)
    }
}

impl Renderer for RecordingRenderer {
    fn load_html(&mut self, html: &str, _encoding: Option<&str>) -> Result<()> {
        self.calls.borrow_mut().loaded.push(html.to_string());
        Ok(())
    }

    fn load_html_file(&mut self, location: &str, _encoding: Option<&str>) -> Result<()> {
        self.calls.borrow_mut().loaded.push(format!("file:{location}"));
        Ok(())
    }

    fn set_paper(&mut self, paper: PaperSize, orientation: Orientation) {
        self.calls.borrow_mut().papers.push((paper, orientation));
    }

    fn set_options(&mut self, options: &RenderOptions) -> Result<()> {
        self.calls.borrow_mut().options.push(options.clone());
        Ok(())
    }

    fn add_info(&mut self, key: &str, value: &str) {
        self.calls
            .borrow_mut()
            .info
            .push((key.to_string(), value.to_string()));
    }

    fn render(&mut self) -> Result<()> {
        let mut calls = self.calls.borrow_mut();
        calls.renders += 1;
        self.output = Some(format!("%PDF-fake render {}", calls.renders).into_bytes());
        Ok(())
    }

    fn output(&self) -> Result<Vec<u8>> {
        self.output
            .clone()
            .ok_or(Error::NotInitialized("nothing rendered"))
    }

    fn capabilities(&self) -> Capabilities {
        self.calls.borrow_mut().capability_checks += 1;
        Capabilities {
            encryption: self.encryption,
        }
    }

    fn encrypt(&mut self, user_password: &str, owner_password: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .encrypted
            .push((user_password.to_string(), owner_password.to_string()));
        if let Some(out) = self.output.as_mut() {
            out.extend_from_slice(b" [locked]");
        }
        Ok(())
    }
}

#[test]
fn calls_are_delegated_to_renderer() {
    let (renderer, calls) = RecordingRenderer::new(false);
    let mut doc = PdfDocument::new(renderer);
    doc.load_html("<p>hi</p>", Some("utf-8"))
        .unwrap()
        .set_paper(PaperSize::LETTER, Orientation::Landscape)
        .add_metadata([("Author", "Ada")]);
    doc.set_options(&RenderOptions::new().with("custom_flag", true))
        .unwrap();
    doc.load(DocumentSource::Locator("/srv/page.html".to_string()), None)
        .unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.loaded, ["<p>hi</p>", "file:/srv/page.html"]);
    assert_eq!(calls.papers, [(PaperSize::LETTER, Orientation::Landscape)]);
    assert_eq!(calls.info, [("Author".to_string(), "Ada".to_string())]);
    // Unknown keys reach the renderer untouched.
    assert_eq!(calls.options[0].get_bool("custom_flag"), Some(true));
}

#[test]
fn render_is_memoized_until_new_content() {
    let (renderer, calls) = RecordingRenderer::new(false);
    let mut doc = PdfDocument::new(renderer);
    doc.load_html("<p>one</p>", None).unwrap();

    let first = doc.render().unwrap();
    let second = doc.render().unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.borrow().renders, 1);

    doc.load_html("<p>two</p>", None).unwrap();
    let third = doc.render().unwrap();
    assert_eq!(calls.borrow().renders, 2);
    assert_ne!(first, third);
}

#[test]
fn capability_is_checked_once_at_construction() {
    let (renderer, calls) = RecordingRenderer::new(true);
    let mut doc = PdfDocument::new(renderer);
    assert_eq!(calls.borrow().capability_checks, 1);

    doc.load_html("<p>secret</p>", None).unwrap();
    doc.encrypt("hunter2").unwrap();
    doc.encrypt("hunter3").unwrap();
    assert_eq!(calls.borrow().capability_checks, 1);

    let calls_ref = calls.borrow();
    assert_eq!(
        calls_ref.encrypted.last(),
        Some(&("hunter3".to_string(), "hunter3".to_string()))
    );
    drop(calls_ref);
    assert!(doc.render().unwrap().ends_with(b"[locked]"));
}

#[test]
fn encryption_survives_rerender() {
    let (renderer, calls) = RecordingRenderer::new(true);
    let mut doc = PdfDocument::new(renderer);
    doc.load_html("<p>a</p>", None).unwrap();
    doc.encrypt("pw").unwrap();
    doc.load_html("<p>b</p>", None).unwrap();
    assert!(doc.render().unwrap().ends_with(b"[locked]"));
    assert_eq!(calls.borrow().encrypted.len(), 2);
}

#[test]
fn encrypt_without_capability_is_unsupported() {
    let (renderer, calls) = RecordingRenderer::new(false);
    let mut doc = PdfDocument::new(renderer);
    doc.load_html("<p>a</p>", None).unwrap();
    assert!(matches!(doc.encrypt("pw"), Err(Error::Unsupported(_))));
    assert!(calls.borrow().encrypted.is_empty());
}

#[test]
fn flow_renderer_writes_pdf_file() {
    let dir = tempfile::tempdir().unwrap();
    let html_path = dir.path().join("report.html");
    std::fs::write(&html_path, SAMPLE_HTML).unwrap();

    let mut doc = PdfDocument::new(FlowRenderer::new());
    doc.load(DocumentSource::Path(html_path), None).unwrap();
    doc.set_paper(PaperSize::A5, Orientation::Portrait);

    let out = dir.path().join("report.pdf");
    let written = doc.write_to_file(&out).unwrap();
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(written, bytes.len() as u64);
    assert_valid_pdf(&bytes);
}

#[test]
fn long_documents_paginate() {
    let paragraph = "<p>Lorem ipsum dolor sit amet, consectetur adipiscing elit. </p>";
    let html = paragraph.repeat(400);
    let mut renderer = FlowRenderer::new();
    renderer.load_html(&html, None).unwrap();
    let layout = renderer.layout().unwrap();
    assert!(layout.pages.len() > 1, "expected several pages");
}

#[test]
fn remote_resources_need_opt_in() {
    let mut doc = PdfDocument::new(FlowRenderer::new());
    assert!(matches!(
        doc.load_resource("https://example.com/page.html", None),
        Err(Error::InvalidInput(_))
    ));
    let opts = RenderOptions::new().with(options::IS_REMOTE_ENABLED, true);
    let mut doc = FlowPdfFactory::default().make(&opts).unwrap();
    assert!(matches!(
        doc.load_resource("https://example.com/page.html", None),
        Err(Error::Unsupported(_))
    ));
}

// =====================================================================
// Download and stream responses
// =====================================================================

#[test]
fn stream_response_is_inline_pdf() {
    let mut doc = PdfDocument::new(FlowRenderer::new());
    doc.load_html(SAMPLE_HTML, None).unwrap();
    let resp = doc
        .stream("report.pdf", Disposition::Inline)
        .unwrap()
        .into_http_response(&RequestHead::get())
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, CONTENT_TYPE), "application/pdf");
    assert_eq!(header(&resp, CONTENT_DISPOSITION), "inline; filename=\"report.pdf\"");
    assert_valid_pdf(resp.body());
}

#[test]
fn download_removes_temp_file_after_send() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = PdfDocument::with_config(FlowRenderer::new(), DocumentConfig::new(dir.path()));
    doc.load_html(SAMPLE_HTML, None).unwrap();
    let expected = doc.render().unwrap();

    let download = doc.download("Überblick.pdf", Disposition::Attachment).unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    let resp = download.into_http_response(&ranged("bytes=0-4")).unwrap();
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.body(), b"%PDF-");
    assert_eq!(
        header(&resp, CONTENT_RANGE),
        format!("bytes 0-4/{}", expected.len())
    );
    assert_eq!(
        header(&resp, CONTENT_DISPOSITION),
        "attachment; filename=\"_berblick.pdf\"; filename*=utf-8''%C3%9Cberblick.pdf"
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn download_with_malformed_range_still_removes_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = PdfDocument::with_config(FlowRenderer::new(), DocumentConfig::new(dir.path()));
    doc.load_html(SAMPLE_HTML, None).unwrap();

    let download = doc.download("report.pdf", Disposition::Attachment).unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    let err = download.into_http_response(&ranged("pages=1-2")).unwrap_err();
    assert!(matches!(err, Error::MalformedRange(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn head_request_keeps_file_length_without_body() {
    let mut doc = PdfDocument::new(FlowRenderer::new());
    doc.load_html(SAMPLE_HTML, None).unwrap();
    let size = doc.render().unwrap().len();
    let resp = doc
        .stream("report.pdf", Disposition::Attachment)
        .unwrap()
        .into_http_response(&RequestHead::new(Method::HEAD, HeaderMap::new()))
        .unwrap();
    assert_eq!(header(&resp, CONTENT_LENGTH), size.to_string());
    assert!(resp.body().is_empty());
}

#[test]
fn set_content_on_stream_response_is_rejected() {
    let mut resp = StreamResponse::from_bytes(source_1000());
    assert!(matches!(
        resp.set_content(Some(b"override".to_vec())),
        Err(Error::Logic(_))
    ));
}
