//! PDF download responses – a stream response with `application/pdf`, a
//! `Content-Disposition` and optional cleanup of the backing file.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use http::HeaderValue;

use crate::error::{Error, Result};
use crate::response::range::InvertedRangePolicy;
use crate::response::stream::{PreparedResponse, StreamResponse};
use crate::response::RequestHead;

pub const PDF_MIME: &str = "application/pdf";

/// Whether the client should display or save the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    #[default]
    Attachment,
    Inline,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disposition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attachment" => Ok(Disposition::Attachment),
            "inline" => Ok(Disposition::Inline),
            other => Err(Error::InvalidInput(format!(
                "disposition must be 'attachment' or 'inline', got '{other}'"
            ))),
        }
    }
}

/// Build a `Content-Disposition` value.
///
/// Names that are not plain ASCII get an ASCII `filename` fallback plus an
/// RFC 5987 `filename*` parameter carrying the real name.
pub fn content_disposition(disposition: Disposition, filename: &str) -> Result<HeaderValue> {
    if filename.is_empty() {
        return Err(Error::InvalidInput("filename must not be empty".to_string()));
    }
    if filename.contains(['/', '\\']) {
        return Err(Error::InvalidInput(format!(
            "filename '{filename}' must not contain path separators"
        )));
    }
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '%' => c,
            _ => '_',
        })
        .collect();
    let mut value = format!("{disposition}; filename=\"{fallback}\"");
    if fallback != filename {
        value.push_str("; filename*=utf-8''");
        value.push_str(&urlencoding::encode(filename));
    }
    HeaderValue::from_str(&value)
        .map_err(|_| Error::InvalidInput(format!("unusable filename '{filename}'")))
}

/// A rendered PDF on its way to the client.
#[derive(Debug)]
pub struct DownloadResponse {
    inner: StreamResponse,
    filename: String,
    disposition: Disposition,
}

impl DownloadResponse {
    /// Serve in-memory PDF bytes.
    pub fn from_bytes(
        bytes: impl Into<Vec<u8>>,
        filename: &str,
        disposition: Disposition,
    ) -> Result<Self> {
        Self::wrap(StreamResponse::from_bytes(bytes), filename, disposition)
    }

    /// Serve a PDF already written to disk.
    pub fn from_file(
        path: impl Into<PathBuf>,
        filename: &str,
        disposition: Disposition,
    ) -> Result<Self> {
        let inner = StreamResponse::from_path(path)?.with_auto_last_modified();
        Self::wrap(inner, filename, disposition)
    }

    fn wrap(inner: StreamResponse, filename: &str, disposition: Disposition) -> Result<Self> {
        let inner = inner
            .with_header(http::header::CONTENT_TYPE, HeaderValue::from_static(PDF_MIME))
            .with_content_disposition(filename, disposition)?;
        Ok(Self {
            inner,
            filename: filename.to_string(),
            disposition,
        })
    }

    /// Delete the backing file after the body has been sent. No effect for
    /// in-memory responses.
    pub fn delete_file_after_send(mut self, delete: bool) -> Self {
        self.inner = self.inner.delete_file_after_send(delete);
        self
    }

    pub fn with_inverted_range_policy(mut self, policy: InvertedRangePolicy) -> Self {
        self.inner = self.inner.with_inverted_range_policy(policy);
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub fn size(&self) -> u64 {
        self.inner.size()
    }

    pub fn into_stream_response(self) -> StreamResponse {
        self.inner
    }

    pub fn prepare(self, request: &RequestHead) -> Result<PreparedResponse> {
        log::debug!(
            "serving '{}' ({} bytes, {})",
            self.filename,
            self.inner.size(),
            self.disposition
        );
        self.inner.prepare(request)
    }

    pub fn into_http_response(self, request: &RequestHead) -> Result<http::Response<Vec<u8>>> {
        self.prepare(request)?.into_http()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
    use http::StatusCode;

    #[test]
    fn ascii_filename() {
        let v = content_disposition(Disposition::Attachment, "report.pdf").unwrap();
        assert_eq!(v, "attachment; filename=\"report.pdf\"");
    }

    #[test]
    fn unicode_filename_gets_fallback_and_encoded_name() {
        let v = content_disposition(Disposition::Inline, "résumé.pdf").unwrap();
        assert_eq!(
            v,
            "inline; filename=\"r_sum_.pdf\"; filename*=utf-8''r%C3%A9sum%C3%A9.pdf"
        );
    }

    #[test]
    fn quotes_are_replaced_in_fallback() {
        let v = content_disposition(Disposition::Attachment, "a\"b.pdf").unwrap();
        assert_eq!(
            v,
            "attachment; filename=\"a_b.pdf\"; filename*=utf-8''a%22b.pdf"
        );
    }

    #[test]
    fn separators_and_empty_names_are_rejected() {
        assert!(content_disposition(Disposition::Attachment, "../etc/passwd").is_err());
        assert!(content_disposition(Disposition::Attachment, "a\\b.pdf").is_err());
        assert!(content_disposition(Disposition::Attachment, "").is_err());
    }

    #[test]
    fn disposition_parsing() {
        assert_eq!("INLINE".parse::<Disposition>().unwrap(), Disposition::Inline);
        assert_eq!(" attachment ".parse::<Disposition>().unwrap(), Disposition::Attachment);
        assert!("download".parse::<Disposition>().is_err());
    }

    #[test]
    fn download_sets_pdf_headers() {
        let resp = DownloadResponse::from_bytes(b"%PDF-1.7".to_vec(), "doc.pdf", Disposition::Inline)
            .unwrap();
        assert_eq!(resp.filename(), "doc.pdf");
        let http = resp.into_http_response(&RequestHead::get()).unwrap();
        assert_eq!(http.status(), StatusCode::OK);
        assert_eq!(http.headers()[CONTENT_TYPE], PDF_MIME);
        assert_eq!(http.headers()[CONTENT_DISPOSITION], "inline; filename=\"doc.pdf\"");
        assert_eq!(http.body(), b"%PDF-1.7");
    }

    #[test]
    fn file_download_is_removed_after_send() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp.pdf");
        std::fs::write(&path, b"%PDF-1.7 file").unwrap();
        let resp = DownloadResponse::from_file(&path, "tmp.pdf", Disposition::Attachment)
            .unwrap()
            .delete_file_after_send(true);
        let prepared = resp.prepare(&RequestHead::get()).unwrap();
        assert!(path.exists(), "file must survive until the send");
        let mut out = Vec::new();
        prepared.send(&mut out).unwrap();
        assert_eq!(out, b"%PDF-1.7 file");
        assert!(!path.exists());
    }
}
