//! Range-aware stream response.
//!
//! A [`StreamResponse`] owns a [`ByteStream`] and never carries a body of its
//! own: the body is always the byte window selected at prepare time.
//! Preparing consumes the response, and sending consumes the prepared
//! response, so a stream is read at most once.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use chrono::{DateTime, Utc};
use http::header::{
    HeaderName, ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, ETAG, IF_RANGE, LAST_MODIFIED, RANGE,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::response::byte_stream::{copy_window, ByteStream, FileStream};
use crate::response::download::{content_disposition, Disposition};
use crate::response::envelope::{ByteWindow, ResponseEnvelope};
use crate::response::range::{self, InvertedRangePolicy, RangeOutcome};
use crate::response::RequestHead;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Format a timestamp the way `Last-Modified` and `If-Range` carry it.
pub fn http_date(when: DateTime<Utc>) -> String {
    when.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// The response's byte source plus the file to remove once it is released.
///
/// Removal runs on drop, so a response abandoned by a failed prepare or an
/// interrupted send still cleans up after itself.
struct OwnedStream {
    inner: Box<dyn ByteStream + Send>,
    remove_on_drop: Option<PathBuf>,
}

impl OwnedStream {
    fn new(inner: Box<dyn ByteStream + Send>) -> Self {
        Self {
            inner,
            remove_on_drop: None,
        }
    }
}

impl Drop for OwnedStream {
    fn drop(&mut self) {
        if let Some(path) = self.remove_on_drop.take() {
            // Close the file handle before removing the file.
            self.inner = Box::new(Cursor::new(Vec::<u8>::new()));
            remove_after_send(&path);
        }
    }
}

/// A response whose body is streamed from a seekable byte source.
pub struct StreamResponse {
    stream: OwnedStream,
    status: StatusCode,
    headers: HeaderMap,
    mime_type: Option<String>,
    inverted_range: InvertedRangePolicy,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("size", &self.stream.inner.size())
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("mime_type", &self.mime_type)
            .field("remove_on_drop", &self.stream.remove_on_drop)
            .finish_non_exhaustive()
    }
}

impl StreamResponse {
    pub fn new(stream: impl ByteStream + Send + 'static) -> Self {
        Self {
            stream: OwnedStream::new(Box::new(stream)),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            mime_type: None,
            inverted_range: InvertedRangePolicy::default(),
        }
    }

    /// In-memory body.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Cursor::new(bytes.into()))
    }

    /// File-backed body; the content type is guessed from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let stream = FileStream::open(&path)?;
        let mime = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or(OCTET_STREAM);
        Ok(Self::new(stream).with_content_type(mime))
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Content type used when no `Content-Type` header was set explicitly.
    pub fn with_content_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn with_inverted_range_policy(mut self, policy: InvertedRangePolicy) -> Self {
        self.inverted_range = policy;
        self
    }

    /// Set the `ETag` validator. `etag` is used verbatim, quotes included.
    pub fn with_etag(mut self, etag: &str) -> Result<Self> {
        let value = HeaderValue::from_str(etag)
            .map_err(|_| Error::InvalidInput(format!("invalid ETag {etag:?}")))?;
        self.headers.insert(ETAG, value);
        Ok(self)
    }

    /// Compute a strong `ETag` from the SHA-256 of the whole stream.
    pub fn with_auto_etag(mut self) -> Result<Self> {
        let stream = &mut self.stream.inner;
        stream.seek(SeekFrom::Start(0))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = stream.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        stream.seek(SeekFrom::Start(0))?;
        let etag = format!("\"{}\"", BASE64_STD.encode(hasher.finalize()));
        self.with_etag(&etag)
    }

    /// Set the `Last-Modified` validator.
    pub fn with_last_modified(mut self, when: DateTime<Utc>) -> Self {
        let value = HeaderValue::from_str(&http_date(when))
            .unwrap_or_else(|_| HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"));
        self.headers.insert(LAST_MODIFIED, value);
        self
    }

    /// Use the stream's modification time as `Last-Modified`, if it has one.
    pub fn with_auto_last_modified(self) -> Self {
        match self.stream.inner.modified() {
            Some(mtime) => {
                let when: DateTime<Utc> = DateTime::<Utc>::from(mtime);
                self.with_last_modified(when)
            }
            None => self,
        }
    }

    /// Set `Content-Disposition` for `filename`.
    pub fn with_content_disposition(
        mut self,
        filename: &str,
        disposition: Disposition,
    ) -> Result<Self> {
        let value = content_disposition(disposition, filename)?;
        self.headers.insert(CONTENT_DISPOSITION, value);
        Ok(self)
    }

    /// Remove the backing file once the response is done with it: after
    /// the body has been sent, or when the response is dropped unsent.
    /// No effect on streams without a backing file.
    pub fn delete_file_after_send(mut self, delete: bool) -> Self {
        self.stream.remove_on_drop = if delete {
            self.stream.inner.path().map(Path::to_path_buf)
        } else {
            None
        };
        self
    }

    /// A stream response's body is always derived from its stream.
    pub fn set_content(&mut self, content: Option<Vec<u8>>) -> Result<()> {
        match content {
            None => Ok(()),
            Some(_) => Err(Error::Logic(
                "the content cannot be set on a stream response".to_string(),
            )),
        }
    }

    pub fn size(&self) -> u64 {
        self.stream.inner.size()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Compute status, headers and byte window for `request`.
    pub fn prepare(self, request: &RequestHead) -> Result<PreparedResponse> {
        let size = self.stream.inner.size();
        let mut headers = self.headers;
        let mut status = self.status;

        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        if !headers.contains_key(ACCEPT_RANGES) {
            let accept = if request.is_method_safe() { "bytes" } else { "none" };
            headers.insert(ACCEPT_RANGES, HeaderValue::from_static(accept));
        }
        if !headers.contains_key(CONTENT_TYPE) {
            let mime = self.mime_type.as_deref().unwrap_or(OCTET_STREAM);
            let value = HeaderValue::from_str(mime)
                .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM));
            headers.insert(CONTENT_TYPE, value);
        }
        let version = if request.version == Version::HTTP_10 {
            Version::HTTP_10
        } else {
            Version::HTTP_11
        };

        let mut window = Some(ByteWindow {
            offset: 0,
            length: size,
        });

        if status == StatusCode::OK {
            if let Some(range_header) = request.headers.get(RANGE) {
                if if_range_allows(&request.headers, &headers) {
                    let range_header = range_header.to_str().map_err(|_| {
                        Error::MalformedRange(String::from_utf8_lossy(range_header.as_bytes()).into_owned())
                    })?;
                    match range::evaluate(range_header, size, self.inverted_range)? {
                        RangeOutcome::Full => {}
                        RangeOutcome::Partial(spec) => {
                            status = StatusCode::PARTIAL_CONTENT;
                            headers.insert(
                                CONTENT_RANGE,
                                header_value(format!("bytes {}-{}/{size}", spec.start, spec.end)),
                            );
                            headers.insert(CONTENT_LENGTH, HeaderValue::from(spec.len()));
                            window = Some(ByteWindow {
                                offset: spec.start,
                                length: spec.len(),
                            });
                        }
                        RangeOutcome::Unsatisfiable => {
                            status = StatusCode::RANGE_NOT_SATISFIABLE;
                            headers.insert(CONTENT_RANGE, header_value(format!("bytes */{size}")));
                            headers.insert(CONTENT_LENGTH, HeaderValue::from(0u64));
                            window = None;
                        }
                    }
                } else {
                    log::debug!("If-Range does not match the validators, ignoring Range");
                }
            }
        }

        if !status.is_success() || request.method == Method::HEAD {
            window = None;
        }

        Ok(PreparedResponse {
            envelope: ResponseEnvelope {
                status,
                version,
                headers,
                window,
            },
            stream: self.stream,
        })
    }

    /// Prepare for `request` and collect everything into an
    /// `http::Response`.
    pub fn into_http_response(self, request: &RequestHead) -> Result<http::Response<Vec<u8>>> {
        self.prepare(request)?.into_http()
    }
}

/// `If-Range` either is absent or equals the ETag or Last-Modified value.
fn if_range_allows(request: &HeaderMap, response: &HeaderMap) -> bool {
    let Some(if_range) = request.get(IF_RANGE) else {
        return true;
    };
    [ETAG, LAST_MODIFIED]
        .iter()
        .filter_map(|name| response.get(name))
        .any(|validator| validator.as_bytes() == if_range.as_bytes())
}

/// Digits, spaces, `-`, `*` and `/` are always valid header bytes.
fn header_value(text: String) -> HeaderValue {
    HeaderValue::try_from(text).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// A response ready to be written: envelope computed, stream positioned
/// lazily on send.
pub struct PreparedResponse {
    envelope: ResponseEnvelope,
    stream: OwnedStream,
}

impl std::fmt::Debug for PreparedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedResponse")
            .field("envelope", &self.envelope)
            .field("remove_on_drop", &self.stream.remove_on_drop)
            .finish_non_exhaustive()
    }
}

impl PreparedResponse {
    pub fn envelope(&self) -> &ResponseEnvelope {
        &self.envelope
    }

    pub fn status(&self) -> StatusCode {
        self.envelope.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.envelope.headers
    }

    /// Write the body window to `out`. Returns the number of body bytes
    /// written. The post-send cleanup runs whether or not writing succeeds.
    pub fn send<W: Write + ?Sized>(mut self, out: &mut W) -> Result<u64> {
        let written = match self.envelope.window {
            Some(w) if w.length > 0 => {
                copy_window(self.stream.inner.as_mut(), w.offset, w.length, out)?
            }
            _ => 0,
        };
        out.flush()?;
        Ok(written)
    }

    /// Read the body window into memory (running cleanup afterwards).
    pub fn into_body(self) -> Result<(ResponseEnvelope, Vec<u8>)> {
        let envelope = self.envelope.clone();
        let mut body = Vec::with_capacity(envelope.body_len() as usize);
        self.send(&mut body)?;
        Ok((envelope, body))
    }

    pub fn into_http(self) -> Result<http::Response<Vec<u8>>> {
        let (envelope, body) = self.into_body()?;
        let mut builder = http::Response::builder()
            .status(envelope.status)
            .version(envelope.version);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(envelope.headers);
        }
        Ok(builder.body(body)?)
    }
}

fn remove_after_send(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("removed {} after send", path.display()),
        Err(e) => log::warn!("could not remove {} after send: {e}", path.display()),
    }
}
