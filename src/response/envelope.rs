//! Status, headers and byte window computed for one response.

use http::header::{AsHeaderName, CONTENT_LENGTH};
use http::{HeaderMap, StatusCode, Version};

/// The slice of the stream to emit as the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    pub offset: u64,
    pub length: u64,
}

/// Everything the client sees before the body.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    /// `None` when no body is sent (416, HEAD, non-success statuses).
    pub window: Option<ByteWindow>,
}

impl ResponseEnvelope {
    /// Header value as text, if present and visible ASCII.
    pub fn header_str<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Declared `Content-Length`.
    pub fn content_length(&self) -> Option<u64> {
        self.header_str(CONTENT_LENGTH)?.parse().ok()
    }

    /// Number of body bytes that will actually be written.
    pub fn body_len(&self) -> u64 {
        self.window.map_or(0, |w| w.length)
    }

    pub fn has_body(&self) -> bool {
        self.body_len() > 0
    }
}
