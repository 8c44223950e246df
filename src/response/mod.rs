//! HTTP response layer – range-aware streaming of rendered documents.
//!
//! Responses are plain values: a [`StreamResponse`] is prepared against a
//! [`RequestHead`] into a [`PreparedResponse`], whose [`ResponseEnvelope`]
//! carries status and headers and whose body is the selected byte window.
//! Adapters turn a prepared response into an `http::Response`, write it to
//! any `io::Write`, or (with the `axum` feature) hand it to axum.

#[cfg(feature = "axum")]
pub mod axum;
pub mod byte_stream;
pub mod download;
pub mod envelope;
pub mod range;
pub mod stream;

use http::{HeaderMap, Method, Request, Version};

pub use byte_stream::{ByteStream, FileStream};
pub use download::{Disposition, DownloadResponse};
pub use envelope::{ByteWindow, ResponseEnvelope};
pub use range::{InvertedRangePolicy, RangeOutcome, RangeSpec};
pub use stream::{PreparedResponse, StreamResponse};

/// The parts of an inbound request that shape the response.
#[derive(Debug, Clone, Default)]
pub struct RequestHead {
    pub method: Method,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn new(method: Method, headers: HeaderMap) -> Self {
        Self {
            method,
            version: Version::HTTP_11,
            headers,
        }
    }

    /// A bare `GET` with no headers.
    pub fn get() -> Self {
        Self::new(Method::GET, HeaderMap::new())
    }

    /// Safe methods only read; ranges are advertised for them.
    pub fn is_method_safe(&self) -> bool {
        matches!(
            self.method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        )
    }
}

impl From<&http::request::Parts> for RequestHead {
    fn from(parts: &http::request::Parts) -> Self {
        Self {
            method: parts.method.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
        }
    }
}

impl<B> From<&Request<B>> for RequestHead {
    fn from(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_head_from_http_request() {
        let req = Request::builder()
            .method(Method::HEAD)
            .version(Version::HTTP_10)
            .header("Range", "bytes=0-1")
            .body(())
            .unwrap();
        let head = RequestHead::from(&req);
        assert_eq!(head.method, Method::HEAD);
        assert_eq!(head.version, Version::HTTP_10);
        assert_eq!(head.headers["range"], "bytes=0-1");
        assert!(head.is_method_safe());
    }

    #[test]
    fn post_is_not_safe() {
        let head = RequestHead::new(Method::POST, HeaderMap::new());
        assert!(!head.is_method_safe());
    }
}
