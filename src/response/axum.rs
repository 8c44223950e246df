//! axum integration: prepared responses and crate errors become axum
//! responses, and handlers can extract a [`RequestHead`] directly.

use std::convert::Infallible;

use ::axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::Error;
use crate::response::stream::{PreparedResponse, StreamResponse};
use crate::response::download::DownloadResponse;
use crate::response::RequestHead;

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestHead {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestHead::from(&*parts))
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            Error::InvalidInput(_) | Error::Options(_) | Error::Json(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            Error::MalformedRange(_) => (StatusCode::BAD_REQUEST, "malformed_range"),
            Error::Unsupported(_) => (StatusCode::NOT_IMPLEMENTED, "unsupported"),
            Error::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            _ => {
                log::error!("Internal error: {self}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };
        let body = Json(ErrorResponse {
            error,
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

impl IntoResponse for PreparedResponse {
    fn into_response(self) -> Response {
        match self.into_http() {
            Ok(response) => response.map(Body::from),
            Err(e) => e.into_response(),
        }
    }
}

impl StreamResponse {
    /// Prepare against `request` and convert for axum.
    pub fn into_axum_response(self, request: &RequestHead) -> Response {
        match self.prepare(request) {
            Ok(prepared) => prepared.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

impl DownloadResponse {
    pub fn into_axum_response(self, request: &RequestHead) -> Response {
        self.into_stream_response().into_axum_response(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::axum::http::{header, Request};

    #[tokio::test]
    async fn extracts_request_head() {
        let req = Request::builder()
            .method("GET")
            .header(header::RANGE, "bytes=0-3")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let head = RequestHead::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(head.headers[header::RANGE], "bytes=0-3");
    }

    #[test]
    fn prepared_response_converts() {
        let mut head = RequestHead::get();
        head.headers
            .insert(header::RANGE, header::HeaderValue::from_static("bytes=0-3"));
        let response = StreamResponse::from_bytes(b"%PDF-1.7".to_vec()).into_axum_response(&head);
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-3/8");
    }

    #[test]
    fn malformed_range_is_bad_request() {
        let mut head = RequestHead::get();
        head.headers
            .insert(header::RANGE, header::HeaderValue::from_static("lines=1-2"));
        let response = StreamResponse::from_bytes(vec![0u8; 8]).into_axum_response(&head);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
