//! Error types for the document adapter and the response layer

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pdf-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering or serving a document
#[derive(Error, Debug)]
pub enum Error {
    /// The document source, locator or argument is not acceptable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reading or writing a file failed
    #[error("I/O failure on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Seeking or reading a byte stream, or writing a response body, failed
    #[error("Stream error: {0}")]
    Stream(#[from] io::Error),

    /// The renderer was used before it had anything to work with
    #[error("Renderer not initialized: {0}")]
    NotInitialized(&'static str),

    /// An invariant of the API was violated by the caller
    #[error("Logic error: {0}")]
    Logic(String),

    /// The `Range` request header could not be parsed
    #[error("Malformed Range header: {0:?}")]
    MalformedRange(String),

    /// The renderer lacks a capability the caller asked for
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The renderer failed to produce a document
    #[error("Rendering failed: {0}")]
    Render(String),

    /// An option had an unusable value
    #[error("Invalid option: {0}")]
    Options(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),
}

impl Error {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
