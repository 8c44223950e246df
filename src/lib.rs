//! # pdf-relay – HTML → PDF documents served over HTTP
//!
//! A thin adapter between an HTML-to-PDF renderer and a web stack:
//!
//! 1. **Options** – loosely typed render options with defaults ([`options`])
//! 2. **Document** – load HTML, render, memoize, write ([`document`])
//! 3. **Renderer** – the engine seam and the built-in flow renderer ([`renderer`])
//! 4. **Paths** – output file naming under a base directory ([`path`])
//! 5. **Response** – range-aware streaming and PDF downloads ([`response`])
//!
//! ```no_run
//! use pdf_relay::{Disposition, FlowPdfFactory, PdfFactory, RenderOptions, RequestHead};
//!
//! # fn main() -> pdf_relay::Result<()> {
//! let mut doc = FlowPdfFactory::default().make(&RenderOptions::new())?;
//! doc.load_html("<h1>Invoice</h1><p>Due on receipt.</p>", None)?;
//! let response = doc
//!     .stream("invoice.pdf", Disposition::Inline)?
//!     .into_http_response(&RequestHead::get())?;
//! assert_eq!(response.status(), 200);
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod error;
pub mod factory;
pub mod options;
pub mod path;
pub mod renderer;
pub mod response;

// Re-exports for convenience
pub use document::{DocumentConfig, DocumentSource, PdfDocument};
pub use error::{Error, Result};
pub use factory::{FlowPdfFactory, PdfFactory};
pub use options::{Orientation, PaperSize, RenderOptions};
pub use renderer::{Capabilities, FlowRenderer, Renderer};
pub use response::{
    Disposition, DownloadResponse, InvertedRangePolicy, PreparedResponse, RequestHead,
    StreamResponse,
};
