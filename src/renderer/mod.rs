//! The renderer seam – everything HTML → PDF is delegated through the
//! [`Renderer`] trait.
//!
//! [`flow::FlowRenderer`] is the built-in backend.

pub mod flow;
pub mod markup;
pub mod security;

use crate::error::{Error, Result};
use crate::options::{Orientation, PaperSize, RenderOptions};

pub use flow::FlowRenderer;

/// Optional features a renderer may provide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The renderer can password-protect its output after rendering.
    pub encryption: bool,
}

/// Narrow contract the document adapter needs from an HTML → PDF engine.
pub trait Renderer {
    /// Load an HTML string, replacing any previously loaded content.
    fn load_html(&mut self, html: &str, encoding: Option<&str>) -> Result<()>;

    /// Load HTML from a local path or URL.
    fn load_html_file(&mut self, location: &str, encoding: Option<&str>) -> Result<()>;

    fn set_paper(&mut self, paper: PaperSize, orientation: Orientation);

    /// Apply an option map. Unknown keys must be tolerated.
    fn set_options(&mut self, options: &RenderOptions) -> Result<()>;

    /// Add one document metadata entry (`Title`, `Author`, …).
    fn add_info(&mut self, key: &str, value: &str);

    /// Lay out and render the loaded content.
    fn render(&mut self) -> Result<()>;

    /// Bytes of the last render.
    fn output(&self) -> Result<Vec<u8>>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Password-protect the rendered output. Only called when
    /// [`Capabilities::encryption`] is set.
    fn encrypt(&mut self, user_password: &str, owner_password: &str) -> Result<()> {
        let _ = (user_password, owner_password);
        Err(Error::Unsupported(
            "this renderer cannot encrypt documents".to_string(),
        ))
    }
}
