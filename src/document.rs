//! The document adapter – loads HTML into a [`Renderer`], applies paper,
//! options and metadata, and hands out the rendered bytes.
//!
//! Rendering is memoized: [`PdfDocument::render`] only asks the renderer to
//! render again after something that affects the output has changed.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::options::{self, Orientation, PaperSize, RenderOptions};
use crate::path::{self, PathPrefixer};
use crate::renderer::{Capabilities, FlowRenderer, Renderer};
use crate::response::download::{Disposition, DownloadResponse};

/// Settings injected into a document at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Directory that `write_unique` and `download` write into.
    pub output_dir: PathBuf,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
        }
    }
}

impl DocumentConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Take `output_path` from `options`, falling back to the temp directory.
    pub fn from_options(options: &RenderOptions) -> Self {
        match options.get_str(options::OUTPUT_PATH) {
            Some(dir) if !dir.trim().is_empty() => Self::new(dir),
            _ => Self::default(),
        }
    }
}

/// Where the HTML comes from.
pub enum DocumentSource {
    /// Markup held in memory.
    Html(String),
    /// A local path, `file://` URL or remote URL, passed to the renderer.
    Locator(String),
    Path(PathBuf),
    /// Anything readable; must yield UTF-8.
    Reader(Box<dyn Read>),
}

impl std::fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentSource::Html(html) => f.debug_tuple("Html").field(&html.len()).finish(),
            DocumentSource::Locator(loc) => f.debug_tuple("Locator").field(loc).finish(),
            DocumentSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            DocumentSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// How `encrypt` is carried out, fixed when the document is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encryption {
    Native,
    Unavailable,
}

impl From<Capabilities> for Encryption {
    fn from(caps: Capabilities) -> Self {
        if caps.encryption {
            Encryption::Native
        } else {
            Encryption::Unavailable
        }
    }
}

/// A PDF document backed by a [`Renderer`].
#[derive(Debug)]
pub struct PdfDocument<R: Renderer = FlowRenderer> {
    renderer: R,
    config: DocumentConfig,
    encryption: Encryption,
    password: Option<String>,
    rendered: bool,
}

impl<R: Renderer> PdfDocument<R> {
    /// Wrap `renderer`, writing files into the system temp directory.
    pub fn new(renderer: R) -> Self {
        Self::with_config(renderer, DocumentConfig::default())
    }

    pub fn with_config(renderer: R, config: DocumentConfig) -> Self {
        let encryption = Encryption::from(renderer.capabilities());
        Self {
            renderer,
            config,
            encryption,
            password: None,
            rendered: false,
        }
    }

    /// Load from any [`DocumentSource`].
    pub fn load(&mut self, source: DocumentSource, encoding: Option<&str>) -> Result<&mut Self> {
        match source {
            DocumentSource::Html(html) => self.load_html(&html, encoding),
            DocumentSource::Locator(location) => self.load_resource(&location, encoding),
            DocumentSource::Path(path) => {
                let location = path.to_str().ok_or_else(|| {
                    Error::InvalidInput(format!("path {} is not valid UTF-8", path.display()))
                })?;
                self.load_resource(location, encoding)
            }
            DocumentSource::Reader(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                let html = String::from_utf8(bytes).map_err(|e| {
                    Error::InvalidInput(format!("document stream is not valid UTF-8: {e}"))
                })?;
                self.load_html(&html, encoding)
            }
        }
    }

    pub fn load_html(&mut self, html: &str, encoding: Option<&str>) -> Result<&mut Self> {
        self.renderer.load_html(html, encoding)?;
        self.rendered = false;
        Ok(self)
    }

    /// Load HTML from a path or URL.
    pub fn load_resource(&mut self, location: &str, encoding: Option<&str>) -> Result<&mut Self> {
        if location.trim().is_empty() {
            return Err(Error::InvalidInput("empty resource locator".to_string()));
        }
        self.renderer.load_html_file(location, encoding)?;
        self.rendered = false;
        Ok(self)
    }

    pub fn set_paper(&mut self, paper: PaperSize, orientation: Orientation) -> &mut Self {
        self.renderer.set_paper(paper, orientation);
        self.rendered = false;
        self
    }

    pub fn set_options(&mut self, options: &RenderOptions) -> Result<&mut Self> {
        for key in options.unknown_keys() {
            log::debug!("passing unknown option '{key}' through to the renderer");
        }
        self.renderer.set_options(options)?;
        self.rendered = false;
        Ok(self)
    }

    /// Add document info entries (`Title`, `Author`, …).
    pub fn add_metadata<I, K, V>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in entries {
            self.renderer.add_info(key.as_ref(), value.as_ref());
        }
        self.rendered = false;
        self
    }

    fn ensure_rendered(&mut self) -> Result<()> {
        if self.rendered {
            log::debug!("render memo hit");
            return Ok(());
        }
        self.renderer.render()?;
        if let Some(password) = &self.password {
            self.renderer.encrypt(password, password)?;
        }
        self.rendered = true;
        Ok(())
    }

    /// Rendered PDF bytes.
    pub fn render(&mut self) -> Result<Vec<u8>> {
        self.ensure_rendered()?;
        self.renderer.output()
    }

    /// Render and write to `path`. Returns the number of bytes written.
    pub fn write_to_file(&mut self, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let bytes = self.render()?;
        fs::write(path, &bytes).map_err(|e| Error::io(path, e))?;
        log::debug!("wrote {} bytes to {}", bytes.len(), path.display());
        Ok(bytes.len() as u64)
    }

    /// Render into the output directory under a collision-resistant name
    /// derived from `name`.
    pub fn write_unique(&mut self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(Error::InvalidInput(format!(
                "'{name}' is not a plain file name"
            )));
        }
        let path = self.output_path(&path::unique_name(name))?;
        self.write_to_file(&path)?;
        Ok(path)
    }

    /// Password-protect the document. The password serves as both the user
    /// and the owner password.
    pub fn encrypt(&mut self, password: &str) -> Result<&mut Self> {
        if self.encryption == Encryption::Unavailable {
            return Err(Error::Unsupported(
                "the renderer cannot encrypt documents".to_string(),
            ));
        }
        self.password = Some(password.to_string());
        self.rendered = false;
        self.ensure_rendered()?;
        Ok(self)
    }

    /// Render to a file in the output directory and serve it from there;
    /// the file is removed once the response has been sent.
    pub fn download(&mut self, name: &str, disposition: Disposition) -> Result<DownloadResponse> {
        let path = self.write_unique(name)?;
        match DownloadResponse::from_file(&path, name, disposition) {
            Ok(response) => Ok(response.delete_file_after_send(true)),
            Err(e) => {
                if let Err(rm) = fs::remove_file(&path) {
                    log::warn!("could not remove {}: {rm}", path.display());
                }
                Err(e)
            }
        }
    }

    /// Serve the rendered bytes from memory.
    pub fn stream(&mut self, name: &str, disposition: Disposition) -> Result<DownloadResponse> {
        let bytes = self.render()?;
        DownloadResponse::from_bytes(bytes, name, disposition)
    }

    fn output_path(&self, name: &str) -> Result<PathBuf> {
        let dir = &self.config.output_dir;
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        Ok(PathBuf::from(PathPrefixer::new(dir).prefix(name)))
    }

    pub fn capabilities(&self) -> Capabilities {
        self.renderer.capabilities()
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Direct access to the renderer. Changes made through it are not
    /// tracked by the render memo.
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }
}

impl Default for PdfDocument<FlowRenderer> {
    fn default() -> Self {
        Self::new(FlowRenderer::new())
    }
}
