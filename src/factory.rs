//! Document factories.

use crate::document::{DocumentConfig, PdfDocument};
use crate::error::Result;
use crate::options::{RenderOptions, ENV_PREFIX};
use crate::renderer::{FlowRenderer, Renderer};

/// Builds ready-to-load documents from an option map.
pub trait PdfFactory {
    type Renderer: Renderer;

    /// Make a document. Empty `options` mean "use the factory defaults".
    fn make(&self, options: &RenderOptions) -> Result<PdfDocument<Self::Renderer>>;
}

/// Factory for documents rendered by [`FlowRenderer`].
#[derive(Debug, Clone)]
pub struct FlowPdfFactory {
    defaults: RenderOptions,
}

impl Default for FlowPdfFactory {
    fn default() -> Self {
        Self::new(RenderOptions::defaults())
    }
}

impl FlowPdfFactory {
    pub fn new(defaults: RenderOptions) -> Self {
        Self { defaults }
    }

    /// Built-in defaults overlaid by `PDF_RELAY_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_vars(std::env::vars(), ENV_PREFIX)
    }

    /// Built-in defaults overlaid by `vars` carrying `prefix`.
    pub fn with_vars<I, K, V>(vars: I, prefix: &str) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let overrides = RenderOptions::from_prefixed_vars(vars, prefix);
        if !overrides.is_empty() {
            log::debug!("{} default option(s) taken from {prefix}* variables", overrides.len());
        }
        Self::new(RenderOptions::defaults().merge(&overrides))
    }

    pub fn defaults(&self) -> &RenderOptions {
        &self.defaults
    }
}

impl PdfFactory for FlowPdfFactory {
    type Renderer = FlowRenderer;

    fn make(&self, options: &RenderOptions) -> Result<PdfDocument<FlowRenderer>> {
        let options = if options.is_empty() {
            &self.defaults
        } else {
            options
        };
        let renderer = FlowRenderer::with_options(options)?;
        Ok(PdfDocument::with_config(
            renderer,
            DocumentConfig::from_options(options),
        ))
    }
}
