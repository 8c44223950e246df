//! Render options – a loosely typed option map plus the paper types it
//! resolves to.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub const DEFAULT_PAPER_SIZE: &str = "default_paper_size";
pub const DEFAULT_PAPER_ORIENTATION: &str = "default_paper_orientation";
pub const DEFAULT_FONT: &str = "default_font";
pub const DEFAULT_FONT_SIZE: &str = "default_font_size";
pub const DEFAULT_ENCODING: &str = "default_encoding";
pub const DPI: &str = "dpi";
pub const MARGIN: &str = "margin";
pub const LINE_HEIGHT: &str = "line_height";
pub const IS_REMOTE_ENABLED: &str = "is_remote_enabled";
pub const OUTPUT_PATH: &str = "output_path";

/// Option names understood by this crate. Anything else is still passed
/// through to the renderer.
pub const KNOWN_OPTIONS: &[&str] = &[
    DEFAULT_PAPER_SIZE,
    DEFAULT_PAPER_ORIENTATION,
    DEFAULT_FONT,
    DEFAULT_FONT_SIZE,
    DEFAULT_ENCODING,
    DPI,
    MARGIN,
    LINE_HEIGHT,
    IS_REMOTE_ENABLED,
    OUTPUT_PATH,
];

/// Environment prefix stripped by [`RenderOptions::from_env`].
pub const ENV_PREFIX: &str = "PDF_RELAY_";

/// Mapping of option name → value, consumed by a single render call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderOptions(BTreeMap<String, Value>);

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in defaults: A4 portrait, Helvetica 12pt, 96 dpi, no remote
    /// resources.
    pub fn defaults() -> Self {
        Self::new()
            .with(DEFAULT_PAPER_SIZE, "a4")
            .with(DEFAULT_PAPER_ORIENTATION, "portrait")
            .with(DEFAULT_FONT, "helvetica")
            .with(DEFAULT_FONT_SIZE, 12)
            .with(DEFAULT_ENCODING, "utf-8")
            .with(DPI, 96)
            .with(MARGIN, 40)
            .with(LINE_HEIGHT, 1.4)
            .with(IS_REMOTE_ENABLED, false)
    }

    /// Parse options from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Collect options from `(name, value)` pairs whose name starts with
    /// `prefix`. The prefix is stripped and the rest lower-cased, so
    /// `PDF_RELAY_DEFAULT_PAPER_SIZE` becomes `default_paper_size`.
    pub fn from_prefixed_vars<I, K, V>(vars: I, prefix: &str) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::new();
        for (key, value) in vars {
            if let Some(name) = key.as_ref().strip_prefix(prefix) {
                if name.is_empty() {
                    continue;
                }
                options.set(name.to_ascii_lowercase(), parse_scalar(value.as_ref()));
            }
        }
        options
    }

    /// Options taken from the process environment under [`ENV_PREFIX`].
    pub fn from_env() -> Self {
        Self::from_prefixed_vars(std::env::vars(), ENV_PREFIX)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge(mut self, other: &RenderOptions) -> Self {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Numeric option; numeric strings are accepted too.
    pub fn get_f32(&self, key: &str) -> Option<f32> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64().map(|v| v as f32),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// Names that are not in [`KNOWN_OPTIONS`].
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| !KNOWN_OPTIONS.contains(k))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Paper size named by `default_paper_size`, if present.
    pub fn paper_size(&self) -> Result<Option<PaperSize>> {
        self.get_str(DEFAULT_PAPER_SIZE).map(str::parse).transpose()
    }

    /// Orientation named by `default_paper_orientation`, if present.
    pub fn orientation(&self) -> Result<Option<Orientation>> {
        self.get_str(DEFAULT_PAPER_ORIENTATION)
            .map(str::parse)
            .transpose()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RenderOptions {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut options = Self::new();
        for (k, v) in iter {
            options.set(k, v);
        }
        options
    }
}

/// Typed value for an option read from a plain string (env var, CLI flag).
fn parse_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(raw.to_string())
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(Error::InvalidInput(format!(
                "unknown orientation '{other}' (expected portrait or landscape)"
            ))),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => f.write_str("portrait"),
            Orientation::Landscape => f.write_str("landscape"),
        }
    }
}

/// Paper dimensions in PDF points (1 pt = 1/72 inch), portrait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PaperSize {
    pub const A3: PaperSize = PaperSize::new(841.89, 1190.55);
    pub const A4: PaperSize = PaperSize::new(595.28, 841.89);
    pub const A5: PaperSize = PaperSize::new(419.53, 595.28);
    pub const LETTER: PaperSize = PaperSize::new(612.0, 792.0);
    pub const LEGAL: PaperSize = PaperSize::new(612.0, 1008.0);

    pub const fn new(width_pt: f32, height_pt: f32) -> Self {
        Self {
            width_pt,
            height_pt,
        }
    }

    /// Effective `(width, height)` after applying `orientation`.
    pub fn oriented(&self, orientation: Orientation) -> (f32, f32) {
        let (short, long) = if self.width_pt <= self.height_pt {
            (self.width_pt, self.height_pt)
        } else {
            (self.height_pt, self.width_pt)
        };
        match orientation {
            Orientation::Portrait => (short, long),
            Orientation::Landscape => (long, short),
        }
    }
}

impl Default for PaperSize {
    fn default() -> Self {
        PaperSize::A4
    }
}

/// Accepts a named size (`a3`, `a4`, `a5`, `letter`, `legal`) or a custom
/// `<width>x<height>` in points.
impl FromStr for PaperSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "a3" => return Ok(PaperSize::A3),
            "a4" => return Ok(PaperSize::A4),
            "a5" => return Ok(PaperSize::A5),
            "letter" => return Ok(PaperSize::LETTER),
            "legal" => return Ok(PaperSize::LEGAL),
            _ => {}
        }
        let invalid = || Error::InvalidInput(format!("unknown paper size '{s}'"));
        let (w, h) = name.split_once('x').ok_or_else(invalid)?;
        let w: f32 = w.trim().parse().map_err(|_| invalid())?;
        let h: f32 = h.trim().parse().map_err(|_| invalid())?;
        if !(w > 0.0 && h > 0.0 && w.is_finite() && h.is_finite()) {
            return Err(invalid());
        }
        Ok(PaperSize::new(w, h))
    }
}

/// Ordered document metadata (Title, Author, Subject, Keywords, Creator…).
pub type Metadata = Vec<(String, String)>;
