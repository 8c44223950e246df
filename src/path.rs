//! Output path resolution – prefixes file names with a base directory.

use std::path::{Path, MAIN_SEPARATOR};

/// Joins file names onto a fixed base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixer {
    base: String,
}

impl PathPrefixer {
    /// An empty `base` resolves against the system temp directory.
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref().to_string_lossy().into_owned();
        let base = if base.is_empty() {
            std::env::temp_dir().to_string_lossy().into_owned()
        } else {
            base
        };
        Self { base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Prefix `name` with the base directory.
    pub fn prefix(&self, name: &str) -> String {
        resolve(&self.base, name)
    }
}

/// Join `base` and `name` with the platform separator, trimming any trailing
/// separators from `base`.
///
/// No I/O happens here; the result is not checked for existence or
/// writability.
pub fn resolve(base: &str, name: &str) -> String {
    // A base made only of separators trims to "" and yields the root.
    let trimmed = base.trim_end_matches(is_separator);
    format!("{trimmed}{MAIN_SEPARATOR}{name}")
}

/// Derive a collision-resistant file name: `report.pdf` → `report<id>.pdf`.
pub fn unique_name(name: &str) -> String {
    let stem = name.strip_suffix(".pdf").unwrap_or(name);
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{stem}{}.pdf", &id[..13])
}

fn is_separator(c: char) -> bool {
    c == MAIN_SEPARATOR || c == '/'
}
