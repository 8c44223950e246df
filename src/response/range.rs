//! `Range` header evaluation for a single byte range.

use crate::error::{Error, Result};

/// Inclusive byte offsets of a satisfiable range:
/// `0 <= start <= end <= size - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
}

impl RangeSpec {
    /// Number of bytes covered; never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// What to do with a range whose start lies after its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvertedRangePolicy {
    /// Ignore the range and serve the full body.
    #[default]
    ServeFull,
    /// Answer 416 Range Not Satisfiable.
    Reject,
}

/// Result of evaluating a `Range` header against a stream size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Serve the whole body with 200.
    Full,
    /// Serve this window with 206.
    Partial(RangeSpec),
    /// Answer 416 with `Content-Range: bytes */<size>`.
    Unsatisfiable,
}

/// Evaluate a `Range` header value for a stream of `size` bytes.
///
/// Only a single `bytes=<start>-<end>` range is honored: a missing end means
/// the last byte, a missing start makes `end` a suffix length. Several
/// comma-separated ranges are answered with the full body. Syntax errors are
/// returned as [`Error::MalformedRange`].
pub fn evaluate(header: &str, size: u64, policy: InvertedRangePolicy) -> Result<RangeOutcome> {
    let malformed = || Error::MalformedRange(header.to_string());

    let value = header.trim();
    let spec = value
        .get(..6)
        .filter(|unit| unit.eq_ignore_ascii_case("bytes="))
        .map(|_| &value[6..])
        .ok_or_else(malformed)?;

    if spec.contains(',') {
        log::debug!("multiple ranges requested ({header:?}), serving full body");
        return Ok(RangeOutcome::Full);
    }

    let (start_raw, end_raw) = spec.split_once('-').ok_or_else(malformed)?;
    let (start_raw, end_raw) = (start_raw.trim(), end_raw.trim());
    if start_raw.is_empty() && end_raw.is_empty() {
        return Err(malformed());
    }

    let size = i128::from(size);
    let mut end = if end_raw.is_empty() {
        size - 1
    } else {
        parse_offset(end_raw).ok_or_else(malformed)?
    };
    let start = if start_raw.is_empty() {
        let suffix = end;
        end = size - 1;
        size - suffix
    } else {
        parse_offset(start_raw).ok_or_else(malformed)?
    };

    if start > end {
        return Ok(match policy {
            InvertedRangePolicy::ServeFull => {
                log::debug!("inverted range {start}-{end}, serving full body");
                RangeOutcome::Full
            }
            InvertedRangePolicy::Reject => RangeOutcome::Unsatisfiable,
        });
    }
    if start < 0 || end > size - 1 {
        return Ok(RangeOutcome::Unsatisfiable);
    }
    if start != 0 || end != size - 1 {
        // Both bounds are within 0..size here, so they fit in u64.
        return Ok(RangeOutcome::Partial(RangeSpec {
            start: start as u64,
            end: end as u64,
        }));
    }
    Ok(RangeOutcome::Full)
}

/// Unsigned decimal offset; signs and other characters are rejected.
fn parse_offset(raw: &str) -> Option<i128> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u64>().ok().map(i128::from)
}
