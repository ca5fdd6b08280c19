//! Raw `pathname` text → sanitized relative path.
//!
//! Nothing here is a security boundary. Dropping `..` segments keeps honest
//! packages tidy; containment is enforced separately against the canonical
//! output directory (see [`contain`](super::contain)).

use super::category::{is_known_extension, longest_known_prefix};
use std::borrow::Cow;

/// Characters that no mainstream filesystem accepts in a file name.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];
/// Device names Windows reserves regardless of extension.
#[rustfmt::skip]
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL",
    "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9",
    "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];
/// A suffix at least this long is assumed to have garbage glued onto it.
const LONG_SUFFIX: usize = 30;
/// Fewer trailing zeros than this are left alone (`.mp30` could be real).
const EXCESS_ZEROS: usize = 2;

/// One path segment as it appeared in the package and as it will be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentPair {
    pub original: String,
    pub normalized: String,
}

/// A cleaned-up relative path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedPath {
    /// Kept segments, each paired with its original text.
    pub segments: Vec<SegmentPair>,
}

impl NormalizedPath {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments joined with `/`.
    pub fn as_relative(&self) -> String {
        self.segments.iter().map(|s| s.normalized.as_str()).collect::<Vec<_>>().join("/")
    }

    /// Final segment: the file name.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.normalized.as_str())
    }
}

/// Normalize raw `pathname` text.
///
/// Unifies separators, strips line breaks and surrounding whitespace, drops
/// `.`/`..` and empty segments, removes characters filesystems reject,
/// defuses reserved device names, and repairs a mangled extension on the
/// final segment. The result may be empty, in which case the asset has no
/// usable destination.
pub fn normalize(raw: &str) -> NormalizedPath {
    let unified: String =
        raw.chars().filter(|c| !matches!(c, '\r' | '\n')).map(|c| if c == '\\' { '/' } else { c }).collect();
    let mut segments = Vec::new();
    for original in unified.trim().split('/') {
        if original == "." || original == ".." {
            tracing::debug!(path = %raw, segment = original, "Dropping relative segment from asset path");
            continue;
        }
        let normalized = sanitize_segment(original);
        if normalized.is_empty() {
            continue;
        }
        segments.push(SegmentPair { original: original.to_string(), normalized });
    }
    if let Some(last) = segments.last_mut()
        && let Cow::Owned(repaired) = repair_extension(&last.normalized)
    {
        tracing::debug!(original = %last.normalized, repaired = %repaired, "Repaired mangled file extension");
        last.normalized = repaired;
    }
    NormalizedPath { segments }
}

fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment.chars().filter(|c| !c.is_control() && !INVALID_CHARS.contains(c)).collect();
    // Windows silently drops trailing dots and spaces, which would make
    // `name.` and `name` collide.
    let cleaned = cleaned.trim().trim_end_matches('.');
    let stem = cleaned.split('.').next().unwrap_or(cleaned);
    if RESERVED_NAMES.iter().any(|reserved| reserved.eq_ignore_ascii_case(stem)) {
        return format!("_{cleaned}");
    }
    cleaned.to_string()
}

/// Repair a file name whose extension carries trailing garbage.
///
/// - A suffix ending in a run of at least two `0`s (and which isn't itself a
///   known extension) loses the run: `tex.png000` → `tex.png`.
/// - Otherwise a suffix of 30+ characters is cut down to the longest known
///   extension it starts with, if any.
/// - Anything else is returned unchanged. Genuinely long, unusual extensions
///   that happen to start with a known one will be truncated.
pub fn repair_extension(name: &str) -> Cow<'_, str> {
    let Some((stem, suffix)) = name.rsplit_once('.') else {
        return Cow::Borrowed(name);
    };
    if stem.is_empty() || suffix.is_empty() {
        return Cow::Borrowed(name);
    }
    let trimmed = suffix.trim_end_matches('0');
    if suffix.len() - trimmed.len() >= EXCESS_ZEROS && !trimmed.is_empty() && !is_known_extension(suffix) {
        return Cow::Owned(format!("{stem}.{trimmed}"));
    }
    if suffix.chars().count() >= LONG_SUFFIX
        && let Some(len) = longest_known_prefix(suffix)
    {
        return Cow::Owned(format!("{stem}.{}", &suffix[..len]));
    }
    Cow::Borrowed(name)
}
