//! Text normalization
//!
//! Canonical forms are what every table lookup and substring test compares.

use std::collections::HashSet;

use tracing::debug;

/// Offset between the full-width ASCII block (U+FF01..U+FF5E) and ASCII
const FULLWIDTH_OFFSET: u32 = 0xFEE0;

/// Ideographic space
const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// Fold parenthesis and tilde variants onto a single half-width form
fn fold(c: char) -> char {
    match c {
        '（' | '﹙' => '(',
        '）' | '﹚' => ')',
        '～' | '〜' | '∼' => '~',
        other => other,
    }
}

/// Punctuation removed from canonical forms, after folding
fn is_stripped(c: char) -> bool {
    matches!(
        c,
        '-' | '－'
            | '‐'
            | '~'
            | '!'
            | '！'
            | '?'
            | '？'
            | '、'
            | '､'
            | '。'
            | '｡'
            | '・'
            | '･'
            | '/'
            | '／'
            | '\\'
            | '＼'
            | '_'
            | '＿'
    )
}

/// Canonicalize text for matching
///
/// Folds width variants of parentheses and tildes, lower-cases, and drops
/// whitespace plus the punctuation in [`is_stripped`]. Idempotent.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().map(fold) {
        if c.is_whitespace() || is_stripped(c) {
            continue;
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Convert full-width ASCII and the ideographic space to half-width
pub fn to_halfwidth(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            IDEOGRAPHIC_SPACE => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - FULLWIDTH_OFFSET).unwrap_or(c),
            other => other,
        })
        .collect()
}

/// Convert printable ASCII and the space to full-width
pub fn to_fullwidth(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' ' => IDEOGRAPHIC_SPACE,
            '\u{21}'..='\u{7E}' => char::from_u32(c as u32 + FULLWIDTH_OFFSET).unwrap_or(c),
            other => other,
        })
        .collect()
}

/// The four lookup keys tried for an exact table hit, deduplicated
pub(crate) fn lookup_variants(text: &str) -> Vec<String> {
    let candidates = [
        text.trim().to_lowercase(),
        normalize(text),
        normalize(&to_halfwidth(text)),
        normalize(&to_fullwidth(text)),
    ];
    let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Deduplicate options by canonical form, keeping the first spelling seen
pub fn unique_options<S: AsRef<str>>(options: &[S]) -> Vec<String> {
    debug!(count = options.len(), "unique_options: called");
    let mut seen = HashSet::new();
    options
        .iter()
        .map(AsRef::as_ref)
        .filter(|option| seen.insert(normalize(option)))
        .map(str::to_string)
        .collect()
}
