use anyhow::bail;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use super::normalize;

/// Bracketed numeric citation markers as they appear in extracted source text, e.g.
/// `[14]`, `[3, 4]` or `[3-5]`.
static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\d+(?:\s*[,;\-–]\s*\d+)*\]").unwrap());

/// What a marker turns into in the rendered document: one inline `<cite>` element.
const CITE_WILDCARD: &str = r"<cite\b.*?</cite>";

/// Build a case-insensitive pattern matching `context` as it is rendered in the HTML.
///
/// The context is normalised first. Literal text is escaped, runs of whitespace between
/// words match `\s+`, and each citation marker becomes a wildcard over one `<cite>`
/// element, with optional whitespace on either side of it.
pub fn build_pattern(context: &str) -> anyhow::Result<Regex> {
    let context = normalize(context);
    if context.is_empty() {
        bail!("empty citation context");
    }

    let mut pieces: Vec<String> = Vec::new();
    let mut last = 0;
    for marker in MARKER_RE.find_iter(&context) {
        push_literal(&mut pieces, &context[last..marker.start()]);
        pieces.push(CITE_WILDCARD.to_string());
        last = marker.end();
    }
    push_literal(&mut pieces, &context[last..]);

    if pieces.is_empty() {
        bail!("citation context has no matchable text: {context:?}");
    }

    let source = pieces.join(r"\s*");
    let re = RegexBuilder::new(&source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()?;
    Ok(re)
}

fn push_literal(pieces: &mut Vec<String>, literal: &str) {
    let words: Vec<String> = literal.split_whitespace().map(regex::escape).collect();
    if !words.is_empty() {
        pieces.push(words.join(r"\s+"));
    }
}
