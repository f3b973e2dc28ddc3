use std::ops::Range;

use regex::Regex;
use tracing::debug;

use super::{Normalized, normalize};

/// Lazy scan of one block of text for one pattern.
///
/// Matching happens on the normalised text; every yielded range is a byte range of the
/// source text. The cursor only moves forward, so each iterator performs at most one
/// pass over the block and never yields overlapping ranges.
pub struct SpanMatcher<'t, 'p> {
    normalized: Normalized<'t>,
    pattern: &'p Regex,
    cursor: usize,
}

impl<'t, 'p> SpanMatcher<'t, 'p> {
    pub fn new(text: &'t str, pattern: &'p Regex) -> Self {
        SpanMatcher {
            normalized: Normalized::new(text),
            pattern,
            cursor: 0,
        }
    }
}

impl Iterator for SpanMatcher<'_, '_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let haystack = self.normalized.as_str();
        while self.cursor <= haystack.len() {
            let m = self.pattern.find_at(haystack, self.cursor)?;
            if m.is_empty() {
                self.cursor = haystack[m.end()..]
                    .chars()
                    .next()
                    .map_or(haystack.len() + 1, |c| m.end() + c.len_utf8());
                continue;
            }
            self.cursor = m.end();

            // A match splitting a multi-character lowercase expansion does not map back.
            let range = self.normalized.source_range(m.range());
            let source = self.normalized.source();
            if range.start < range.end && normalize(&source[range.clone()]) == m.as_str() {
                return Some(range);
            }
            debug!(matched = m.as_str(), "discarding match that does not map back cleanly");
        }
        None
    }
}
