use tracing::debug;

use super::{AnnotatedSpan, SpanSet};
use crate::document::{Block, Document, is_wrappable};
use crate::message::Author;

/// Replace each literal occurrence of an author's name in the author list with a link
/// to their page. Returns the number of names linked.
///
/// Names are matched as plain substrings of the list's HTML, never as patterns, and an
/// occurrence overlapping one already linked for an earlier author is left alone.
pub fn link_authors(doc: &mut Document, block: Option<&Block>, authors: &[Author]) -> usize {
    let Some(block) = block else {
        debug!("document has no author list");
        return 0;
    };

    let base = doc.inner_html(block);
    let mut spans = SpanSet::default();
    for author in authors.iter().filter(|a| !a.name.is_empty()) {
        for (start, name) in base.match_indices(author.name.as_str()) {
            let end = start + name.len();
            if !is_wrappable(base, start..end) {
                continue;
            }
            spans.accept(AnnotatedSpan {
                block: 0,
                start,
                end,
                target: author.url.clone(),
            });
        }
    }

    let linked = spans.len();
    if linked > 0 {
        let splices = spans.materialize(doc, std::slice::from_ref(block), true);
        doc.apply(splices);
    }
    linked
}
