//! The individual annotation steps and the span bookkeeping they share.

use std::collections::BTreeMap;

use crate::document::{Block, Document, Splice};

pub mod author;
pub mod bib;
pub mod context;
pub mod detail;

pub use author::link_authors;
pub use bib::BibEntryLinker;
pub use context::ContextAnnotator;
pub use detail::inject_detail_link;

/// One accepted link, waiting to be written into the document.
///
/// `start` and `end` are byte offsets into the inner HTML of block number `block` of
/// whatever block list the span was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedSpan {
    pub block: usize,
    pub start: usize,
    pub end: usize,
    pub target: String,
}

/// Accepted spans per block, kept sorted and non-overlapping.
#[derive(Debug, Default)]
pub struct SpanSet {
    by_block: BTreeMap<usize, Vec<AnnotatedSpan>>,
}

impl SpanSet {
    /// Accept `span` unless it is empty or overlaps a span already accepted for its
    /// block.
    pub fn accept(&mut self, span: AnnotatedSpan) -> bool {
        if span.start >= span.end {
            return false;
        }
        let spans = self.by_block.entry(span.block).or_default();
        let idx = spans.partition_point(|s| s.start < span.start);
        if idx > 0 && spans[idx - 1].end > span.start {
            return false;
        }
        if idx < spans.len() && spans[idx].start < span.end {
            return false;
        }
        spans.insert(idx, span);
        true
    }

    pub fn len(&self) -> usize {
        self.by_block.values().map(Vec::len).sum()
    }

    /// One splice per touched block, rewriting its inner HTML with every accepted span
    /// wrapped in an anchor, left to right.
    pub fn materialize(&self, doc: &Document, blocks: &[Block], new_tab: bool) -> Vec<Splice> {
        self.by_block
            .iter()
            .filter_map(|(&idx, spans)| {
                let block = blocks.get(idx)?;
                Some(Splice {
                    range: block.inner.clone(),
                    text: wrap_spans(doc.inner_html(block), spans, new_tab),
                })
            })
            .collect()
    }
}

fn wrap_spans(base: &str, spans: &[AnnotatedSpan], new_tab: bool) -> String {
    let mut out = String::with_capacity(base.len() + spans.len() * 64);
    let mut last = 0;
    for span in spans {
        out.push_str(&base[last..span.start]);
        out.push_str(&anchor(&span.target, new_tab));
        out.push_str(&base[span.start..span.end]);
        out.push_str("</a>");
        last = span.end;
    }
    out.push_str(&base[last..]);
    out
}

/// Opening `<a>` tag for `href`.
pub fn anchor(href: &str, new_tab: bool) -> String {
    let href = html_escape::encode_double_quoted_attribute(href);
    if new_tab {
        format!(r#"<a href="{href}" target="_blank">"#)
    } else {
        format!(r#"<a href="{href}">"#)
    }
}
