use tracing::debug;

use super::{AnnotatedSpan, SpanSet};
use crate::document::{Block, Document, Splice, is_wrappable};
use crate::matching::{SpanMatcher, build_pattern};
use crate::message::Reference;
use crate::page::PaperPages;

/// Links in-text mentions of references by matching their citation contexts against
/// paragraph HTML.
///
/// Every reference is matched against the paragraphs as they were when the annotator
/// was built. Spans accepted for earlier references win over later overlapping ones,
/// and nothing is written until [`ContextAnnotator::into_splices`].
pub struct ContextAnnotator<'d> {
    doc: &'d Document,
    paragraphs: Vec<Block>,
    pages: &'d PaperPages,
    spans: SpanSet,
}

impl<'d> ContextAnnotator<'d> {
    pub fn new(doc: &'d Document, paragraphs: Vec<Block>, pages: &'d PaperPages) -> Self {
        ContextAnnotator {
            doc,
            paragraphs,
            pages,
            spans: SpanSet::default(),
        }
    }

    /// Accept spans for every citation context of `reference`. Returns how many spans
    /// were accepted.
    pub fn annotate(&mut self, reference: &Reference) -> usize {
        let target = self.pages.paper(&reference.slug, &reference.id);
        let mut linked = 0;
        for context in &reference.citation_contexts {
            let pattern = match build_pattern(&context.text) {
                Ok(p) => p,
                Err(e) => {
                    debug!(reference = %reference.id, error = %e, "skipping citation context");
                    continue;
                }
            };
            for (idx, block) in self.paragraphs.iter().enumerate() {
                let base = self.doc.inner_html(block);
                for range in SpanMatcher::new(base, &pattern) {
                    if !is_wrappable(base, range.clone()) {
                        debug!(reference = %reference.id, paragraph = idx, "match would break markup");
                        continue;
                    }
                    let span = AnnotatedSpan {
                        block: idx,
                        start: range.start,
                        end: range.end,
                        target: target.clone(),
                    };
                    if self.spans.accept(span) {
                        linked += 1;
                    } else {
                        debug!(reference = %reference.id, paragraph = idx, "overlaps an earlier link");
                    }
                }
            }
        }
        linked
    }

    pub fn into_splices(self) -> Vec<Splice> {
        self.spans.materialize(self.doc, &self.paragraphs, true)
    }
}
