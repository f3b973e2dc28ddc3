use tracing::debug;

use super::{AnnotatedSpan, SpanSet};
use crate::document::{Block, Document, Splice};
use crate::matching::normalize;
use crate::message::Reference;
use crate::page::PaperPages;

/// Links whole bibliography entries whose text contains a reference's title.
///
/// An entry claimed by one reference is not wrapped again for another.
pub struct BibEntryLinker<'d> {
    doc: &'d Document,
    entries: Vec<Block>,
    texts: Vec<String>,
    pages: &'d PaperPages,
    spans: SpanSet,
}

impl<'d> BibEntryLinker<'d> {
    pub fn new(doc: &'d Document, entries: Vec<Block>, pages: &'d PaperPages) -> Self {
        let texts = entries
            .iter()
            .map(|e| normalize(&doc.text_content(e)))
            .collect();
        BibEntryLinker {
            doc,
            entries,
            texts,
            pages,
            spans: SpanSet::default(),
        }
    }

    /// Link every entry containing `reference`'s title. Returns how many were linked.
    pub fn link(&mut self, reference: &Reference) -> usize {
        let title = normalize(&reference.title.text);
        if title.is_empty() {
            debug!(reference = %reference.id, "reference has no title");
            return 0;
        }

        let target = self.pages.paper(&reference.slug, &reference.id);
        let mut linked = 0;
        for (idx, text) in self.texts.iter().enumerate() {
            if !text.contains(&title) {
                continue;
            }
            let span = AnnotatedSpan {
                block: idx,
                start: 0,
                end: self.entries[idx].inner.len(),
                target: target.clone(),
            };
            if self.spans.accept(span) {
                linked += 1;
            } else {
                debug!(reference = %reference.id, entry = idx, "bib entry already linked");
            }
        }
        linked
    }

    pub fn into_splices(self) -> Vec<Splice> {
        self.spans.materialize(self.doc, &self.entries, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Selector;
    use crate::message::Title;
    use url::Url;

    fn pages() -> PaperPages {
        PaperPages::new(&Url::parse("https://www.semanticscholar.org").unwrap())
    }

    fn reference(id: &str, slug: &str, title: &str) -> Reference {
        Reference {
            id: id.to_string(),
            slug: slug.to_string(),
            title: Title {
                text: title.to_string(),
            },
            citation_contexts: Vec::new(),
        }
    }

    fn run(html: &str, refs: &[Reference]) -> (Vec<usize>, String) {
        let mut doc = Document::new(html);
        let pages = pages();
        let entries = doc.select(&Selector::class("ltx_bibitem"));
        let mut linker = BibEntryLinker::new(&doc, entries, &pages);
        let counts = refs.iter().map(|r| linker.link(r)).collect();
        let splices = linker.into_splices();
        doc.apply(splices);
        (counts, doc.into_string())
    }

    #[test]
    fn wraps_entire_entry() {
        let html = r#"<ol><li class="ltx_bibitem">[3] A. Smith, <em>Deep
Learning</em>, 2015</li><li class="ltx_bibitem">[4] Other</li></ol>"#;
        let (counts, out) = run(html, &[reference("p1", "Deep-Learning", "Deep Learning")]);
        assert_eq!(counts, vec![1]);
        assert_eq!(
            out,
            r#"<ol><li class="ltx_bibitem"><a href="https://www.semanticscholar.org/paper/Deep-Learning/p1" target="_blank">[3] A. Smith, <em>Deep
Learning</em>, 2015</a></li><li class="ltx_bibitem">[4] Other</li></ol>"#
        );
    }

    #[test]
    fn math_attributes_do_not_leak_into_entry_text() {
        let html = r#"<li class="ltx_bibitem">[7] A. Smith. On <math alttext="k>1" display="inline"><mi>k</mi><mo>&gt;</mo><mn>1</mn></math> graphs. 2019.</li>"#;
        let (counts, out) = run(html, &[reference("p7", "On-Graphs", "On k>1 graphs")]);
        assert_eq!(counts, vec![1]);
        assert!(out.starts_with(
            r#"<li class="ltx_bibitem"><a href="https://www.semanticscholar.org/paper/On-Graphs/p7" target="_blank">[7] A. Smith. On <math"#
        ));
        assert!(out.ends_with("graphs. 2019.</a></li>"));
    }

    #[test]
    fn first_reference_claims_the_entry() {
        let html = r#"<li class="ltx_bibitem">Deep Learning for Deep Learning</li>"#;
        let (counts, out) = run(
            html,
            &[
                reference("p1", "a", "Deep Learning"),
                reference("p2", "b", "deep learning for"),
            ],
        );
        assert_eq!(counts, vec![1, 0]);
        assert_eq!(out.matches("<a ").count(), 1);
        assert!(out.contains("/paper/a/p1"));
    }

    #[test]
    fn empty_title_and_no_match_link_nothing() {
        let html = r#"<li class="ltx_bibitem">Something else</li>"#;
        let (counts, out) = run(
            html,
            &[reference("p1", "a", "  "), reference("p2", "b", "Deep Learning")],
        );
        assert_eq!(counts, vec![0, 0]);
        assert_eq!(out, html);
    }

    #[test]
    fn one_reference_may_link_several_entries() {
        let html = r#"<li class="ltx_bibitem">X. Deep Learning.</li><div class="ltx_bibitem">Deep learning, again</div>"#;
        let (counts, _) = run(html, &[reference("p1", "a", "Deep Learning")]);
        assert_eq!(counts, vec![2]);
    }
}
