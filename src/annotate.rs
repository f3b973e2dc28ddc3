//! The annotation pass: every linking step, in order, over one document.

use tracing::{debug, info};

use crate::config::Config;
use crate::document::Document;
use crate::linker::{BibEntryLinker, ContextAnnotator, inject_detail_link, link_authors};
use crate::message::MetadataMessage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceReport {
    pub id: String,
    pub bib_entries: usize,
    pub contexts: usize,
}

impl ReferenceReport {
    pub fn is_linked(&self) -> bool {
        self.bib_entries > 0 || self.contexts > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub references: Vec<ReferenceReport>,
    pub authors: usize,
    pub detail_link: bool,
}

impl PassReport {
    pub fn linked(&self) -> usize {
        self.references.iter().filter(|r| r.is_linked()).count()
    }

    pub fn unlinked(&self) -> usize {
        self.references.len() - self.linked()
    }

    pub fn bib_entries(&self) -> usize {
        self.references.iter().map(|r| r.bib_entries).sum()
    }

    pub fn contexts(&self) -> usize {
        self.references.iter().map(|r| r.contexts).sum()
    }
}

/// Link bibliography entries, then citation contexts, then authors, then add the link
/// back to the paper's page.
///
/// Each step looks up its blocks in the document as left by the previous step. The
/// pass is not idempotent: running it twice on one document links everything twice.
pub fn annotate(doc: &mut Document, message: &MetadataMessage, config: &Config) -> PassReport {
    let pages = config.pages();
    let selectors = &config.selectors;
    let mut report = PassReport {
        references: message
            .references
            .iter()
            .map(|r| ReferenceReport {
                id: r.id.clone(),
                ..ReferenceReport::default()
            })
            .collect(),
        ..PassReport::default()
    };

    let entries = doc.select_all(&selectors.bib_entries);
    debug!(entries = entries.len(), "linking bibliography entries");
    let mut bib = BibEntryLinker::new(doc, entries, &pages);
    for (reference, r) in message.references.iter().zip(&mut report.references) {
        r.bib_entries = bib.link(reference);
    }
    let splices = bib.into_splices();
    doc.apply(splices);

    let paragraphs = doc.select_all(&selectors.paragraphs);
    debug!(paragraphs = paragraphs.len(), "linking citation contexts");
    let mut contexts = ContextAnnotator::new(doc, paragraphs, &pages);
    for (reference, r) in message.references.iter().zip(&mut report.references) {
        r.contexts = contexts.annotate(reference);
    }
    let splices = contexts.into_splices();
    doc.apply(splices);

    let author_list = doc.select_first(&selectors.author_list);
    report.authors = link_authors(doc, author_list.as_ref(), &message.authors);

    if message.s2_id.is_empty() {
        debug!("no paper id, skipping detail link");
    } else {
        let metadata = doc.select_first(&selectors.metadata);
        report.detail_link = inject_detail_link(
            doc,
            metadata.as_ref(),
            &pages.paper_by_id(&message.s2_id),
            &config.service_name,
        );
    }

    info!(
        linked = report.linked(),
        unlinked = report.unlinked(),
        bib_entries = report.bib_entries(),
        contexts = report.contexts(),
        authors = report.authors,
        detail_link = report.detail_link,
        "annotation pass finished"
    );
    report
}
