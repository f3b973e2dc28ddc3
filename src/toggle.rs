//! The "View on Arxiv Vanity" link shown on paper detail pages.

use tracing::debug;

use crate::document::{Document, Selector, Splice};
use crate::message::PageTypeNotice;

const LINK_ID: &str = "s2-arxiv-vanity-link";
const ARXIV_PDF_PREFIX: &str = "https://arxiv.org/pdf/";
const VANITY_PREFIX: &str = "https://www.arxiv-vanity.org/papers/";

/// Tracks which paper the link currently in the page points at, so showing the same
/// paper twice and hiding twice are both no-ops.
#[derive(Debug, Default)]
pub struct VanityLinkToggle {
    shown: Option<String>,
}

impl VanityLinkToggle {
    /// Pick up the state of a page that may already carry the link.
    pub fn attach(doc: &Document) -> Self {
        let shown = doc.select_first(&Selector::id(LINK_ID)).map(|link| {
            doc.attr(&link, "href")
                .and_then(|href| {
                    href.strip_prefix(VANITY_PREFIX)
                        .map(|rest| rest.trim_end_matches('/').to_string())
                })
                .unwrap_or_default()
        });
        VanityLinkToggle { shown }
    }

    pub fn is_shown(&self) -> bool {
        self.shown.is_some()
    }

    pub fn apply(&mut self, doc: &mut Document, notice: PageTypeNotice) -> bool {
        if notice.is_s2_pdp {
            self.show(doc)
        } else {
            self.hide(doc)
        }
    }

    /// Link the first arXiv PDF linked from the page, replacing a link to any other
    /// paper. Returns whether the link is shown afterwards.
    pub fn show(&mut self, doc: &mut Document) -> bool {
        let id = doc
            .select(&Selector::class("paper-link"))
            .iter()
            .filter_map(|link| doc.attr(link, "href"))
            .find_map(|href| arxiv_id_from_pdf_url(&href));
        let Some(id) = id else {
            debug!("no arXiv PDF link on page");
            self.hide(doc);
            return false;
        };
        if self.shown.as_deref() == Some(id.as_str()) {
            return true;
        }
        if self.hide(doc) {
            debug!(paper = %id, "replacing link to another paper");
        }
        let Some(body) = doc.select_first(&Selector::tag("body")) else {
            debug!("page has no body");
            return false;
        };

        let link = format!(
            r#"<a id="{LINK_ID}" href="{VANITY_PREFIX}{}/" target="_blank">View on Arxiv Vanity</a>"#,
            html_escape::encode_double_quoted_attribute(&id)
        );
        doc.apply(vec![Splice {
            range: body.inner.end..body.inner.end,
            text: link,
        }]);
        self.shown = Some(id);
        true
    }

    /// Remove the link if it is shown. Returns whether anything was removed.
    pub fn hide(&mut self, doc: &mut Document) -> bool {
        if self.shown.take().is_none() {
            return false;
        }
        let Some(link) = doc.select_first(&Selector::id(LINK_ID)) else {
            return false;
        };
        doc.apply(vec![Splice {
            range: link.outer,
            text: String::new(),
        }]);
        true
    }
}

/// `https://arxiv.org/pdf/cs/0101027.123.pdf` gives `0101027.123`. Purely numeric ids
/// without a dot are not supported by Arxiv Vanity and give `None`.
fn arxiv_id_from_pdf_url(href: &str) -> Option<String> {
    if !href.starts_with(ARXIV_PDF_PREFIX) {
        return None;
    }
    let last = href.rsplit('/').next()?;
    let id = last.split(".pdf").next()?;
    (!id.is_empty() && id.contains('.')).then(|| id.to_string())
}
