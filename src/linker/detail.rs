use tracing::debug;

use super::anchor;
use crate::document::{Block, Document, Splice};

/// Append a link to the paper's canonical page to the end of the metadata block.
///
/// Returns `false` without touching the document when there is no metadata block.
/// Calling this twice appends two links.
pub fn inject_detail_link(doc: &mut Document, block: Option<&Block>, href: &str, label: &str) -> bool {
    let Some(block) = block else {
        debug!("document has no metadata block");
        return false;
    };
    let link = format!(
        "<div>{}{}</a></div>",
        anchor(href, false),
        html_escape::encode_text(label)
    );
    doc.apply(vec![Splice {
        range: block.inner.end..block.inner.end,
        text: link,
    }]);
    true
}
