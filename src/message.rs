//! Messages exchanged with the metadata relay.

use anyhow::{Context, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// One cited work, as delivered by the relay.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: Title,
    #[serde(default)]
    pub citation_contexts: Vec<CitationContext>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Title {
    #[serde(default)]
    pub text: String,
}

/// The source-text passage around one mention of a reference.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CitationContext {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Author {
    pub name: String,
    pub url: String,
}

/// Reference metadata for one document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataMessage {
    pub arxiv_id: String,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub s2_id: String,
    #[serde(default)]
    pub authors: Vec<Author>,
}

impl MetadataMessage {
    /// Whether this message is meant for the document identified by `document_id`.
    pub fn accepts(&self, document_id: &str) -> bool {
        self.arxiv_id == document_id
    }
}

/// Sent by a document to ask for its metadata.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialRequest {
    pub arxiv_id: String,
}

/// Tells a page whether it is a paper detail page.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PageTypeNotice {
    #[serde(rename = "isS2PDP")]
    pub is_s2_pdp: bool,
}

static PDP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://www\.semanticscholar\.org/paper/[^/]+/.+").unwrap());

impl PageTypeNotice {
    /// The notice for a page at `url`: paper detail pages are `/paper/{slug}/{id}`.
    pub fn for_url(url: &str) -> Self {
        PageTypeNotice {
            is_s2_pdp: PDP_RE.is_match(url),
        }
    }
}

/// The document's identifier: the second segment of its URL path, e.g. `1211.1036`
/// for `https://www.arxiv-vanity.com/papers/1211.1036/`.
pub fn document_id(url: &str) -> anyhow::Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("invalid document URL: {url}"))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.nth(1))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no document identifier in URL: {url}"))
}
