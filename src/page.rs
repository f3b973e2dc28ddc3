use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use url::Url;

const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub const DEFAULT_SERVICE: &str = "https://www.semanticscholar.org";

/// Builds links to paper detail pages on the metadata service.
#[derive(Debug, Clone)]
pub struct PaperPages {
    base: String,
}

impl PaperPages {
    pub fn new(service: &Url) -> Self {
        PaperPages {
            base: service.as_str().trim_end_matches('/').to_string(),
        }
    }

    /// `{service}/paper/{slug}/{id}`, or the id-only form when there is no slug.
    pub fn paper(&self, slug: &str, id: &str) -> String {
        if slug.is_empty() {
            return self.paper_by_id(id);
        }
        format!("{}/paper/{}/{}", self.base, encode(slug), encode(id))
    }

    pub fn paper_by_id(&self, id: &str) -> String {
        format!("{}/paper/{}", self.base, encode(id))
    }
}

fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT_ENCODE_SET).to_string()
}
