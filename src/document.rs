//! A rendered HTML document addressed by byte ranges.
//!
//! The document is kept as its serialised markup. Blocks are located with simple CSS
//! selectors and every mutation is a splice of a byte range, so markup outside the
//! spliced ranges is never touched.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use anyhow::bail;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use tracing::{debug, warn};

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| {
        Regex::new(r#"(?s)<(/?)([A-Za-z][A-Za-z0-9-]*)\b((?:[^>"']|"[^"]*"|'[^']*')*?)(/?)>"#)
            .unwrap()
    });
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?s)<!--.*?-->"#).unwrap());
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .unwrap()
});
static COMPOUND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9-]*)?((?:[.#][A-Za-z0-9_-]+)*)$").unwrap());
static PART_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([.#])([A-Za-z0-9_-]+)").unwrap());

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

#[derive(Debug, Clone)]
struct Tag {
    range: Range<usize>,
    name: String,
    closing: bool,
    self_closing: bool,
    attrs: Range<usize>,
}

impl Tag {
    fn opens_scope(&self) -> bool {
        !self.closing && !self.self_closing && !is_void(&self.name)
    }
}

fn scan_tags(html: &str) -> Vec<Tag> {
    let comments: Vec<Range<usize>> = COMMENT_RE.find_iter(html).map(|m| m.range()).collect();
    TAG_RE
        .captures_iter(html)
        .filter_map(|c| {
            let whole = c.get(0)?;
            if comments.iter().any(|r| r.contains(&whole.start())) {
                return None;
            }
            Some(Tag {
                range: whole.range(),
                name: c[2].to_ascii_lowercase(),
                closing: !c[1].is_empty(),
                self_closing: !c[4].is_empty(),
                attrs: c.get(3)?.range(),
            })
        })
        .collect()
}

fn attr_value(attrs: &str, name: &str) -> Option<String> {
    ATTR_RE.captures_iter(attrs).find_map(|cap| {
        if !cap[1].eq_ignore_ascii_case(name) {
            return None;
        }
        cap.get(2)
            .or_else(|| cap.get(3))
            .or_else(|| cap.get(4))
            .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
    })
}

/// One element located in a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// From the start of the opening tag to the end of the closing tag.
    pub outer: Range<usize>,
    /// The element's content, between its opening and closing tags.
    pub inner: Range<usize>,
    attrs: Range<usize>,
}

/// A replacement of one byte range of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub range: Range<usize>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Document {
    html: String,
}

impl Document {
    pub fn new(html: impl Into<String>) -> Self {
        Document { html: html.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn into_string(self) -> String {
        self.html
    }

    /// All elements matching `selector`, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<Block> {
        let tags = scan_tags(&self.html);
        let mut scopes = vec![0..self.html.len()];
        let mut found = Vec::new();
        for step in &selector.steps {
            found = tags
                .iter()
                .enumerate()
                .filter(|(_, t)| !t.closing && step.matches(&self.html, t))
                .filter(|(_, t)| {
                    scopes
                        .iter()
                        .any(|s| s.start <= t.range.start && t.range.end <= s.end)
                })
                .filter_map(|(i, _)| block_at(&tags, i))
                .collect();
            scopes = found.iter().map(|b| b.inner.clone()).collect();
        }
        found
    }

    /// Elements matching any of `selectors`, grouped in selector order. An element
    /// matched by several selectors is reported once, at its first occurrence.
    pub fn select_all(&self, selectors: &[Selector]) -> Vec<Block> {
        let mut out: Vec<Block> = Vec::new();
        for selector in selectors {
            for block in self.select(selector) {
                if !out.iter().any(|b| b.outer == block.outer) {
                    out.push(block);
                }
            }
        }
        out
    }

    pub fn select_first(&self, selector: &Selector) -> Option<Block> {
        self.select(selector).into_iter().next()
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.select_first(selector).is_some()
    }

    pub fn inner_html(&self, block: &Block) -> &str {
        &self.html[block.inner.clone()]
    }

    /// The block's text nodes, concatenated, with entities decoded.
    pub fn text_content(&self, block: &Block) -> String {
        Html::parse_fragment(self.inner_html(block))
            .root_element()
            .text()
            .collect()
    }

    pub fn attr(&self, block: &Block, name: &str) -> Option<String> {
        attr_value(&self.html[block.attrs.clone()], name)
    }

    /// Apply non-overlapping splices. A splice overlapping one already applied in the
    /// same batch is dropped.
    pub fn apply(&mut self, mut splices: Vec<Splice>) {
        splices.sort_by(|a, b| {
            b.range
                .start
                .cmp(&a.range.start)
                .then(b.range.end.cmp(&a.range.end))
        });
        let mut floor = usize::MAX;
        for splice in splices {
            if splice.range.end > floor || splice.range.end > self.html.len() {
                warn!(range = ?splice.range, "dropping overlapping splice");
                continue;
            }
            floor = splice.range.start;
            self.html.replace_range(splice.range, &splice.text);
        }
    }
}

/// Pair the opening tag at `open` with its closing tag. Elements without a closing
/// tag are not reported.
fn block_at(tags: &[Tag], open: usize) -> Option<Block> {
    let tag = &tags[open];
    if !tag.opens_scope() {
        return Some(Block {
            outer: tag.range.clone(),
            inner: tag.range.end..tag.range.end,
            attrs: tag.attrs.clone(),
        });
    }

    let mut depth = 1usize;
    for t in tags[open + 1..].iter().filter(|t| t.name == tag.name) {
        if t.closing {
            depth -= 1;
            if depth == 0 {
                return Some(Block {
                    outer: tag.range.start..t.range.end,
                    inner: tag.range.end..t.range.start,
                    attrs: tag.attrs.clone(),
                });
            }
        } else if t.opens_scope() {
            depth += 1;
        }
    }
    debug!(tag = %tag.name, at = tag.range.start, "element has no closing tag");
    None
}

/// Whether `range` of `html` can be wrapped in an element without breaking the markup:
/// it must start outside any tag and every tag inside it must be balanced.
pub fn is_wrappable(html: &str, range: Range<usize>) -> bool {
    if range.start >= range.end || inside_tag(html, range.start) {
        return false;
    }
    let fragment = &html[range];
    let mut stack: Vec<String> = Vec::new();
    let mut last = 0;
    for tag in scan_tags(fragment) {
        if fragment[last..tag.range.start].contains('<') {
            return false;
        }
        last = tag.range.end;
        if tag.closing {
            if stack.pop().as_deref() != Some(tag.name.as_str()) {
                return false;
            }
        } else if tag.opens_scope() {
            stack.push(tag.name);
        }
    }
    !fragment[last..].contains('<') && stack.is_empty()
}

fn inside_tag(html: &str, pos: usize) -> bool {
    scan_tags(html)
        .iter()
        .any(|t| t.range.start < pos && pos < t.range.end)
}

/// A small subset of CSS selectors: compounds of a tag name, an `#id` and `.class`es,
/// joined by descendant combinators.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Selector {
    steps: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn matches(&self, html: &str, tag: &Tag) -> bool {
        if let Some(name) = &self.tag
            && !name.eq_ignore_ascii_case(&tag.name)
        {
            return false;
        }
        let attrs = &html[tag.attrs.clone()];
        if let Some(id) = &self.id
            && attr_value(attrs, "id").as_deref() != Some(id.as_str())
        {
            return false;
        }
        if self.classes.is_empty() {
            return true;
        }
        let class = attr_value(attrs, "class").unwrap_or_default();
        self.classes
            .iter()
            .all(|c| class.split_whitespace().any(|have| have == c))
    }
}

impl Selector {
    pub fn tag(name: &str) -> Self {
        Selector {
            steps: vec![Compound {
                tag: Some(name.to_ascii_lowercase()),
                ..Compound::default()
            }],
        }
    }

    pub fn class(name: &str) -> Self {
        Selector {
            steps: vec![Compound {
                classes: vec![name.to_string()],
                ..Compound::default()
            }],
        }
    }

    pub fn id(name: &str) -> Self {
        Selector {
            steps: vec![Compound {
                id: Some(name.to_string()),
                ..Compound::default()
            }],
        }
    }

    /// Elements matching `inner` somewhere inside elements matching `self`.
    pub fn descendant(mut self, inner: Selector) -> Self {
        self.steps.extend(inner.steps);
        self
    }
}

impl FromStr for Selector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut steps = Vec::new();
        for part in s.split_whitespace() {
            let Some(caps) = COMPOUND_RE.captures(part) else {
                bail!("unsupported selector: {s:?}");
            };
            let mut compound = Compound {
                tag: caps.get(1).map(|m| m.as_str().to_ascii_lowercase()),
                ..Compound::default()
            };
            for p in PART_RE.captures_iter(caps.get(2).map_or("", |m| m.as_str())) {
                match &p[1] {
                    "#" => compound.id = Some(p[2].to_string()),
                    _ => compound.classes.push(p[2].to_string()),
                }
            }
            if compound == Compound::default() {
                bail!("empty selector component in {s:?}");
            }
            steps.push(compound);
        }
        if steps.is_empty() {
            bail!("empty selector");
        }
        Ok(Selector { steps })
    }
}

impl TryFrom<String> for Selector {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if let Some(tag) = &step.tag {
                f.write_str(tag)?;
            }
            if let Some(id) = &step.id {
                write!(f, "#{id}")?;
            }
            for class in &step.classes {
                write!(f, ".{class}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><dt-article>
<div class="ltx_authors"><span class="ltx_personname">A. Smith, B. Jones</span></div>
<p class="ltx_p">First <em>para</em>.</p>
<p class="ltx_p extra">Second <br> para.</p>
<!-- <p class="ltx_p">commented out</p> -->
<ul><li class="ltx_bibitem">[1] Deep &amp; Wide</li></ul>
<div id="cite-hover-boxes-container"><div class="dt-hover-box"><div>nested</div>box</div></div>
<div class="dt-hover-box">outside</div>
</dt-article></body></html>"#;

    #[test]
    fn selects_by_class_in_order() {
        let doc = Document::new(PAGE);
        let paras = doc.select(&Selector::class("ltx_p"));
        assert_eq!(paras.len(), 2);
        assert_eq!(doc.inner_html(&paras[0]), "First <em>para</em>.");
        assert_eq!(doc.inner_html(&paras[1]), "Second <br> para.");
    }

    #[test]
    fn descendant_selectors_scope_matches() {
        let doc = Document::new(PAGE);
        let sel: Selector = "#cite-hover-boxes-container .dt-hover-box".parse().unwrap();
        let boxes = doc.select(&sel);
        assert_eq!(boxes.len(), 1);
        assert_eq!(doc.inner_html(&boxes[0]), "<div>nested</div>box");
        assert_eq!(sel.to_string(), "#cite-hover-boxes-container .dt-hover-box");
    }

    #[test]
    fn select_all_keeps_selector_order_and_dedupes() {
        let doc = Document::new(PAGE);
        let blocks = doc.select_all(&[
            Selector::class("ltx_bibitem"),
            Selector::class("dt-hover-box"),
            Selector::class("ltx_bibitem"),
        ]);
        assert_eq!(blocks.len(), 3);
        assert!(doc.as_str()[blocks[0].outer.clone()].starts_with("<li"));
    }

    #[test]
    fn text_content_strips_tags_and_decodes() {
        let doc = Document::new(PAGE);
        let item = doc.select_first(&Selector::class("ltx_bibitem")).unwrap();
        assert_eq!(doc.text_content(&item), "[1] Deep & Wide");
        assert!(doc.contains(&Selector::tag("dt-article")));
        assert!(!doc.contains(&Selector::tag("dt-appendix")));
    }

    #[test]
    fn quoted_angle_brackets_stay_inside_their_tag() {
        let doc = Document::new(
            r#"<li class="ltx_bibitem">On <math alttext="k>1" display="inline"><mi>k</mi><mo>&gt;</mo><mn>1</mn></math> graphs<!-- x > y --></li>"#,
        );
        let item = doc.select_first(&Selector::class("ltx_bibitem")).unwrap();
        assert_eq!(doc.text_content(&item), "On k>1 graphs");
        let math = doc.select_first(&Selector::tag("math")).unwrap();
        assert_eq!(doc.attr(&math, "alttext").as_deref(), Some("k>1"));
        assert_eq!(doc.inner_html(&math), "<mi>k</mi><mo>&gt;</mo><mn>1</mn>");

        let html = doc.inner_html(&item);
        assert!(is_wrappable(html, 0..html.find("<!--").unwrap()));
        let in_alttext = html.find("1\"").unwrap();
        assert!(!is_wrappable(html, in_alttext..html.len()));
    }

    #[test]
    fn attributes_are_read_and_decoded() {
        let doc = Document::new(r#"<a class='x' href="/a?b=1&amp;c=2" data-n=3>t</a>"#);
        let a = doc.select_first(&Selector::tag("a")).unwrap();
        assert_eq!(doc.attr(&a, "href").as_deref(), Some("/a?b=1&c=2"));
        assert_eq!(doc.attr(&a, "data-n").as_deref(), Some("3"));
        assert_eq!(doc.attr(&a, "title"), None);
    }

    #[test]
    fn splices_preserve_everything_else() {
        let mut doc = Document::new("<p>abc</p><p>def</p>");
        let paras = doc.select(&Selector::tag("p"));
        doc.apply(vec![
            Splice {
                range: paras[0].inner.start..paras[0].inner.start + 1,
                text: "<b>a</b>".to_string(),
            },
            Splice {
                range: paras[1].inner.end..paras[1].inner.end,
                text: "!".to_string(),
            },
        ]);
        assert_eq!(doc.as_str(), "<p><b>a</b>bc</p><p>def!</p>");
    }

    #[test]
    fn overlapping_splices_are_dropped() {
        let mut doc = Document::new("abcdef");
        doc.apply(vec![
            Splice {
                range: 1..4,
                text: "X".to_string(),
            },
            Splice {
                range: 2..5,
                text: "Y".to_string(),
            },
        ]);
        assert_eq!(doc.as_str(), "abYf");
    }

    #[test]
    fn wrappable_ranges() {
        let html = r##"see <cite class="c">[<a href="#b3">3</a>]</cite> here"##;
        assert!(is_wrappable(html, 0..html.len()));
        let cite_end = html.find("</cite>").unwrap();
        assert!(!is_wrappable(html, 0..cite_end));
        let in_attr = html.find("class").unwrap();
        assert!(!is_wrappable(html, in_attr..in_attr + 5));
        assert!(!is_wrappable(html, 3..3));
    }

    #[test]
    fn rejects_bad_selectors() {
        assert!("".parse::<Selector>().is_err());
        assert!("div > p".parse::<Selector>().is_err());
        assert!("a[href]".parse::<Selector>().is_err());
        assert!("div.a.b#c".parse::<Selector>().is_ok());
    }
}
