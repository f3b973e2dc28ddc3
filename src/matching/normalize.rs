use std::ops::Range;

/// Canonicalise `text` for comparison: lowercase, trimmed, with every whitespace run
/// collapsed to a single space.
pub fn normalize(text: &str) -> String {
    Normalized::new(text).text
}

/// Normalised text that remembers where each of its bytes came from in the source.
///
/// Lowercasing may change the byte length of a character and collapsing whitespace
/// drops bytes, so offsets found in the normalised text cannot be reused on the source
/// directly. `offsets[i]` is the source byte offset of the character that produced
/// normalised byte `i`, and the trailing entry maps the end of the text.
pub struct Normalized<'a> {
    source: &'a str,
    text: String,
    offsets: Vec<usize>,
}

impl<'a> Normalized<'a> {
    pub fn new(source: &'a str) -> Self {
        let trimmed = source.trim();
        let lead = source.len() - source.trim_start().len();

        let mut text = String::with_capacity(trimmed.len());
        let mut offsets = Vec::with_capacity(trimmed.len() + 1);
        let mut prev_space = false;
        for (i, ch) in trimmed.char_indices() {
            if ch.is_whitespace() {
                if !prev_space {
                    text.push(' ');
                    offsets.push(lead + i);
                    prev_space = true;
                }
                continue;
            }
            prev_space = false;
            for lower in ch.to_lowercase() {
                let before = text.len();
                text.push(lower);
                offsets.extend(std::iter::repeat_n(lead + i, text.len() - before));
            }
        }
        offsets.push(lead + trimmed.len());

        Normalized {
            source,
            text,
            offsets,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Translate a byte range of the normalised text into the source range it covers.
    pub fn source_range(&self, range: Range<usize>) -> Range<usize> {
        self.offsets[range.start]..self.offsets[range.end]
    }
}
