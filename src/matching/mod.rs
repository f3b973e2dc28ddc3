//! Lexical matching between extracted citation text and rendered HTML.

pub mod normalize;
pub mod pattern;
pub mod spans;

pub use normalize::{Normalized, normalize};
pub use pattern::build_pattern;
pub use spans::SpanMatcher;
