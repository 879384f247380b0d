//! Text handling for RegLens: tokenizers, section splitting, cleanup, readability.

pub mod chunker;
pub mod cleanup;
pub mod readability;
pub mod tokenizer;

pub use chunker::{ChunkSplitter, Sections, TextSection, split_on_separator};
pub use cleanup::{normalize_whitespace, preprocess, strip_html_tags};
pub use readability::{ReadabilityReport, difficulty_for, flesch_reading_ease};
pub use tokenizer::{Cl100kTokenizer, Tokenizer, WordTokenizer};
