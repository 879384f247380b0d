//! Token counting.
//!
//! Section sizes and context budgets are measured in tokens. The default
//! counter is tiktoken's `cl100k_base`, the encoding used by the ada-002
//! embedding model; [`WordTokenizer`] is a dependency-free stand-in.

use tiktoken_rs::{CoreBPE, cl100k_base};

use reglens_shared::{RegLensError, Result};

/// Something that can count tokens in a string.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// OpenAI `cl100k_base` BPE token counter.
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl Cl100kTokenizer {
    /// Load the embedded `cl100k_base` ranks.
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base()
            .map_err(|e| RegLensError::config(format!("failed to load cl100k_base: {e}")))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for Cl100kTokenizer {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn name(&self) -> &'static str {
        "cl100k_base"
    }
}

/// Counts whitespace-separated words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn name(&self) -> &'static str {
        "words"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_tokenizer_counts_words() {
        assert_eq!(WordTokenizer.count("the fee  is\n$10"), 4);
        assert_eq!(WordTokenizer.count("   "), 0);
    }

    #[test]
    fn cl100k_counts_tokens() {
        let tok = Cl100kTokenizer::new().expect("load cl100k");
        assert_eq!(tok.count(""), 0);
        assert!(tok.count("hello world") >= 2);
        assert!(tok.count("hello world, this is a longer sentence") > tok.count("hello world"));
    }
}
