//! Sentence-bounded section splitting.
//!
//! [`ChunkSplitter`] walks Unicode sentence boundaries and packs consecutive
//! sentences into sections of at most `target` tokens. Sections are slices
//! of the input with boundary whitespace trimmed, so concatenating them
//! (ignoring whitespace) gives back the input. A single sentence longer
//! than the target becomes a section on its own.

use std::iter::Peekable;

use unicode_segmentation::{USentenceBoundIndices, UnicodeSegmentation};

use reglens_shared::{Chunk, RegLensError, Result, section_id};

use crate::tokenizer::Tokenizer;

/// Splits text into token-bounded sections.
pub struct ChunkSplitter<'t> {
    tokenizer: &'t dyn Tokenizer,
    target: usize,
}

impl<'t> ChunkSplitter<'t> {
    /// Create a splitter producing sections of at most `target` tokens.
    pub fn new(tokenizer: &'t dyn Tokenizer, target: usize) -> Result<Self> {
        if target == 0 {
            return Err(RegLensError::validation("chunk size must be positive"));
        }
        tracing::debug!(tokenizer = tokenizer.name(), target, "chunk splitter ready");
        Ok(Self { tokenizer, target })
    }

    /// Target section size in tokens.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Lazily split `text`. Calling this again restarts from the beginning.
    pub fn split<'a>(&'a self, text: &'a str) -> Sections<'a> {
        Sections {
            text,
            sentences: text.split_sentence_bound_indices().peekable(),
            tokenizer: self.tokenizer,
            target: self.target,
            position: 0,
        }
    }

    /// Split `text` into owned [`Chunk`]s.
    pub fn chunks(&self, text: &str) -> Vec<Chunk> {
        self.split(text).map(|s| s.to_chunk()).collect()
    }
}

/// A section borrowed from the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSection<'a> {
    /// Zero-based position in the section sequence.
    pub position: usize,
    /// Section text, boundary whitespace trimmed.
    pub text: &'a str,
    /// Token count of `text`.
    pub token_count: usize,
}

impl TextSection<'_> {
    /// Citation key (`sec_N`).
    pub fn id(&self) -> String {
        section_id(self.position)
    }

    pub fn to_chunk(&self) -> Chunk {
        Chunk::new(self.position, self.text)
    }
}

/// Lazy iterator over the sections of one text. A clone resumes from the
/// same point independently.
#[derive(Clone)]
pub struct Sections<'a> {
    text: &'a str,
    sentences: Peekable<USentenceBoundIndices<'a>>,
    tokenizer: &'a dyn Tokenizer,
    target: usize,
    position: usize,
}

impl<'a> Sections<'a> {
    /// A fresh iterator over the same text, starting from the first section.
    pub fn restart(&self) -> Sections<'a> {
        Sections {
            text: self.text,
            sentences: self.text.split_sentence_bound_indices().peekable(),
            tokenizer: self.tokenizer,
            target: self.target,
            position: 0,
        }
    }
}

impl<'a> Iterator for Sections<'a> {
    type Item = TextSection<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // Leading whitespace-only sentences belong to no section.
        let (start, first) = loop {
            let (offset, sentence) = self.sentences.next()?;
            if !sentence.trim().is_empty() {
                break (offset, sentence);
            }
        };

        let mut end = start + first.len();
        let mut tokens = self.tokenizer.count(self.text[start..end].trim());

        while let Some(&(offset, sentence)) = self.sentences.peek() {
            let candidate_end = offset + sentence.len();
            let candidate = self.text[start..candidate_end].trim();
            let candidate_tokens = self.tokenizer.count(candidate);
            if candidate_tokens > self.target {
                break;
            }
            end = candidate_end;
            tokens = candidate_tokens;
            self.sentences.next();
        }

        let section = TextSection {
            position: self.position,
            text: self.text[start..end].trim(),
            token_count: tokens,
        };
        self.position += 1;
        Some(section)
    }
}

/// Split pre-chunked text on a separator line (e.g. `---`).
///
/// Each chunk is trimmed; empty chunks are dropped.
pub fn split_on_separator(text: &str, separator: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim() == separator {
            push_chunk(&mut chunks, &current);
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_chunk(&mut chunks, &current);

    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(Chunk::new(chunks.len(), trimmed));
    }
}
