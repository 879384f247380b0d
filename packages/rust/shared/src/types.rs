//! Core domain types shared by the merge and retrieval pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator placed between sections of a rendered context window.
pub const CONTEXT_DELIMITER: &str = "\n###\n";

/// Token overhead charged per section for its separator.
pub const SECTION_OVERHEAD_TOKENS: usize = 4;

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A bounded text block identified by its position in an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based position in its sequence.
    pub position: usize,
    /// Chunk content.
    pub text: String,
}

impl Chunk {
    pub fn new(position: usize, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
        }
    }

    /// Number a list of texts into chunks, in order.
    pub fn sequence<I, S>(texts: I) -> Vec<Chunk>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(position, text)| Chunk::new(position, text))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Diff lines & merge results
// ---------------------------------------------------------------------------

/// Classification of a line in a line-level edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTag {
    Added,
    Removed,
    Unchanged,
}

impl DiffTag {
    /// Two-character marker used by ndiff-style output.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Added => "+ ",
            Self::Removed => "- ",
            Self::Unchanged => "  ",
        }
    }
}

/// One tagged line of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub tag: DiffTag,
    /// Line text, terminator included.
    pub text: String,
}

impl DiffLine {
    pub fn new(tag: DiffTag, text: impl Into<String>) -> Self {
        Self {
            tag,
            text: text.into(),
        }
    }

    /// The line without its terminator.
    pub fn content(&self) -> &str {
        self.text.trim_end_matches(['\n', '\r'])
    }

    /// The line with its ndiff marker, e.g. `"- old text"`.
    pub fn marked(&self) -> String {
        format!("{}{}", self.tag.marker(), self.content())
    }
}

/// Outcome of reconciling one original/update chunk pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    /// The original chunk as supplied.
    pub original: Chunk,
    /// The reconciled chunk (equal to `original` when nothing was merged).
    pub updated: Chunk,
    /// Line-level edit script from `original` to `updated`.
    pub line_diff: Vec<DiffLine>,
    /// True when the reasoning call failed and the original was kept.
    #[serde(default)]
    pub fallback: bool,
}

impl MergeResult {
    /// Whether the merge produced different text.
    pub fn changed(&self) -> bool {
        self.original.text != self.updated.text
    }
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

/// Citation key for the section at a zero-based position (`sec_1`, `sec_2`, ...).
pub fn section_id(position: usize) -> String {
    format!("sec_{}", position + 1)
}

/// A document section with its token count and embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSection {
    /// Stable citation key (`sec_N`).
    pub id: String,
    /// Section text.
    pub text: String,
    /// Token count under the tokenizer used for chunking.
    pub token_count: usize,
    /// Embedding vector from the embedding collaborator.
    pub embedding: Vec<f32>,
}

/// What the context ranker does with a section that would overflow the token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetPolicy {
    /// Halt at the first overflowing section.
    #[default]
    StopAtOverflow,
    /// Skip the overflowing section and keep scanning.
    SkipOversized,
}

/// A section accepted into a context window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSection {
    pub id: String,
    pub text: String,
    pub token_count: usize,
    /// Cosine distance to the query (lower is nearer).
    pub distance: f32,
}

/// Sections selected for one question, nearest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankedContext {
    pub sections: Vec<RankedSection>,
    /// Sum of `token_count + 4` over the accepted sections.
    pub total_tokens: usize,
}

impl RankedContext {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Ids of the accepted sections in order.
    pub fn ids(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.id.as_str()).collect()
    }

    /// `"{id}:{text}"` entries joined by [`CONTEXT_DELIMITER`].
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("{}:{}", s.id, s.text))
            .collect::<Vec<_>>()
            .join(CONTEXT_DELIMITER)
    }
}

// ---------------------------------------------------------------------------
// Regulation repository
// ---------------------------------------------------------------------------

/// A regulation stored in the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regulation {
    /// Row identifier (UUID v7).
    pub id: String,
    /// Caller-chosen lookup key (e.g. a citation like `reg-2023-114`).
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Current consolidated text.
    pub body: String,
    /// SHA-256 of `body`.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A recorded change to a stored regulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amendment {
    pub id: String,
    pub regulation_id: String,
    /// Amendment text as received.
    pub text: String,
    pub previous_hash: String,
    pub new_hash: String,
    pub applied_at: DateTime<Utc>,
}
