//! Context retrieval: embed document sections and pick the nearest ones for
//! a question within a token budget.

use tracing::{debug, info, instrument};

use reglens_llm::Embedder;
use reglens_shared::{
    BudgetPolicy, DocumentSection, RankedContext, RankedSection, RegLensError, Result,
    RetrievalConfig, SECTION_OVERHEAD_TOKENS,
};
use reglens_text::ChunkSplitter;

use crate::progress::ProgressReporter;

/// `1 - cosine similarity`. A zero-norm vector has similarity 0.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RegLensError::validation(format!(
            "embedding dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let similarity = if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    };
    Ok((1.0 - similarity) as f32)
}

/// Split `text` into numbered sections and embed each one.
#[instrument(skip_all, fields(chars = text.len(), target = splitter.target()))]
pub async fn build_sections(
    splitter: &ChunkSplitter<'_>,
    text: &str,
    embedder: &dyn Embedder,
    progress: &dyn ProgressReporter,
) -> Result<Vec<DocumentSection>> {
    let pieces: Vec<_> = splitter.split(text).collect();
    let total = pieces.len();
    progress.phase("embed");

    let mut sections = Vec::with_capacity(total);
    for (i, piece) in pieces.iter().enumerate() {
        let embedding = embedder.embed(piece.text).await?;
        sections.push(DocumentSection {
            id: piece.id(),
            text: piece.text.to_string(),
            token_count: piece.token_count,
            embedding,
        });
        progress.item_done(i + 1, total);
    }

    info!(sections = sections.len(), "document sections embedded");
    Ok(sections)
}

/// Picks the sections nearest to a query within a token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextRanker {
    max_len: usize,
    max_sections: usize,
    policy: BudgetPolicy,
}

impl Default for ContextRanker {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

impl ContextRanker {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            ..Self::default()
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            max_len: config.max_len,
            max_sections: config.max_sections,
            policy: config.policy,
        }
    }

    pub fn with_policy(mut self, policy: BudgetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_sections(mut self, max_sections: usize) -> Self {
        self.max_sections = max_sections;
        self
    }

    pub fn policy(&self) -> BudgetPolicy {
        self.policy
    }

    /// Rank `sections` by distance to `query` (ties keep document order)
    /// and accept greedily. Each accepted section costs its token count
    /// plus a fixed separator overhead.
    #[instrument(skip_all, fields(sections = sections.len(), max_len = self.max_len, policy = ?self.policy))]
    pub fn rank(&self, query: &[f32], sections: &[DocumentSection]) -> Result<RankedContext> {
        let mut scored = sections
            .iter()
            .map(|s| cosine_distance(query, &s.embedding).map(|d| (s, d)))
            .collect::<Result<Vec<_>>>()?;
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut context = RankedContext::default();
        for (section, distance) in scored {
            if context.sections.len() >= self.max_sections {
                break;
            }
            let cost = section.token_count + SECTION_OVERHEAD_TOKENS;
            if context.total_tokens + cost > self.max_len {
                debug!(id = %section.id, cost, total = context.total_tokens, "section overflows budget");
                match self.policy {
                    BudgetPolicy::StopAtOverflow => break,
                    BudgetPolicy::SkipOversized => continue,
                }
            }
            context.total_tokens += cost;
            context.sections.push(RankedSection {
                id: section.id.clone(),
                text: section.text.clone(),
                token_count: section.token_count,
                distance,
            });
        }

        debug!(selected = ?context.ids(), total = context.total_tokens, "context assembled");
        Ok(context)
    }
}
