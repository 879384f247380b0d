//! Chunk merge pipeline: reconcile original/update pairs through the
//! reasoning collaborator and diff the outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use reglens_artifacts::line_diff;
use reglens_llm::{ChatClient, ChatRequest};
use reglens_shared::{Chunk, MergeResult, RegLensError, Result};

use crate::progress::ProgressReporter;

/// System instruction sent with every merge request.
pub const MERGE_SYSTEM_PROMPT: &str = "You are an AI trained to process and update regulation data chunks. If an incoming update data chunk corresponds appropriately to any segment within the original regulation data chunk, perform the update. If the update data chunk doesn't align or isn't compatible, keep the original regulation data chunk as is.";

/// Closing user message of a merge request.
pub const MERGE_INSTRUCTION: &str = "Please compare the update data chunk with the original regulation data chunk and perform an update if appropriate. Return the resultant data chunk.";

/// Completion budget for a merged chunk.
pub const MERGE_MAX_TOKENS: u32 = 4000;

/// Asks the reasoning collaborator to fold one update chunk into one original chunk.
#[derive(Clone)]
pub struct MergeRequester {
    client: Arc<dyn ChatClient>,
}

impl MergeRequester {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }

    /// The request sent for one pair.
    pub fn request(original: &str, update: &str) -> ChatRequest {
        ChatRequest::new()
            .system(MERGE_SYSTEM_PROMPT)
            .user(format!("Here is the original regulation data chunk: {original}"))
            .user(format!("Here is the update data chunk: {update}"))
            .user(MERGE_INSTRUCTION)
            .max_tokens(MERGE_MAX_TOKENS)
    }

    /// One network call; the response text is returned verbatim.
    pub async fn reconcile(&self, original: &str, update: &str) -> Result<String> {
        let merged = self
            .client
            .complete(&Self::request(original, update))
            .await?;
        if merged.trim().is_empty() {
            return Err(RegLensError::ExternalCall(
                "malformed response: empty merge result".into(),
            ));
        }
        Ok(merged)
    }

    /// Merge one pair. A failed call keeps the original text and marks the
    /// result as a fallback.
    #[instrument(skip_all, fields(position = original.position))]
    pub async fn merge_pair(&self, original: &Chunk, update: &Chunk) -> MergeResult {
        let (updated_text, fallback) = match self.reconcile(&original.text, &update.text).await {
            Ok(text) => (text, false),
            Err(e) => {
                warn!(position = original.position, error = %e, "merge call failed, keeping original");
                (original.text.clone(), true)
            }
        };

        let updated = Chunk::new(original.position, updated_text);
        let diff = line_diff(&original.text, &updated.text);
        debug!(lines = diff.len(), fallback, "pair merged");

        MergeResult {
            original: original.clone(),
            updated,
            line_diff: diff,
            fallback,
        }
    }
}

/// Pair chunks by position. Surplus chunks on either side are logged and dropped.
pub fn pair_chunks(original: &[Chunk], update: &[Chunk]) -> Vec<(Chunk, Chunk)> {
    if original.len() != update.len() {
        let (side, surplus) = if original.len() > update.len() {
            ("original", original.len() - update.len())
        } else {
            ("update", update.len() - original.len())
        };
        warn!(
            original = original.len(),
            update = update.len(),
            side,
            surplus,
            "chunk counts differ; surplus chunks left unpaired"
        );
    }
    original
        .iter()
        .cloned()
        .zip(update.iter().cloned())
        .collect()
}

/// Merge every positional pair. `workers <= 1` runs one call at a time;
/// otherwise up to `workers` calls run concurrently. Results come back in
/// pair order either way.
#[instrument(skip_all, fields(original = original.len(), update = update.len(), workers = workers))]
pub async fn merge_chunks(
    requester: &MergeRequester,
    original: &[Chunk],
    update: &[Chunk],
    workers: usize,
    progress: &dyn ProgressReporter,
) -> Vec<MergeResult> {
    let pairs = pair_chunks(original, update);
    let total = pairs.len();
    progress.phase("merge");

    let results = if workers <= 1 {
        merge_sequential(requester, pairs, progress).await
    } else {
        merge_pooled(requester, pairs, workers, progress).await
    };

    let changed = results.iter().filter(|r| r.changed()).count();
    let fallbacks = results.iter().filter(|r| r.fallback).count();
    info!(pairs = total, changed, fallbacks, "merge complete");
    progress.done();
    results
}

async fn merge_sequential(
    requester: &MergeRequester,
    pairs: Vec<(Chunk, Chunk)>,
    progress: &dyn ProgressReporter,
) -> Vec<MergeResult> {
    let total = pairs.len();
    let mut results = Vec::with_capacity(total);
    for (i, (original, update)) in pairs.iter().enumerate() {
        results.push(requester.merge_pair(original, update).await);
        progress.item_done(i + 1, total);
    }
    results
}

async fn merge_pooled(
    requester: &MergeRequester,
    pairs: Vec<(Chunk, Chunk)>,
    workers: usize,
    progress: &dyn ProgressReporter,
) -> Vec<MergeResult> {
    let total = pairs.len();
    let semaphore = Arc::new(Semaphore::new(workers));
    let originals: Vec<Chunk> = pairs.iter().map(|(o, _)| o.clone()).collect();
    let mut tasks = JoinSet::new();

    for (index, (original, update)) in pairs.into_iter().enumerate() {
        let sem = semaphore.clone();
        let requester = requester.clone();
        tasks.spawn(async move {
            let _permit = sem.acquire().await.ok();
            (index, requester.merge_pair(&original, &update).await)
        });
    }

    let mut by_index = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                by_index.insert(index, result);
                progress.item_done(by_index.len(), total);
            }
            Err(e) => warn!(error = %e, "merge task aborted"),
        }
    }

    originals
        .into_iter()
        .enumerate()
        .map(|(index, original)| {
            by_index.remove(&index).unwrap_or_else(|| MergeResult {
                updated: original.clone(),
                line_diff: line_diff(&original.text, &original.text),
                original,
                fallback: true,
            })
        })
        .collect()
}
