//! Core pipelines for RegLens.
//!
//! - [`merge`]: reconcile original/update chunk pairs and diff the result
//! - [`retrieval`]: embed sections and rank them into a bounded context
//! - [`answer`]: answer a question strictly from that context
//! - [`intake`]: ingest regulations and amendments into the repository

pub mod answer;
pub mod intake;
pub mod merge;
pub mod progress;
pub mod retrieval;

#[cfg(test)]
pub(crate) mod testing;

pub use answer::{AnswerRequester, AskOutcome, GroundedAnswer, answer_prompt, ask};
pub use intake::{IntakeAction, IntakeKind, IntakeOutcome, RegulationIntake, classify};
pub use merge::{MergeRequester, merge_chunks, pair_chunks};
pub use progress::{ProgressReporter, SilentProgress};
pub use retrieval::{ContextRanker, build_sections, cosine_distance};
