//! Shared types, error model, and configuration for RegLens.
//!
//! This crate is the foundation depended on by all other RegLens crates.
//! It provides:
//! - [`RegLensError`] — the unified error type
//! - Domain types ([`Chunk`], [`MergeResult`], [`DocumentSection`], [`RankedContext`], [`Regulation`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AuthStyle, EmbeddingConfig, LlmConfig, MergeConfig, RetrievalConfig,
    StorageConfig, config_dir, config_file_path, expand_home, init_config, load_config,
    load_config_from,
};
pub use error::{RegLensError, Result};
pub use types::{
    Amendment, BudgetPolicy, CONTEXT_DELIMITER, Chunk, DiffLine, DiffTag, DocumentSection,
    MergeResult, RankedContext, RankedSection, Regulation, SECTION_OVERHEAD_TOKENS, section_id,
};
