//! Application configuration for RegLens.
//!
//! User config lives at `~/.reglens/reglens.toml` (or wherever `--config` points).
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RegLensError, Result};
use crate::types::BudgetPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "reglens.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".reglens";

// ---------------------------------------------------------------------------
// Config structs (matching reglens.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning collaborator settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding collaborator settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Context retrieval budget.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Chunk merge behaviour.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Regulation repository location.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// How the API key is presented to the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` (OpenAI and compatible).
    #[default]
    Bearer,
    /// `api-key: <key>` (Azure OpenAI deployments).
    ApiKey,
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (`/chat/completions` is appended).
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Literal API key. Prefer `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Name of the env var consulted when `api_key` is absent.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,

    /// Completion token cap, if any.
    #[serde(default = "default_max_tokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Header style used to send the key.
    #[serde(default)]
    pub auth: AuthStyle,

    /// `api-version` query parameter (Azure OpenAI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// HTTP timeout for a single call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            api_key_env: default_api_key_env(),
            model_name: default_model_name(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            auth: AuthStyle::default(),
            api_version: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model_name() -> String {
    "gpt-3.5-turbo".into()
}
fn default_max_tokens() -> Option<u32> {
    Some(4000)
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[embedding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Full URL of the embeddings endpoint.
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model name sent alongside the input (ignored by Azure deployments).
    #[serde(default = "default_embedding_model", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Expected vector length; vectors of any other length are rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimensions: None,
        }
    }
}

fn default_embedding_url() -> String {
    "https://api.openai.com/v1/embeddings".into()
}
fn default_embedding_model() -> Option<String> {
    Some("text-embedding-ada-002".into())
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Target section size in tokens.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Token budget for the assembled context.
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// Maximum number of sections in the context.
    #[serde(default = "default_max_sections")]
    pub max_sections: usize,

    /// What to do with a section that would overflow the budget.
    #[serde(default)]
    pub policy: BudgetPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_len: default_max_len(),
            max_sections: default_max_sections(),
            policy: BudgetPolicy::default(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_max_len() -> usize {
    2000
}
fn default_max_sections() -> usize {
    5
}

/// `[merge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Worker pool size for pooled merges. `1` means sequential.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Include unchanged pairs in the diff report.
    #[serde(default)]
    pub include_unchanged: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            include_unchanged: false,
        }
    }
}

fn default_workers() -> usize {
    4
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the regulation database. A leading `~/` expands to the home directory.
    #[serde(default = "default_db_uri")]
    pub db_uri: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_uri: default_db_uri(),
        }
    }
}

fn default_db_uri() -> String {
    format!("~/{CONFIG_DIR_NAME}/reglens.db")
}

impl StorageConfig {
    /// Resolve `db_uri` to a filesystem path.
    pub fn db_path(&self) -> Result<PathBuf> {
        if self.db_uri.trim().is_empty() {
            return Err(RegLensError::missing("storage.db_uri"));
        }
        expand_home(&self.db_uri)
    }
}

impl LlmConfig {
    /// Resolve the API key: literal `api_key`, then the `api_key_env` variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }
        match std::env::var(&self.api_key_env) {
            Ok(val) if !val.trim().is_empty() => Ok(val),
            _ => Err(RegLensError::missing("api_key")),
        }
    }

    /// Check the keys every reasoning call depends on.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(RegLensError::missing("model_name"));
        }
        if self.api_base.trim().is_empty() {
            return Err(RegLensError::missing("api_base"));
        }
        Url::parse(&self.api_base).map_err(|e| {
            RegLensError::config(format!("invalid llm.api_base '{}': {e}", self.api_base))
        })?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RegLensError::config(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

impl EmbeddingConfig {
    /// Check the embedding endpoint is present and well-formed.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(RegLensError::missing("embedding.url"));
        }
        Url::parse(&self.url).map_err(|e| {
            RegLensError::config(format!("invalid embedding.url '{}': {e}", self.url))
        })?;
        Ok(())
    }
}

impl RetrievalConfig {
    /// Reject budgets that can never select anything.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RegLensError::config("retrieval.chunk_size must be positive"));
        }
        if self.max_sections == 0 {
            return Err(RegLensError::config("retrieval.max_sections must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.reglens/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RegLensError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.reglens/reglens.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RegLensError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RegLensError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RegLensError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RegLensError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RegLensError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| RegLensError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("model_name"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("db_uri"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.retrieval.max_len, 2000);
        assert_eq!(parsed.retrieval.max_sections, 5);
        assert_eq!(parsed.retrieval.policy, BudgetPolicy::StopAtOverflow);
        assert_eq!(parsed.llm.max_tokens, Some(4000));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[llm]
api_key = "sk-test"
model_name = "gpt-4"
temperature = 0.2
auth = "api-key"

[retrieval]
policy = "skip-oversized"

[storage]
db_uri = "/tmp/regs.db"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.llm.model_name, "gpt-4");
        assert_eq!(config.llm.auth, AuthStyle::ApiKey);
        assert_eq!(config.llm.api_base, "https://api.openai.com/v1");
        assert_eq!(config.retrieval.policy, BudgetPolicy::SkipOversized);
        assert_eq!(config.retrieval.chunk_size, 500);
        assert_eq!(config.merge.workers, 4);
        assert_eq!(
            config.storage.db_path().unwrap(),
            PathBuf::from("/tmp/regs.db")
        );
        assert_eq!(config.llm.resolve_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn missing_api_key_is_reported_by_name() {
        let config = LlmConfig {
            api_key_env: "RL_TEST_NONEXISTENT_KEY_12345".into(),
            ..Default::default()
        };
        let err = config.resolve_api_key().unwrap_err();
        assert!(matches!(err, RegLensError::ConfigurationMissing { ref key } if key == "api_key"));
    }

    #[test]
    fn empty_model_name_is_missing() {
        let config = LlmConfig {
            model_name: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RegLensError::ConfigurationMissing { .. })
        ));
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let config = LlmConfig {
            temperature: 3.5,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("temperature"));
    }

    #[test]
    fn empty_db_uri_is_missing() {
        let storage = StorageConfig { db_uri: "".into() };
        assert!(matches!(
            storage.db_path(),
            Err(RegLensError::ConfigurationMissing { .. })
        ));
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/var/db").unwrap(), PathBuf::from("/var/db"));
    }
}
