//! Reasoning collaborator: OpenAI-compatible chat completions.
//!
//! The collaborator is a black box: text in, text out. Requests are shaped
//! into an explicit [`ChatRequest`]; responses are decoded into explicit wire
//! types and validated before the first choice's content is handed back.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use reglens_shared::{AuthStyle, LlmConfig, RegLensError, Result};

use crate::http::{build_client, excerpt, with_auth};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A request to the reasoning collaborator.
///
/// `temperature` and `max_tokens` override the client's configured values
/// when set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a system instruction.
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(content));
        self
    }

    /// Append a user message.
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(content));
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Reasoning collaborator abstraction.
///
/// Implementations return the text of the first choice, or an
/// [`RegLensError::ExternalCall`] when the call fails or the response is
/// malformed.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send `request` and return the answer text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Model identifier requests are sent to.
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

impl WireResponse {
    /// Content of the first choice, or a malformed-response error.
    fn into_text(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                RegLensError::ExternalCall("malformed response: no choices[0].message.content".into())
            })
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// [`ChatClient`] for any OpenAI-compatible `/chat/completions` endpoint,
/// including Azure OpenAI deployments.
pub struct OpenAiChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    auth: AuthStyle,
    api_version: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiChatClient {
    /// Build a client from `[llm]` config. Fails on missing or invalid keys.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.resolve_api_key()?;
        let client = build_client(config.timeout_secs)?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key,
            auth: config.auth,
            api_version: config.api_version.clone(),
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = WireRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_tokens.or(self.max_tokens),
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(version) = &self.api_version {
            builder = builder.query(&[("api-version", version.as_str())]);
        }
        let builder = with_auth(builder, self.auth, &self.api_key);

        let response = builder
            .send()
            .await
            .map_err(|e| RegLensError::ExternalCall(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            RegLensError::ExternalCall(format!("{}: failed to read body: {e}", self.endpoint))
        })?;

        if !status.is_success() {
            return Err(RegLensError::ExternalCall(format!(
                "{}: HTTP {status}: {}",
                self.endpoint,
                excerpt(&text)
            )));
        }

        let parsed: WireResponse = serde_json::from_str(&text).map_err(|e| {
            RegLensError::ExternalCall(format!("malformed response: {e} (got: {})", excerpt(&text)))
        })?;

        let answer = parsed.into_text()?;
        debug!(chars = answer.len(), "completion received");
        Ok(answer)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
