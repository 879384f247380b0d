//! Embedding collaborator client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use reglens_shared::{AuthStyle, EmbeddingConfig, LlmConfig, RegLensError, Result};

use crate::http::{build_client, excerpt, with_auth};

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text. Fails with [`RegLensError::EmbeddingUnavailable`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

/// Accepted response shapes: a bare `{"embedding": [...]}` or the
/// OpenAI/Azure `{"data": [{"embedding": [...]}]}` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Bare { embedding: Vec<f32> },
    Envelope { data: Vec<EmbeddingDatum> },
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Bare { embedding } => Some(embedding),
            Self::Envelope { data } => data.into_iter().next().map(|d| d.embedding),
        }
    }
}

/// [`Embedder`] that POSTs `{"input": text}` to an HTTP endpoint.
pub struct HttpEmbedder {
    client: Client,
    url: String,
    api_key: String,
    auth: AuthStyle,
    model: Option<String>,
    dimensions: Option<usize>,
}

impl HttpEmbedder {
    /// Build from `[embedding]` config; the key and auth style come from `[llm]`.
    pub fn new(embedding: &EmbeddingConfig, llm: &LlmConfig) -> Result<Self> {
        embedding.validate()?;
        let api_key = llm.resolve_api_key()?;
        let client = build_client(llm.timeout_secs)?;

        Ok(Self {
            client,
            url: embedding.url.clone(),
            api_key,
            auth: llm.auth,
            model: embedding.model.clone(),
            dimensions: embedding.dimensions,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    #[instrument(skip_all, fields(chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingRequest {
            input: text,
            model: self.model.as_deref(),
        };

        let response = with_auth(self.client.post(&self.url).json(&body), self.auth, &self.api_key)
            .send()
            .await
            .map_err(|e| RegLensError::embedding(format!("{}: {e}", self.url)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RegLensError::embedding(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(RegLensError::EmbeddingUnavailable {
                status: Some(status.as_u16()),
                body: excerpt(&text),
            });
        }

        let vector = serde_json::from_str::<EmbeddingResponse>(&text)
            .ok()
            .and_then(EmbeddingResponse::into_vector)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                RegLensError::embedding(format!("malformed response: {}", excerpt(&text)))
            })?;

        if let Some(expected) = self.dimensions {
            if vector.len() != expected {
                return Err(RegLensError::embedding(format!(
                    "expected {expected} dimensions, got {}",
                    vector.len()
                )));
            }
        }

        debug!(dimensions = vector.len(), "embedding received");
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn configs(server: &MockServer, dimensions: Option<usize>) -> (EmbeddingConfig, LlmConfig) {
        let embedding = EmbeddingConfig {
            url: format!("{}/embeddings", server.uri()),
            model: None,
            dimensions,
        };
        let llm = LlmConfig {
            api_key: Some("emb-key".into()),
            auth: AuthStyle::ApiKey,
            ..Default::default()
        };
        (embedding, llm)
    }

    #[tokio::test]
    async fn parses_envelope_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("api-key", "emb-key"))
            .and(body_json(serde_json::json!({ "input": "fee schedule" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "index": 0, "embedding": [0.25, -0.5, 1.0] }]
            })))
            .mount(&server)
            .await;

        let (embedding, llm) = configs(&server, None);
        let embedder = HttpEmbedder::new(&embedding, &llm).unwrap();
        assert_eq!(embedder.embed("fee schedule").await.unwrap(), vec![0.25, -0.5, 1.0]);
    }

    #[tokio::test]
    async fn parses_bare_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embedding": [1.0, 0.0] })),
            )
            .mount(&server)
            .await;

        let (embedding, llm) = configs(&server, Some(2));
        let embedder = HttpEmbedder::new(&embedding, &llm).unwrap();
        assert_eq!(embedder.embed("x").await.unwrap(), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn non_success_status_is_embedding_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let (embedding, llm) = configs(&server, None);
        let embedder = HttpEmbedder::new(&embedding, &llm).unwrap();
        match embedder.embed("x").await {
            Err(RegLensError::EmbeddingUnavailable { status, body }) => {
                assert_eq!(status, Some(429));
                assert_eq!(body, "rate limited");
            }
            other => panic!("expected EmbeddingUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_dimensionality_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embedding": [1.0, 0.0, 0.0] })),
            )
            .mount(&server)
            .await;

        let (embedding, llm) = configs(&server, Some(2));
        let embedder = HttpEmbedder::new(&embedding, &llm).unwrap();
        let err = embedder.embed("x").await.unwrap_err();
        assert!(err.to_string().contains("expected 2 dimensions"));
    }

    #[tokio::test]
    async fn empty_data_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })),
            )
            .mount(&server)
            .await;

        let (embedding, llm) = configs(&server, None);
        let embedder = HttpEmbedder::new(&embedding, &llm).unwrap();
        assert!(matches!(
            embedder.embed("x").await,
            Err(RegLensError::EmbeddingUnavailable { status: None, .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_embedding_unavailable() {
        let embedding = EmbeddingConfig {
            url: "http://127.0.0.1:9/embeddings".into(),
            model: None,
            dimensions: None,
        };
        let llm = LlmConfig {
            api_key: Some("k".into()),
            timeout_secs: 2,
            ..Default::default()
        };
        let embedder = HttpEmbedder::new(&embedding, &llm).unwrap();
        assert!(matches!(
            embedder.embed("x").await,
            Err(RegLensError::EmbeddingUnavailable { status: None, .. })
        ));
    }
}
