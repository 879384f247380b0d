//! Stub collaborators shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reglens_llm::{ChatClient, ChatRequest, Embedder};
use reglens_shared::{RegLensError, Result};

type Responder = Box<dyn Fn(&ChatRequest) -> Result<String> + Send + Sync>;

/// Chat client answering from a closure and recording every request.
pub(crate) struct ScriptedChat {
    respond: Responder,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new(respond: impl Fn(&ChatRequest) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `text`.
    pub fn fixed(text: &'static str) -> Self {
        Self::new(move |_| Ok(text.to_string()))
    }

    /// Always fails like an unreachable endpoint.
    pub fn failing() -> Self {
        Self::new(|_| Err(RegLensError::ExternalCall("connection refused".into())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Embedder returning canned vectors by exact text, failing for anything else.
pub(crate) struct TableEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        Self {
            vectors: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[async_trait]
impl Embedder for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| RegLensError::EmbeddingUnavailable {
                status: Some(503),
                body: format!("no vector for {text:?}"),
            })
    }
}
