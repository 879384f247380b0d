//! Clients for the external collaborators RegLens talks to.
//!
//! - [`ChatClient`] / [`OpenAiChatClient`] — the reasoning collaborator
//! - [`Embedder`] / [`HttpEmbedder`] — the embedding collaborator
//!
//! Both are traits so pipelines can be driven by stubs in tests.

mod http;

pub mod chat;
pub mod embedding;

pub use chat::{ChatClient, ChatMessage, ChatRequest, OpenAiChatClient, Role};
pub use embedding::{Embedder, HttpEmbedder};
