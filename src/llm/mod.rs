//! Generation and embedding collaborators
//!
//! The pipeline depends only on the [`TextGenerator`] and [`Embedder`]
//! traits. [`HttpLlmClient`] implements both against an OpenAI-compatible
//! endpoint; tests substitute scripted implementations.

pub mod client;
pub mod error;

pub use client::HttpLlmClient;
pub use error::{LlmError, LlmResult};

use async_trait::async_trait;

/// Turns a prompt into free-form text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> LlmResult<String>;
}

/// Turns text into a fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>>;
}
