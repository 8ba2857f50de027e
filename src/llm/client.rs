//! HTTP client for OpenAI-compatible chat completion and embedding APIs

use crate::config::LlmConfig;
use crate::llm::error::{LlmError, LlmResult};
use crate::llm::{Embedder, TextGenerator};
use crate::metrics::record_model_request;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for a chat-completion and embedding service
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    client: Client,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    embedding_dimensions: Option<usize>,
}

impl HttpLlmClient {
    /// Build a client; the API key is read from the configured environment variable
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(LlmError::Configuration("llm.base_url is empty".to_string()));
        }

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            debug!("No model API key configured; sending unauthenticated requests");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            embedding_dimensions: config.embedding_dimensions,
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> LlmResult<R> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), path, "Model service returned an error");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let request = ChatCompletionRequest {
            model: &self.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response: ChatCompletionResponse = self.post("chat/completions", &request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        // A blank completion is unusable output, not a failed call
        let content = choice.message.content.unwrap_or_default();
        if content.trim().is_empty() {
            warn!(model = %self.chat_model, "Model returned a blank completion");
        }
        Ok(content)
    }

    async fn embedding(&self, text: &str) -> LlmResult<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };

        let response: EmbeddingResponse = self.post("embeddings", &request).await?;
        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        if let Some(expected) = self.embedding_dimensions {
            if embedding.len() != expected {
                return Err(LlmError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embedding)
    }
}

#[async_trait]
impl TextGenerator for HttpLlmClient {
    #[instrument(skip(self, prompt), fields(model = %self.chat_model, prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> LlmResult<String> {
        let start = Instant::now();
        let result = self.complete(prompt).await;
        record_model_request("generate", result.is_ok(), start.elapsed());
        result
    }
}

#[async_trait]
impl Embedder for HttpLlmClient {
    #[instrument(skip(self, text), fields(model = %self.embedding_model))]
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        let start = Instant::now();
        let result = self.embedding(text).await;
        record_model_request("embed", result.is_ok(), start.elapsed());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_base_url() {
        let config = LlmConfig {
            base_url: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpLlmClient::new(&config),
            Err(LlmError::Configuration(_))
        ));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = LlmConfig {
            base_url: "http://localhost:11434/v1/".to_string(),
            api_key_env: None,
            ..Default::default()
        };
        let client = HttpLlmClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434/v1");
    }
}
