//! Generative model client.
//!
//! [`TextTransform`] is the single pluggable text capability the pipeline
//! depends on: query rewriting, translation, and answer generation are all
//! prompt completions through it, so one test double covers every seam.
//! [`OllamaClient`] is the production implementation, talking to a local
//! Ollama server over HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};

/// A pluggable prompt-completion capability.
///
/// Implementations are synchronous request/response with a configured
/// timeout. Retry policy is the caller's concern; implementations should
/// fail fast on a single attempt.
#[async_trait]
pub trait TextTransform: Send + Sync {
    /// Complete a prompt, returning the model's text output.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

const PROVIDER: &str = "Ollama";

/// A client for a local Ollama server.
///
/// Implements [`TextTransform`] via `/api/generate` and
/// [`EmbeddingProvider`] via `/api/embeddings`. Every request carries the
/// configured timeout; a timeout surfaces as a request error, never a hang.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    llm_model: String,
    embedding_model: String,
    embedding_dimensions: usize,
    temperature: f32,
}

impl OllamaClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        llm_model: impl Into<String>,
        embedding_model: impl Into<String>,
        embedding_dimensions: usize,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            llm_model: llm_model.into(),
            embedding_model: embedding_model.into(),
            embedding_dimensions,
            temperature: 0.3,
        })
    }

    /// Set the sampling temperature for generation requests.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    async fn post_json<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &T,
        make_err: impl Fn(String) -> Error,
    ) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            error!(provider = PROVIDER, %url, error = %e, "request failed");
            make_err(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %url, %status, "API error");
            return Err(make_err(format!("API returned {status}: {detail}")));
        }

        response.json().await.map_err(|e| {
            error!(provider = PROVIDER, %url, error = %e, "failed to parse response");
            make_err(format!("failed to parse response: {e}"))
        })
    }
}

#[async_trait]
impl TextTransform for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.llm_model, prompt_len = prompt.len(), "completing prompt");

        let request = GenerateRequest {
            model: &self.llm_model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: self.temperature },
        };
        let response: GenerateResponse = self
            .post_json("/api/generate", &request, |message| Error::ServiceDegraded {
                service: "generation".to_string(),
                attempts: 1,
                message,
            })
            .await?;
        Ok(response.response.trim().to_string())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.embedding_model, text_len = text.len(), "embedding text");

        let request = EmbeddingRequest { model: &self.embedding_model, prompt: text };
        let response: EmbeddingResponse = self
            .post_json("/api/embeddings", &request, |message| Error::Embedding {
                provider: PROVIDER.to_string(),
                message,
            })
            .await?;
        Ok(response.embedding)
    }

    fn dimensions(&self) -> usize {
        self.embedding_dimensions
    }
}
