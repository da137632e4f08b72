use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{EmbeddingProvider, GenerationProvider, ProviderError, RetryPolicy};
use crate::config::{EmbeddingConfig, GenerationConfig};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Client for an Ollama-compatible HTTP API
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn for_embeddings(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.url,
            Duration::from_secs(config.timeout_secs),
            RetryPolicy::new(config.max_retries),
        )
    }

    pub fn for_generation(config: &GenerationConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.url,
            Duration::from_secs(config.timeout_secs),
            RetryPolicy::new(config.max_retries),
        )
    }

    /// POST `body` to `path`, retrying retryable failures with backoff.
    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = self.retry.delay(attempt - 1);
                debug!("Retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            let error = match self.client.post(&url).json(body).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    ProviderError::Status { status, body }
                }
                Err(e) if e.is_timeout() => ProviderError::Timeout { url: url.clone() },
                Err(e) => ProviderError::Transport {
                    url: url.clone(),
                    source: e,
                },
            };

            if !error.is_retryable() {
                return Err(error);
            }
            warn!("Provider call to {} failed: {}", url, error);
            last = Some(error);
        }

        Err(ProviderError::RetriesExhausted {
            attempts: self.retry.max_retries + 1,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .post("/api/embeddings", &EmbeddingRequest { model, prompt: text })
            .await?;
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if parsed.embedding.is_empty() {
            return Err(ProviderError::Malformed("empty embedding".to_string()));
        }
        parsed
            .embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| ProviderError::Malformed(format!("non-numeric value {}", v)))
            })
            .collect()
    }
}

#[async_trait]
impl GenerationProvider for OllamaClient {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let response = self.post("/api/generate", &request).await?;
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        parsed
            .response
            .ok_or_else(|| ProviderError::Malformed("missing response field".to_string()))
    }
}
