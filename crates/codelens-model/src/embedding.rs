//! Embedding client for Ollama's `/api/embed` endpoint.

use crate::config::EmbeddingConfig;
use crate::error::{ModelError, ModelResult};
use crate::EmbeddingModel;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Embedding model served by a local Ollama instance.
#[derive(Debug)]
pub struct OllamaEmbeddingModel {
    client: reqwest::blocking::Client,
    config: EmbeddingConfig,
}

impl OllamaEmbeddingModel {
    pub fn new(config: &EmbeddingConfig) -> ModelResult<Self> {
        if config.dimension == 0 {
            return Err(ModelError::invalid_config("embedding dimension must be > 0"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| ModelError::invalid_config(format!("failed to build HTTP client: {}", e)))?;

        debug!("Embedding model '{}' via {}", config.model_id, config.base_url);
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.config.base_url.trim_end_matches('/'))
    }

    fn failed(&self, message: impl Into<String>) -> ModelError {
        ModelError::EmbeddingFailed {
            model_id: self.config.model_id.clone(),
            message: message.into(),
        }
    }
}

impl EmbeddingModel for OllamaEmbeddingModel {
    fn embed(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.endpoint())
            .json(&EmbedRequest {
                model: &self.config.model_id,
                input: texts,
            })
            .send()
            .map_err(|e| ModelError::request("ollama", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::HttpStatus {
                provider: "ollama".to_string(),
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .map_err(|e| self.failed(format!("malformed response: {}", e)))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(self.failed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        if let Some(bad) = parsed
            .embeddings
            .iter()
            .find(|e| e.len() != self.config.dimension)
        {
            return Err(self.failed(format!(
                "expected dimension {}, got {}",
                self.config.dimension,
                bad.len()
            )));
        }

        Ok(parsed.embeddings)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }
}
