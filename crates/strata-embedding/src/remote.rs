// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote embedding provider over HTTP.
//!
//! Speaks the common `/v1/embeddings` JSON shape: POST `{model, input}`,
//! bearer auth, response `{data: [{embedding: [...]}]}`. Transient failures
//! (429, 5xx, transport) are retried with jittered exponential backoff
//! before surfacing as `StrataError::Transient`.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, warn};

use strata_core::error::StrataError;
use strata_core::traits::adapter::BackendAdapter;
use strata_core::traits::Embedder;
use strata_core::types::{BackendKind, EmbeddingInput, EmbeddingOutput, HealthStatus};

/// Maximum attempts for one embedding request.
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff before jitter.
const BASE_BACKOFF_MS: u64 = 250;

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Remote embedding provider.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl RemoteEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, StrataError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(StrataError::Validation(
                "remote embedder requires a non-empty API key".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StrataError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            dimensions,
        })
    }

    async fn request_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StrataError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StrataError::transient_with("embedding request failed", e))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(StrataError::transient(format!(
                "embedding provider returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(StrataError::Validation(format!(
                "embedding provider rejected the request: {status}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| StrataError::transient_with("malformed embedding response", e))?;

        let embeddings: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for emb in &embeddings {
            if emb.len() != self.dimensions {
                return Err(StrataError::Internal(format!(
                    "embedding provider returned dimension {}, expected {}",
                    emb.len(),
                    self.dimensions
                )));
            }
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl BackendAdapter for RemoteEmbedder {
    fn name(&self) -> &str {
        "remote-embeddings"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 4, 0)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        // A provider round-trip is too expensive for liveness checks;
        // report configuration health only.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        Ok(())
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, StrataError> {
        // The zero-vector rule for empty inputs applies before any network
        // call; blank-only batches never reach the provider.
        let mut non_empty: Vec<String> = Vec::new();
        let mut slots: Vec<Option<usize>> = Vec::with_capacity(input.texts.len());
        for text in &input.texts {
            if text.trim().is_empty() {
                slots.push(None);
            } else {
                slots.push(Some(non_empty.len()));
                non_empty.push(text.clone());
            }
        }

        let fetched = if non_empty.is_empty() {
            Vec::new()
        } else {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match self.request_once(&non_empty).await {
                    Ok(embeddings) => break embeddings,
                    Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                        let jitter = rand::thread_rng().gen_range(0..BASE_BACKOFF_MS);
                        let backoff =
                            Duration::from_millis(BASE_BACKOFF_MS * 2_u64.pow(attempt - 1) + jitter);
                        warn!(attempt, backoff_ms = backoff.as_millis() as u64, error = %e,
                              "embedding request failed, retrying");
                        tokio::time::sleep(backoff).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        if fetched.len() != non_empty.len() {
            return Err(StrataError::Internal(format!(
                "embedding provider returned {} vectors for {} inputs",
                fetched.len(),
                non_empty.len()
            )));
        }

        let embeddings = slots
            .into_iter()
            .map(|slot| match slot {
                Some(i) => fetched[i].clone(),
                None => vec![0.0; self.dimensions],
            })
            .collect();

        debug!(count = input.texts.len(), "remote embeddings generated");
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: self.dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        let result = RemoteEmbedder::new("https://example.invalid/v1/embeddings", " ", "m", 384);
        assert!(matches!(result, Err(StrataError::Validation(_))));
    }

    #[tokio::test]
    async fn blank_only_batch_never_calls_the_network() {
        // The endpoint is unreachable; a network call would error.
        let embedder =
            RemoteEmbedder::new("http://127.0.0.1:1/v1/embeddings", "key", "m", 16).unwrap();
        let out = embedder
            .embed(EmbeddingInput {
                texts: vec!["".into(), "   ".into()],
            })
            .await
            .unwrap();
        assert_eq!(out.embeddings, vec![vec![0.0; 16], vec![0.0; 16]]);
    }
}
