// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding service facade.
//!
//! Owns one embedder per dimension space and chooses the implementation at
//! construction: remote when an API key is configured, hash fallback when
//! not. A caller who explicitly requests the remote provider without a key
//! gets a `Validation` error instead of a silent downgrade.

use std::sync::Arc;

use tracing::info;

use strata_config::model::EmbeddingConfig;
use strata_core::error::StrataError;
use strata_core::traits::Embedder;
use strata_core::types::{EmbeddingInput, EmbeddingOutput};

use crate::hash::HashEmbedder;
use crate::remote::RemoteEmbedder;

/// Which implementation backs a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    Remote,
    /// Deterministic, non-semantic hash projection.
    HashFallback,
}

/// Embedding service for one dimension space.
#[derive(Clone)]
pub struct EmbeddingService {
    embedder: Arc<dyn Embedder>,
    kind: EmbedderKind,
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("kind", &self.kind)
            .finish()
    }
}

impl EmbeddingService {
    /// Choose an implementation from config: remote when `api_key` is set,
    /// hash fallback otherwise. The choice is logged so a fallback is never
    /// invisible.
    pub fn from_config(config: &EmbeddingConfig, dimensions: usize) -> Result<Self, StrataError> {
        match &config.api_key {
            Some(key) if !key.trim().is_empty() => {
                let remote = RemoteEmbedder::new(
                    config.endpoint.clone(),
                    key.clone(),
                    config.model.clone(),
                    dimensions,
                )?;
                info!(dimensions, model = %config.model, "using remote embedding provider");
                Ok(Self {
                    embedder: Arc::new(remote),
                    kind: EmbedderKind::Remote,
                })
            }
            _ => {
                info!(
                    dimensions,
                    "no embedding API key configured; using deterministic hash fallback \
                     (not a semantic embedder)"
                );
                Ok(Self {
                    embedder: Arc::new(HashEmbedder::new(dimensions)),
                    kind: EmbedderKind::HashFallback,
                })
            }
        }
    }

    /// Require the remote provider; absence of a key is an error, never a
    /// silent fallback.
    pub fn remote_required(config: &EmbeddingConfig, dimensions: usize) -> Result<Self, StrataError> {
        let key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                StrataError::Validation(
                    "remote embedding provider requested but embedding.api_key is not set".into(),
                )
            })?;
        let remote = RemoteEmbedder::new(
            config.endpoint.clone(),
            key,
            config.model.clone(),
            dimensions,
        )?;
        Ok(Self {
            embedder: Arc::new(remote),
            kind: EmbedderKind::Remote,
        })
    }

    /// Build a service around the hash fallback (tests, offline use).
    pub fn fallback(dimensions: usize) -> Self {
        Self {
            embedder: Arc::new(HashEmbedder::new(dimensions)),
            kind: EmbedderKind::HashFallback,
        }
    }

    /// Build a service around an injected embedder implementation.
    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            kind: EmbedderKind::Remote,
        }
    }

    pub fn kind(&self) -> EmbedderKind {
        self.kind
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    /// Embed a single text.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, StrataError> {
        let output = self
            .embedder
            .embed(EmbeddingInput {
                texts: vec![text.to_string()],
            })
            .await?;
        output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| StrataError::Internal("embedder returned no vectors".into()))
    }

    /// Embed a batch of texts, preserving order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<EmbeddingOutput, StrataError> {
        if texts.is_empty() {
            return Ok(EmbeddingOutput {
                embeddings: Vec::new(),
                dimensions: self.dimensions(),
            });
        }
        self.embedder
            .embed(EmbeddingInput {
                texts: texts.to_vec(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_without_key() -> EmbeddingConfig {
        EmbeddingConfig {
            api_key: None,
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn missing_key_selects_fallback_from_config() {
        let svc = EmbeddingService::from_config(&config_without_key(), 384).unwrap();
        assert_eq!(svc.kind(), EmbedderKind::HashFallback);
        assert_eq!(svc.dimensions(), 384);
    }

    #[test]
    fn remote_required_without_key_is_an_error() {
        let err = EmbeddingService::remote_required(&config_without_key(), 384).unwrap_err();
        assert!(matches!(err, StrataError::Validation(_)));
    }

    #[tokio::test]
    async fn embed_text_empty_returns_zero_vector() {
        let svc = EmbeddingService::fallback(64);
        let v = svc.embed_text("").await.unwrap();
        assert_eq!(v, vec![0.0; 64]);
    }

    #[tokio::test]
    async fn embed_batch_preserves_order() {
        let svc = EmbeddingService::fallback(32);
        let out = svc
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(out.embeddings.len(), 2);
        assert_eq!(out.embeddings[0], svc.embed_text("first").await.unwrap());
        assert_eq!(out.embeddings[1], svc.embed_text("second").await.unwrap());
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let svc = EmbeddingService::fallback(32);
        let out = svc.embed_batch(&[]).await.unwrap();
        assert!(out.embeddings.is_empty());
        assert_eq!(out.dimensions, 32);
    }
}
