// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic content-hash embedder.
//!
//! Projects SHA-256 digests of the input into a unit vector of the
//! configured dimension. NOT a semantic embedder: identical texts map to
//! identical vectors, but similar texts do not map to nearby vectors. It
//! exists to keep the pipeline functional without a model provider and to
//! make tests reproducible, and is never selected silently when a remote
//! provider was requested.

use async_trait::async_trait;
use ring::digest::{digest, SHA256};

use strata_core::error::StrataError;
use strata_core::traits::adapter::BackendAdapter;
use strata_core::traits::Embedder;
use strata_core::types::{BackendKind, EmbeddingInput, EmbeddingOutput, HealthStatus};

/// Hash-projection embedder with a fixed output dimension.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Embed one text deterministically.
    ///
    /// Empty or whitespace-only input returns the zero vector.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        if text.trim().is_empty() {
            return vec![0.0; self.dimensions];
        }

        let seed = digest(&SHA256, text.as_bytes());
        let mut values = Vec::with_capacity(self.dimensions);
        let mut block: u32 = 0;
        while values.len() < self.dimensions {
            let mut material = seed.as_ref().to_vec();
            material.extend_from_slice(&block.to_be_bytes());
            let chunk = digest(&SHA256, &material);
            for pair in chunk.as_ref().chunks_exact(2) {
                if values.len() == self.dimensions {
                    break;
                }
                let raw = u16::from_be_bytes([pair[0], pair[1]]) as f32;
                // Map [0, 65535] into [-1, 1].
                values.push(raw / 32767.5 - 1.0);
            }
            block += 1;
        }

        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }
        values
    }
}

#[async_trait]
impl BackendAdapter for HashEmbedder {
    fn name(&self) -> &str {
        "hash-fallback"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 4, 0)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        Ok(())
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, StrataError> {
        let embeddings = input
            .texts
            .iter()
            .map(|t| self.embed_text(t))
            .collect::<Vec<_>>();
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: self.dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::types::cosine_similarity;

    #[test]
    fn deterministic_across_calls() {
        let e = HashEmbedder::new(384);
        let a = e.embed_text("the user prefers rust");
        let b = e.embed_text("the user prefers rust");
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
    }

    #[test]
    fn distinct_texts_produce_distinct_vectors() {
        let e = HashEmbedder::new(384);
        let a = e.embed_text("alpha");
        let b = e.embed_text("beta");
        assert_ne!(a, b);
        // Hash vectors of distinct texts are approximately orthogonal.
        assert!(cosine_similarity(&a, &b).abs() < 0.3);
    }

    #[test]
    fn output_is_unit_length() {
        let e = HashEmbedder::new(1536);
        let v = e.embed_text("normalize me");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn empty_input_is_the_zero_vector() {
        let e = HashEmbedder::new(64);
        assert_eq!(e.embed_text(""), vec![0.0; 64]);
        assert_eq!(e.embed_text("   \n"), vec![0.0; 64]);
    }

    #[tokio::test]
    async fn batch_embedding_matches_single() {
        let e = HashEmbedder::new(128);
        let out = e
            .embed(EmbeddingInput {
                texts: vec!["one".into(), "two".into()],
            })
            .await
            .unwrap();
        assert_eq!(out.embeddings.len(), 2);
        assert_eq!(out.dimensions, 128);
        assert_eq!(out.embeddings[0], e.embed_text("one"));
    }
}
