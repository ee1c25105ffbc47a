// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding capability trait.

use async_trait::async_trait;

use crate::error::StrataError;
use crate::traits::adapter::BackendAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Capability for mapping text into fixed-dimensional vectors.
///
/// Implementations include a remote model provider and a deterministic
/// content-hash fallback. The fallback is not a search-quality substitute;
/// it keeps the pipeline functional and tests reproducible, and is never
/// selected silently when a real provider was requested.
#[async_trait]
pub trait Embedder: BackendAdapter {
    /// The output dimension every returned vector has.
    fn dimensions(&self) -> usize;

    /// Generates embeddings for the given input texts.
    ///
    /// An empty or whitespace-only text maps to the zero vector of the
    /// configured dimension.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, StrataError>;
}
