// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding service for the Strata memory engine.
//!
//! Maps text into fixed-dimensional vectors through one of two
//! implementations:
//!
//! - **RemoteEmbedder**: HTTP provider speaking the `/v1/embeddings` shape,
//!   with bounded jittered retries on transient failures
//! - **HashEmbedder**: deterministic SHA-256 projection used when no API key
//!   is configured; keeps the pipeline functional and tests reproducible,
//!   clearly identified as non-semantic
//!
//! The engine holds two [`EmbeddingService`] instances: one for the semantic
//! dimension space and one for the episodic space.

pub mod hash;
pub mod remote;
pub mod service;

pub use hash::HashEmbedder;
pub use remote::RemoteEmbedder;
pub use service::{EmbedderKind, EmbeddingService};
