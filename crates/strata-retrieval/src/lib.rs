// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retrieval for the Strata memory engine.
//!
//! Combines vector-similarity ANN and field-weighted lexical search over
//! one store table, fuses the two lists with Reciprocal Rank Fusion
//! (`w / (60 + rank)`), and returns a deterministic ranking with per-hit
//! score breakdowns. Filter predicates are compiled once and pushed down
//! into both subqueries; optional relaxation widens the filter when too few
//! results pass.

pub mod retriever;
pub mod rrf;

pub use retriever::{
    FusionKind, HybridRetriever, RetrievalMetrics, RetrievalMode, RetrievalOutcome,
    RetrievalRequest, RetrievedHit,
};
pub use rrf::{rrf_fuse, weighted_fuse, RRF_C};
