// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result types returned by the memory facade.

use serde::{Deserialize, Serialize};

use strata_cache::CacheHitKind;
use strata_core::types::Classification;
use strata_optimizer::OptimizerStats;

/// One record written by an ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrittenRecord {
    /// `persona`, `knowledge`, `skill`, `process`, or `episodic_event`.
    pub layer: String,
    pub id: String,
}

/// Outcome of [`MemoryEngine::ingest_memory`].
///
/// [`MemoryEngine::ingest_memory`]: crate::engine::MemoryEngine::ingest_memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreOutcome {
    pub written: Vec<WrittenRecord>,
    pub classification: Classification,
    /// Cache entries invalidated by this write.
    pub invalidated: usize,
}

/// One entry in a retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedEntry {
    pub id: String,
    pub content: String,
    pub title: Option<String>,
    pub source_id: Option<String>,
    pub vector_score: f32,
    pub lex_score: f64,
    pub fused_score: f64,
    pub relevance: f64,
    pub importance: f64,
    pub has_contradiction: bool,
    pub compressed: bool,
    pub truncated: bool,
    pub reasons: Vec<String>,
}

/// Outcome of [`MemoryEngine::retrieve`].
///
/// [`MemoryEngine::retrieve`]: crate::engine::MemoryEngine::retrieve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub entries: Vec<RetrievedEntry>,
    pub stats: OptimizerStats,
    /// How the cache satisfied the query, if it did.
    pub cache_hit_kind: Option<CacheHitKind>,
    /// Set when backpressure degraded the retrieval path.
    pub degraded: bool,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            stats: OptimizerStats::default(),
            cache_hit_kind: None,
            degraded: false,
        }
    }
}

/// A recent raw message inside a [`Context`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: String,
    pub content: String,
    pub created_at: String,
}

/// Structured context assembled by
/// [`MemoryEngine::get_context`](crate::engine::MemoryEngine::get_context):
/// persona snapshot, optimizer-trimmed semantic and episodic hits, and the
/// most recent raw messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub user_id: String,
    pub persona: Option<serde_json::Value>,
    pub semantic: Vec<RetrievedEntry>,
    pub episodic: Vec<RetrievedEntry>,
    pub recent_messages: Vec<ContextMessage>,
    pub stats: OptimizerStats,
}
