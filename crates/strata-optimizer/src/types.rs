// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate and statistics types for the optimization pipeline.

use serde::{Deserialize, Serialize};

/// One retrieved entry flowing through the optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub content: String,
    /// Origin identifier for diversity sampling.
    pub source_id: Option<String>,
    /// Incoming retrieval score; clamped into [0, 1] before use.
    pub score: f64,
    /// Embedding for semantic comparisons; a bag-of-words projection is
    /// substituted when absent.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub importance: f64,
    /// Pinned entries survive deduplication.
    pub keep: bool,
    pub has_contradiction: bool,
    /// Indices (into the surviving list) of entries this one contradicts.
    pub contradicts_with: Vec<usize>,
    pub compressed: bool,
    pub truncated: bool,
    /// Relevance assigned by the re-ranking step.
    pub relevance: f64,
}

impl Candidate {
    pub fn new(id: impl Into<String>, content: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source_id: None,
            score,
            embedding: None,
            importance: 0.5,
            keep: false,
            has_contradiction: false,
            contradicts_with: Vec::new(),
            compressed: false,
            truncated: false,
            relevance: 0.0,
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Counts removed at every step, plus the knobs the adaptive stages chose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizerStats {
    pub original_count: usize,
    pub original_tokens: usize,
    pub duplicates_removed: usize,
    pub diversity_filtered: usize,
    pub contradictions_detected: usize,
    pub low_entropy_removed: usize,
    pub compressed_count: usize,
    pub rerank_removed: usize,
    pub rerank_iterations: usize,
    pub adaptive_threshold: Option<f64>,
    pub budget_dropped: usize,
    pub final_count: usize,
    pub final_tokens: usize,
    pub reduction_percentage: f64,
    /// Set when backpressure bypassed the whole pipeline.
    pub optimizer_skipped: bool,
    /// Set when a deadline cut the pipeline short; the list is partial.
    pub truncated: bool,
}

/// The optimizer's return value.
#[derive(Debug, Clone)]
pub struct OptimizedContext {
    pub entries: Vec<Candidate>,
    pub stats: OptimizerStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_builder_defaults() {
        let c = Candidate::new("a", "text", 0.9)
            .with_source("conv-1")
            .with_embedding(vec![0.1, 0.2]);
        assert_eq!(c.source_id.as_deref(), Some("conv-1"));
        assert!(!c.keep);
        assert!(!c.has_contradiction);
        assert!(c.contradicts_with.is_empty());
        assert_eq!(c.embedding.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn stats_default_flags_are_clear() {
        let stats = OptimizerStats::default();
        assert!(!stats.optimizer_skipped);
        assert!(!stats.truncated);
        assert!(stats.adaptive_threshold.is_none());
    }
}
