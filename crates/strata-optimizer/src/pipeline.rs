// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The optimization pipeline in its fixed order:
//!
//! 1. Deduplication (exact, then semantic)
//! 2. Diversity sampling
//! 3. Contradiction detection (flags, never drops)
//! 4. Entropy filtering
//! 5. Query-focused compression
//! 6. Adaptive re-ranking
//! 7. Token-budget enforcement
//!
//! A fired deadline between steps short-circuits the rest and returns the
//! current list with `truncated = true`; pending work is dropped, not
//! leaked.

use strata_core::deadline::Deadline;
use strata_core::error::StrataError;
use strata_core::types::clamp_unit;

use crate::budget::enforce_token_budget;
use crate::compress::compress_candidates;
use crate::contradiction::{detect_contradictions, NliDetector};
use crate::dedup::{remove_exact_duplicates, remove_semantic_duplicates};
use crate::diversity::enforce_source_diversity;
use crate::entropy::filter_low_entropy;
use crate::profiles::OptimizerParams;
use crate::rerank::{rerank, RelevanceFn};
use crate::text::estimate_tokens;
use crate::types::{Candidate, OptimizedContext, OptimizerStats};

/// The context optimizer. Stateless across runs; scratch memory is bounded
/// by the candidate list the caller hands in.
pub struct Optimizer {
    params: OptimizerParams,
}

impl Optimizer {
    pub fn new(params: OptimizerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }

    /// Bypass the pipeline entirely (backpressure degradation). The list
    /// passes through unchanged with `optimizer_skipped = true`.
    pub fn skipped(candidates: Vec<Candidate>) -> OptimizedContext {
        let tokens = total_tokens(&candidates);
        let stats = OptimizerStats {
            original_count: candidates.len(),
            original_tokens: tokens,
            final_count: candidates.len(),
            final_tokens: tokens,
            optimizer_skipped: true,
            ..OptimizerStats::default()
        };
        OptimizedContext {
            entries: candidates,
            stats,
        }
    }

    /// Run the full pipeline over a retrieved candidate list.
    pub async fn optimize(
        &self,
        candidates: Vec<Candidate>,
        query: &str,
        nli: Option<&dyn NliDetector>,
        ranker: Option<&RelevanceFn>,
        deadline: &Deadline,
    ) -> Result<OptimizedContext, StrataError> {
        let mut stats = OptimizerStats {
            original_count: candidates.len(),
            original_tokens: total_tokens(&candidates),
            ..OptimizerStats::default()
        };

        if candidates.is_empty() {
            return Ok(finalize(Vec::new(), stats, false));
        }
        // A zero budget means no context at all; this is configuration, not
        // a skip.
        if self.params.max_context_tokens == 0 {
            return Ok(finalize(Vec::new(), stats, false));
        }

        // Scores and importances entering the rankers are clamped to [0, 1].
        let mut current = candidates;
        for candidate in &mut current {
            candidate.score = clamp_unit(candidate.score);
            candidate.importance = clamp_unit(candidate.importance);
        }
        // Establish descending score order so every "drop the lower-scoring
        // one" decision below is order-independent.
        current.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        // 1. Deduplication
        current = remove_exact_duplicates(current, &mut stats);
        current = remove_semantic_duplicates(
            current,
            self.params.similarity_threshold,
            &mut stats,
        );
        if deadline.expired() {
            return Ok(finalize(current, stats, true));
        }

        // 2. Diversity sampling
        current = enforce_source_diversity(current, self.params.max_per_source, &mut stats);
        if deadline.expired() {
            return Ok(finalize(current, stats, true));
        }

        // 3. Contradiction detection
        if self.params.enable_contradiction {
            detect_contradictions(
                &mut current,
                self.params.contradiction_lo,
                self.params.contradiction_hi,
                nli,
                &mut stats,
            )
            .await?;
        }
        if deadline.expired() {
            return Ok(finalize(current, stats, true));
        }

        // 4. Entropy filter
        current = filter_low_entropy(
            current,
            self.params.entropy_min,
            self.params.min_content_len,
            &mut stats,
        );
        if deadline.expired() {
            return Ok(finalize(current, stats, true));
        }

        // 5. Compression
        compress_candidates(
            &mut current,
            query,
            self.params.max_context_tokens,
            self.params.context_window,
            &mut stats,
        );
        if deadline.expired() {
            return Ok(finalize(current, stats, true));
        }

        // 6. Adaptive re-ranking
        current = rerank(
            current,
            query,
            self.params.rerank_threshold_base,
            self.params.max_iterations,
            self.params.min_kept,
            self.params.enable_adaptive_threshold,
            ranker,
            &mut stats,
        );
        if deadline.expired() {
            return Ok(finalize(current, stats, true));
        }

        // 7. Token-budget enforcement
        current = enforce_token_budget(current, self.params.max_context_tokens, &mut stats);

        let out = finalize(current, stats, false);
        tracing::debug!(
            original = out.stats.original_count,
            kept = out.stats.final_count,
            tokens = out.stats.final_tokens,
            reduction_pct = out.stats.reduction_percentage,
            "context optimization complete"
        );
        Ok(out)
    }
}

fn total_tokens(candidates: &[Candidate]) -> usize {
    candidates
        .iter()
        .map(|c| estimate_tokens(&c.content))
        .sum()
}

fn finalize(
    entries: Vec<Candidate>,
    mut stats: OptimizerStats,
    truncated: bool,
) -> OptimizedContext {
    stats.final_count = entries.len();
    stats.final_tokens = total_tokens(&entries);
    stats.truncated = truncated;
    stats.reduction_percentage =
        100.0 * (1.0 - stats.final_tokens as f64 / stats.original_tokens.max(1) as f64);
    OptimizedContext { entries, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::OptimizerProfile;

    fn optimizer() -> Optimizer {
        Optimizer::new(OptimizerProfile::Balanced.params())
    }

    fn entry(id: &str, content: &str, score: f64) -> Candidate {
        Candidate::new(id, content, score)
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let out = optimizer()
            .optimize(Vec::new(), "query", None, None, &Deadline::none())
            .await
            .unwrap();
        assert!(out.entries.is_empty());
        assert_eq!(out.stats.original_count, 0);
        assert_eq!(out.stats.final_count, 0);
        assert!(!out.stats.optimizer_skipped);
    }

    #[tokio::test]
    async fn zero_token_budget_returns_empty_without_skipping() {
        let mut params = OptimizerProfile::Balanced.params();
        params.max_context_tokens = 0;
        let out = Optimizer::new(params)
            .optimize(
                vec![entry("a", "some informative content here", 0.9)],
                "query",
                None,
                None,
                &Deadline::none(),
            )
            .await
            .unwrap();
        assert!(out.entries.is_empty());
        assert!(!out.stats.optimizer_skipped);
        assert_eq!(out.stats.original_count, 1);
    }

    #[tokio::test]
    async fn pipeline_is_monotonic_and_respects_budget() {
        let candidates: Vec<Candidate> = (0..20)
            .map(|i| {
                let mut axis = vec![0.0f32; 20];
                axis[i] = 1.0;
                entry(
                    &format!("c{i:02}"),
                    &format!("Entry {i} discussing retrieval ranking and caching strategies"),
                    0.9 - i as f64 * 0.01,
                )
                .with_source(&format!("s{}", i % 4))
                .with_embedding(axis)
            })
            .collect();
        let original = candidates.len();

        let out = optimizer()
            .optimize(
                candidates,
                "retrieval ranking caching",
                None,
                None,
                &Deadline::none(),
            )
            .await
            .unwrap();

        assert!(out.stats.final_count <= original);
        assert!(out.stats.final_tokens <= 4000);
        assert_eq!(out.entries.len(), out.stats.final_count);
        // Preservation: min_kept survives when nothing is hard-dropped.
        assert!(out.stats.final_count >= 3.min(original));
    }

    #[tokio::test]
    async fn out_of_range_scores_are_clamped() {
        let mut c = entry("a", "content long enough to pass entropy checks", 5.0);
        c.importance = -2.0;
        let out = optimizer()
            .optimize(
                vec![c],
                "content entropy checks",
                None,
                None,
                &Deadline::none(),
            )
            .await
            .unwrap();
        assert!(out.entries[0].score <= 1.0);
        assert!(out.entries[0].importance >= 0.0);
    }

    #[tokio::test]
    async fn semantic_dedup_scenario() {
        // Three entries, two semantically equivalent: two survive.
        let mut params = OptimizerProfile::Balanced.params();
        params.similarity_threshold = 0.85;
        // Keep the rerank stage from dropping the survivors.
        params.rerank_threshold_base = 0.5;
        params.min_kept = 2;
        let out = Optimizer::new(params)
            .optimize(
                vec![
                    entry("a", "Machine learning is a subset of AI.", 0.9)
                        .with_embedding(vec![1.0, 0.0]),
                    entry("b", "ML is a subset of artificial intelligence.", 0.8)
                        .with_embedding(vec![0.99, 0.141]),
                    entry("c", "Python is a programming language.", 0.7)
                        .with_embedding(vec![0.0, 1.0]),
                ],
                "machine learning python",
                None,
                None,
                &Deadline::none(),
            )
            .await
            .unwrap();
        assert_eq!(out.stats.duplicates_removed, 1);
        let ids: Vec<&str> = out.entries.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&"a"));
        assert!(ids.contains(&"c"));
        assert!(!ids.contains(&"b"));
    }

    #[tokio::test]
    async fn contradictions_are_flagged_not_dropped() {
        let out = optimizer()
            .optimize(
                vec![
                    // Similar enough to speak about the same thing (0.75)
                    // but below the dedup threshold.
                    entry("a", "The service is online.", 0.9).with_embedding(vec![1.0, 0.0]),
                    entry("b", "The service is offline.", 0.8)
                        .with_embedding(vec![0.75, 0.661_437_8]),
                ],
                "service online status",
                None,
                None,
                &Deadline::none(),
            )
            .await
            .unwrap();
        assert_eq!(out.stats.contradictions_detected, 1);
        assert_eq!(out.entries.len(), 2);
        assert!(out.entries.iter().all(|c| c.has_contradiction));
    }

    #[tokio::test]
    async fn dedup_bound_allows_contradiction_pairs() {
        // Surviving similar pairs must carry contradiction flags.
        let out = optimizer()
            .optimize(
                vec![
                    entry("a", "The pipeline is enabled today.", 0.9)
                        .with_embedding(vec![1.0, 0.0]),
                    entry("b", "The pipeline is disabled today.", 0.8)
                        .with_embedding(vec![0.75, 0.661_437_8]),
                ],
                "pipeline status today",
                None,
                None,
                &Deadline::none(),
            )
            .await
            .unwrap();
        for window in out.entries.windows(2) {
            if let (Some(ea), Some(eb)) = (&window[0].embedding, &window[1].embedding) {
                let sim = strata_core::types::cosine_similarity(ea, eb);
                if f64::from(sim) >= 0.80 {
                    assert!(window[0].has_contradiction && window[1].has_contradiction);
                }
            }
        }
    }

    #[tokio::test]
    async fn expired_deadline_returns_partial_with_flag() {
        let candidates: Vec<Candidate> = (0..5)
            .map(|i| entry(&format!("c{i}"), "informative content for the run", 0.9))
            .collect();
        let deadline = Deadline::none();
        deadline.cancel();
        let out = optimizer()
            .optimize(candidates, "query", None, None, &deadline)
            .await
            .unwrap();
        assert!(out.stats.truncated);
    }

    #[tokio::test]
    async fn skipped_passthrough_sets_flag() {
        let out = Optimizer::skipped(vec![entry("a", "anything at all", 0.5)]);
        assert!(out.stats.optimizer_skipped);
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.stats.final_count, 1);
    }

    #[tokio::test]
    async fn diversity_cap_holds_in_the_full_pipeline() {
        let candidates: Vec<Candidate> = (0..8)
            .map(|i| {
                let mut axis = vec![0.0f32; 8];
                axis[i] = 1.0;
                entry(
                    &format!("c{i}"),
                    &format!("Distinct retrieval fact number {i} about caching"),
                    0.9 - i as f64 * 0.05,
                )
                .with_source("same-conversation")
                .with_embedding(axis)
            })
            .collect();
        let out = optimizer()
            .optimize(
                candidates,
                "retrieval caching fact",
                None,
                None,
                &Deadline::none(),
            )
            .await
            .unwrap();
        let from_same = out
            .entries
            .iter()
            .filter(|c| c.source_id.as_deref() == Some("same-conversation"))
            .count();
        assert!(from_same <= 3);
        assert!(out.stats.diversity_filtered >= 5);
    }
}
