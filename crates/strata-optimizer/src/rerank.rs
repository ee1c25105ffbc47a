// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step 6: re-ranking with an adaptive threshold.
//!
//! Each surviving entry gets a relevance score (Jaccard overlap of query
//! and content tokens, or an injected ranker). The drop threshold adapts to
//! the score distribution:
//!
//! - IQR > 0.3 (spread-out scores): `max(T_base - 0.1, q50 * 0.8)`
//! - IQR < 0.15 (tight scores): `min(T_base + 0.05, q50 * 0.95)`
//! - otherwise: `(T_base + q50) / 2`
//!
//! clamped into [0.50, 0.80]. Entries below the threshold drop unless that
//! would leave fewer than `min_kept`, in which case the top `min_kept`
//! stay. Iterates up to `max_iterations`, stopping early when nothing
//! drops.

use crate::text::jaccard;
use crate::types::{Candidate, OptimizerStats};

/// Pluggable relevance scorer; the default is Jaccard token overlap.
pub type RelevanceFn = dyn Fn(&str, &str) -> f64 + Send + Sync;

/// Quartiles of a score list (computed over a descending sort).
fn quartiles(scores: &[f64]) -> (f64, f64, f64) {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let q75 = sorted[n / 4];
    let q50 = sorted[n / 2];
    let q25 = if n >= 4 { sorted[3 * n / 4] } else { sorted[n - 1] };
    (q25, q50, q75)
}

/// The adaptive threshold for one iteration's score distribution.
pub fn adaptive_threshold(scores: &[f64], base: f64) -> f64 {
    if scores.len() < 3 {
        return base;
    }
    let (q25, q50, q75) = quartiles(scores);
    let iqr = q75 - q25;
    let threshold = if iqr > 0.3 {
        (base - 0.1).max(q50 * 0.8)
    } else if iqr < 0.15 {
        (base + 0.05).min(q50 * 0.95)
    } else {
        (base + q50) / 2.0
    };
    threshold.clamp(0.5, 0.8)
}

/// Run the re-ranking loop. Returns the surviving entries sorted by
/// relevance descending (ties by id for determinism).
pub fn rerank(
    candidates: Vec<Candidate>,
    query: &str,
    base_threshold: f64,
    max_iterations: usize,
    min_kept: usize,
    adaptive: bool,
    ranker: Option<&RelevanceFn>,
    stats: &mut OptimizerStats,
) -> Vec<Candidate> {
    let mut current = candidates;
    let mut threshold = base_threshold;

    for iteration in 1..=max_iterations {
        stats.rerank_iterations = iteration;

        for candidate in &mut current {
            candidate.relevance = match ranker {
                Some(f) => f(query, &candidate.content),
                None => jaccard(query, &candidate.content),
            };
        }
        current.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        if current.is_empty() {
            break;
        }

        let scores: Vec<f64> = current.iter().map(|c| c.relevance).collect();
        if adaptive {
            threshold = adaptive_threshold(&scores, base_threshold);
            stats.adaptive_threshold = Some(threshold);
        }

        // Converged: nothing below the threshold.
        let min_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
        if min_score >= threshold {
            break;
        }

        let surviving: usize = current.iter().filter(|c| c.relevance >= threshold).count();
        if surviving < min_kept {
            // Keep the top min_kept regardless of the threshold.
            let kept = min_kept.min(current.len());
            stats.rerank_removed += current.len() - kept;
            current.truncate(kept);
            break;
        }

        stats.rerank_removed += current.len() - surviving;
        current.retain(|c| c.relevance >= threshold);
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_threshold_follows_the_three_regimes() {
        // High variance: IQR > 0.3.
        let spread = vec![0.95, 0.9, 0.6, 0.3, 0.1];
        let t = adaptive_threshold(&spread, 0.65);
        assert!((t - (0.65_f64 - 0.1).max(0.6 * 0.8)).abs() < 1e-9);

        // Low variance: IQR < 0.15.
        let tight = vec![0.70, 0.69, 0.68, 0.67, 0.66];
        let t = adaptive_threshold(&tight, 0.65);
        assert!((t - (0.65_f64 + 0.05).min(0.68 * 0.95)).abs() < 1e-9);

        // Medium variance: mean of base and median.
        let medium = vec![0.8, 0.7, 0.6, 0.55, 0.5];
        let t = adaptive_threshold(&medium, 0.65);
        assert!((t - (0.65 + 0.6) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn adaptive_threshold_clamps_into_half_to_point_eight() {
        let low = vec![0.1, 0.1, 0.1, 0.1];
        assert!(adaptive_threshold(&low, 0.5) >= 0.5);
        let high = vec![1.0, 1.0, 1.0, 1.0];
        assert!(adaptive_threshold(&high, 0.8) <= 0.8);
    }

    #[test]
    fn fewer_than_three_scores_keep_the_base() {
        assert_eq!(adaptive_threshold(&[0.9, 0.1], 0.65), 0.65);
    }

    #[test]
    fn min_kept_overrides_the_threshold() {
        let candidates = vec![
            Candidate::new("a", "vector search ranking quality", 0.9),
            Candidate::new("b", "completely unrelated gardening", 0.8),
            Candidate::new("c", "totally different cooking topic", 0.7),
            Candidate::new("d", "another offtopic entry about music", 0.6),
        ];
        let mut stats = OptimizerStats::default();
        let out = rerank(
            candidates,
            "vector search ranking",
            0.65,
            3,
            3,
            false,
            None,
            &mut stats,
        );
        // Only one entry beats 0.65, but min_kept forces three.
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].id, "a");
        assert_eq!(stats.rerank_removed, 1);
    }

    #[test]
    fn converged_lists_stop_early() {
        let candidates = vec![
            Candidate::new("a", "alpha beta", 0.9),
            Candidate::new("b", "alpha beta", 0.8),
            Candidate::new("c", "alpha beta", 0.7),
        ];
        let mut stats = OptimizerStats::default();
        let out = rerank(
            candidates,
            "alpha beta",
            0.65,
            3,
            1,
            false,
            None,
            &mut stats,
        );
        assert_eq!(out.len(), 3);
        assert_eq!(stats.rerank_iterations, 1, "no drops means one pass");
    }

    #[test]
    fn injected_ranker_replaces_jaccard() {
        let candidates = vec![
            Candidate::new("a", "first", 0.9),
            Candidate::new("b", "second", 0.8),
            Candidate::new("c", "third", 0.7),
        ];
        let constant: Box<RelevanceFn> = Box::new(|_q, _c| 0.9);
        let mut stats = OptimizerStats::default();
        let out = rerank(
            candidates,
            "anything",
            0.65,
            3,
            1,
            false,
            Some(constant.as_ref()),
            &mut stats,
        );
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|c| (c.relevance - 0.9).abs() < 1e-9));
    }

    #[test]
    fn relevance_ordering_is_deterministic_on_ties() {
        let candidates = vec![
            Candidate::new("b", "same words here", 0.8),
            Candidate::new("a", "same words here", 0.9),
        ];
        let mut stats = OptimizerStats::default();
        let out = rerank(
            candidates,
            "same words",
            0.50,
            1,
            1,
            false,
            None,
            &mut stats,
        );
        assert_eq!(out[0].id, "a", "ties break by id");
    }
}
