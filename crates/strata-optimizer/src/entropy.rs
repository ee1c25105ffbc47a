// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step 4: entropy filtering.
//!
//! Drops entries too short or too repetitive to carry information.

use crate::text::normalized_entropy;
use crate::types::{Candidate, OptimizerStats};

pub fn filter_low_entropy(
    candidates: Vec<Candidate>,
    entropy_min: f64,
    min_content_len: usize,
    stats: &mut OptimizerStats,
) -> Vec<Candidate> {
    let mut kept = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate.content.chars().count() < min_content_len {
            stats.low_entropy_removed += 1;
            continue;
        }
        if normalized_entropy(&candidate.content) < entropy_min {
            stats.low_entropy_removed += 1;
            continue;
        }
        kept.push(candidate);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_repetitive_entries_are_dropped() {
        let mut stats = OptimizerStats::default();
        let out = filter_low_entropy(
            vec![
                Candidate::new("short", "hey", 0.9),
                Candidate::new("noise", "zzzzzzzzzzzzzzzzzzzz", 0.8),
                Candidate::new("real", "Postgres uses MVCC for concurrent reads.", 0.7),
            ],
            0.3,
            10,
            &mut stats,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "real");
        assert_eq!(stats.low_entropy_removed, 2);
    }

    #[test]
    fn boundary_length_is_inclusive() {
        let mut stats = OptimizerStats::default();
        let out = filter_low_entropy(
            vec![Candidate::new("edge", "exactly10!", 0.9)],
            0.0,
            10,
            &mut stats,
        );
        assert_eq!(out.len(), 1);
    }
}
