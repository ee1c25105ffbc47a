// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step 2: diversity sampling.
//!
//! Caps how many survivors may originate from a single source. The list
//! arrives score-descending, so dropping later entries drops the
//! lowest-scoring excess.

use std::collections::HashMap;

use crate::types::{Candidate, OptimizerStats};

pub fn enforce_source_diversity(
    candidates: Vec<Candidate>,
    max_per_source: usize,
    stats: &mut OptimizerStats,
) -> Vec<Candidate> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut diverse = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let source = candidate
            .source_id
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let count = counts.entry(source).or_insert(0);
        if *count < max_per_source {
            *count += 1;
            diverse.push(candidate);
        } else {
            stats.diversity_filtered += 1;
        }
    }
    diverse
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, source: &str, score: f64) -> Candidate {
        Candidate::new(id, format!("content {id}"), score).with_source(source)
    }

    #[test]
    fn cap_drops_lowest_scoring_excess() {
        let mut stats = OptimizerStats::default();
        let out = enforce_source_diversity(
            vec![
                candidate("a", "s1", 0.9),
                candidate("b", "s1", 0.8),
                candidate("c", "s1", 0.7),
                candidate("d", "s1", 0.6),
                candidate("e", "s2", 0.5),
            ],
            3,
            &mut stats,
        );
        let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "e"]);
        assert_eq!(stats.diversity_filtered, 1);
    }

    #[test]
    fn entries_without_source_share_one_bucket() {
        let mut stats = OptimizerStats::default();
        let out = enforce_source_diversity(
            vec![
                Candidate::new("a", "x", 0.9),
                Candidate::new("b", "y", 0.8),
                Candidate::new("c", "z", 0.7),
            ],
            2,
            &mut stats,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(stats.diversity_filtered, 1);
    }

    #[test]
    fn under_cap_lists_pass_through() {
        let mut stats = OptimizerStats::default();
        let out = enforce_source_diversity(
            vec![candidate("a", "s1", 0.9), candidate("b", "s2", 0.8)],
            3,
            &mut stats,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(stats.diversity_filtered, 0);
    }
}
