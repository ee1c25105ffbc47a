// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step 3: contradiction detection.
//!
//! Pairs whose similarity falls inside the configured band are checked for
//! conflict: by an injected NLI capability when available, otherwise by the
//! XOR-of-negation-pattern heuristic. Both members of a conflicting pair
//! are flagged and cross-referenced; neither is dropped.

use async_trait::async_trait;
use regex::Regex;

use strata_core::error::StrataError;
use strata_core::types::cosine_similarity;

use crate::text::bow_projection;
use crate::types::{Candidate, OptimizerStats};

/// Optional natural-language-inference capability replacing the heuristic.
#[async_trait]
pub trait NliDetector: Send + Sync {
    /// Whether `a` and `b` state conflicting facts.
    async fn contradicts(&self, a: &str, b: &str) -> Result<bool, StrataError>;
}

/// Negation and negative-state markers. Two similar sentences where exactly
/// one side carries a marker are treated as a likely contradiction.
const NEGATION_PATTERN: &str = r"(?i)\b(not|no|never|none|nothing|cannot|\w+n't|offline|off|down|disabled|unavailable|inactive|closed)\b";

fn has_negation(re: &Regex, text: &str) -> bool {
    re.is_match(text)
}

fn pair_similarity(a: &Candidate, b: &Candidate) -> f64 {
    match (&a.embedding, &b.embedding) {
        (Some(ea), Some(eb)) if !ea.is_empty() && ea.len() == eb.len() => {
            f64::from(cosine_similarity(ea, eb))
        }
        _ => f64::from(cosine_similarity(
            &bow_projection(&a.content),
            &bow_projection(&b.content),
        )),
    }
}

/// Flag contradicting pairs in place. The band `[lo, hi]` selects pairs
/// that are similar enough to speak about the same thing but not so similar
/// they are duplicates.
pub async fn detect_contradictions(
    candidates: &mut [Candidate],
    lo: f64,
    hi: f64,
    nli: Option<&dyn NliDetector>,
    stats: &mut OptimizerStats,
) -> Result<(), StrataError> {
    if candidates.len() < 2 {
        return Ok(());
    }
    let negation = Regex::new(NEGATION_PATTERN).expect("static pattern compiles");

    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let similarity = pair_similarity(&candidates[i], &candidates[j]);
            if !(lo..=hi).contains(&similarity) {
                continue;
            }

            let conflicting = match nli {
                Some(detector) => {
                    detector
                        .contradicts(&candidates[i].content, &candidates[j].content)
                        .await?
                }
                None => {
                    has_negation(&negation, &candidates[i].content)
                        != has_negation(&negation, &candidates[j].content)
                }
            };

            if conflicting {
                candidates[i].has_contradiction = true;
                candidates[j].has_contradiction = true;
                candidates[i].contradicts_with.push(j);
                candidates[j].contradicts_with.push(i);
                stats.contradictions_detected += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn negated_pair_is_flagged_and_kept() {
        // Similar content, one bearing negation: flag both, drop neither.
        let mut candidates = vec![
            Candidate::new("a", "The service is online.", 0.9)
                .with_embedding(vec![1.0, 0.0]),
            Candidate::new("b", "The service is offline.", 0.8)
                .with_embedding(vec![0.9, 0.435_889_9]),
        ];
        let mut stats = OptimizerStats::default();
        detect_contradictions(&mut candidates, 0.70, 0.90, None, &mut stats)
            .await
            .unwrap();

        assert_eq!(stats.contradictions_detected, 1);
        assert!(candidates[0].has_contradiction);
        assert!(candidates[1].has_contradiction);
        assert_eq!(candidates[0].contradicts_with, vec![1]);
        assert_eq!(candidates[1].contradicts_with, vec![0]);
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn both_negated_is_not_a_contradiction() {
        let mut candidates = vec![
            Candidate::new("a", "The cache is not warm.", 0.9).with_embedding(vec![1.0, 0.0]),
            Candidate::new("b", "The cache is never warm.", 0.8)
                .with_embedding(vec![0.9, 0.435_889_9]),
        ];
        let mut stats = OptimizerStats::default();
        detect_contradictions(&mut candidates, 0.70, 0.90, None, &mut stats)
            .await
            .unwrap();
        assert_eq!(stats.contradictions_detected, 0);
    }

    #[tokio::test]
    async fn pairs_outside_the_band_are_ignored() {
        // Near-identical vectors sit above the band's upper edge.
        let mut candidates = vec![
            Candidate::new("a", "Deploys are disabled.", 0.9).with_embedding(vec![1.0, 0.0]),
            Candidate::new("b", "Deploys are enabled.", 0.8).with_embedding(vec![1.0, 0.0]),
        ];
        let mut stats = OptimizerStats::default();
        detect_contradictions(&mut candidates, 0.70, 0.90, None, &mut stats)
            .await
            .unwrap();
        assert_eq!(stats.contradictions_detected, 0);
    }

    struct AlwaysContradicts;

    #[async_trait]
    impl NliDetector for AlwaysContradicts {
        async fn contradicts(&self, _a: &str, _b: &str) -> Result<bool, StrataError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn injected_nli_replaces_the_heuristic() {
        // No negation on either side; the heuristic would pass, but the
        // capability says conflict.
        let mut candidates = vec![
            Candidate::new("a", "The meeting is on Monday.", 0.9)
                .with_embedding(vec![1.0, 0.0]),
            Candidate::new("b", "The meeting is on Tuesday.", 0.8)
                .with_embedding(vec![0.9, 0.435_889_9]),
        ];
        let mut stats = OptimizerStats::default();
        detect_contradictions(
            &mut candidates,
            0.70,
            0.90,
            Some(&AlwaysContradicts),
            &mut stats,
        )
        .await
        .unwrap();
        assert_eq!(stats.contradictions_detected, 1);
        assert!(candidates[0].has_contradiction);
    }
}
