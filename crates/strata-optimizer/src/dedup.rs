// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step 1: deduplication.
//!
//! Two passes over the score-descending candidate list: exact (hash of the
//! trimmed lowercased content) and semantic (cosine over embeddings, or the
//! bag-of-words projection when an entry has none). When two entries are
//! similar at or above the threshold and neither is pinned, the
//! lower-scoring one is dropped.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use strata_core::types::cosine_similarity;

use crate::text::bow_projection;
use crate::types::{Candidate, OptimizerStats};

fn content_hash(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.trim().to_lowercase().hash(&mut hasher);
    hasher.finish()
}

fn comparison_vector(candidate: &Candidate) -> Vec<f32> {
    match &candidate.embedding {
        Some(embedding) if !embedding.is_empty() => embedding.clone(),
        _ => bow_projection(&candidate.content),
    }
}

/// Remove exact duplicates, keeping the first (highest-scoring) occurrence.
pub fn remove_exact_duplicates(
    candidates: Vec<Candidate>,
    stats: &mut OptimizerStats,
) -> Vec<Candidate> {
    let mut seen: HashSet<u64> = HashSet::new();
    let mut unique = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if seen.insert(content_hash(&candidate.content)) {
            unique.push(candidate);
        } else {
            stats.duplicates_removed += 1;
        }
    }
    unique
}

/// Remove semantic near-duplicates pairwise against the surviving set.
pub fn remove_semantic_duplicates(
    candidates: Vec<Candidate>,
    threshold: f64,
    stats: &mut OptimizerStats,
) -> Vec<Candidate> {
    let mut survivors: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut survivor_vectors: Vec<Vec<f32>> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let vector = comparison_vector(&candidate);
        let duplicate_of = survivors.iter().enumerate().find(|(i, survivor)| {
            // Comparisons only make sense within one dimension space.
            survivor_vectors[*i].len() == vector.len()
                && f64::from(cosine_similarity(&survivor_vectors[*i], &vector)) >= threshold
        });

        match duplicate_of {
            // Pinned entries on either side keep both.
            Some((_, survivor)) if !candidate.keep && !survivor.keep => {
                stats.duplicates_removed += 1;
            }
            _ => {
                survivors.push(candidate);
                survivor_vectors.push(vector);
            }
        }
    }
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pass_is_case_and_whitespace_insensitive() {
        let mut stats = OptimizerStats::default();
        let out = remove_exact_duplicates(
            vec![
                Candidate::new("a", "Machine learning is great.", 0.9),
                Candidate::new("b", "  machine learning is great. ", 0.8),
                Candidate::new("c", "Something else entirely.", 0.7),
            ],
            &mut stats,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "a", "higher-scoring occurrence survives");
        assert_eq!(stats.duplicates_removed, 1);
    }

    #[test]
    fn semantic_pass_drops_near_duplicates_with_embeddings() {
        // "ML is a subset of AI" twice in different words, plus Python.
        let mut stats = OptimizerStats::default();
        let out = remove_semantic_duplicates(
            vec![
                Candidate::new("a", "Machine learning is a subset of AI.", 0.9)
                    .with_embedding(vec![1.0, 0.0]),
                Candidate::new("b", "ML is a subset of artificial intelligence.", 0.8)
                    .with_embedding(vec![0.95, 0.05]),
                Candidate::new("c", "Python is a programming language.", 0.7)
                    .with_embedding(vec![0.0, 1.0]),
            ],
            0.85,
            &mut stats,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "a");
        assert_eq!(out[1].id, "c", "dissimilar entry is preserved");
        assert_eq!(stats.duplicates_removed, 1);
    }

    #[test]
    fn pinned_entries_survive_semantic_dedup() {
        let mut stats = OptimizerStats::default();
        let mut dup = Candidate::new("b", "same thing", 0.5).with_embedding(vec![1.0, 0.0]);
        dup.keep = true;
        let out = remove_semantic_duplicates(
            vec![
                Candidate::new("a", "same thing", 0.9).with_embedding(vec![1.0, 0.0]),
                dup,
            ],
            0.80,
            &mut stats,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(stats.duplicates_removed, 0);
    }

    #[test]
    fn bow_fallback_catches_identical_wording() {
        let mut stats = OptimizerStats::default();
        let out = remove_semantic_duplicates(
            vec![
                Candidate::new("a", "the cache invalidates on every write", 0.9),
                Candidate::new("b", "the cache invalidates on every write", 0.8),
                Candidate::new("c", "episodes archive after thirty days", 0.7),
            ],
            0.85,
            &mut stats,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(stats.duplicates_removed, 1);
    }

    #[test]
    fn mixed_dimension_spaces_are_never_compared() {
        let mut stats = OptimizerStats::default();
        let out = remove_semantic_duplicates(
            vec![
                Candidate::new("a", "alpha", 0.9).with_embedding(vec![1.0, 0.0]),
                Candidate::new("b", "beta", 0.8).with_embedding(vec![1.0, 0.0, 0.0]),
            ],
            0.70,
            &mut stats,
        );
        assert_eq!(out.len(), 2);
    }
}
