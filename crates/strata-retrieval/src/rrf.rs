// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rank and score fusion for hybrid retrieval.

use std::collections::HashMap;

/// RRF constant per the research literature.
pub const RRF_C: f64 = 60.0;

/// Reciprocal Rank Fusion over two ranked id lists.
///
/// For a document at rank r (1-based) in a list with weight w, the list
/// contributes `w / (C + r)`; documents absent from a list get no
/// contribution from it (rank infinity).
pub fn rrf_fuse(
    vector_ids: &[String],
    lexical_ids: &[String],
    vector_weight: f64,
    lexical_weight: f64,
) -> HashMap<String, f64> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    for (rank, id) in vector_ids.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) +=
            vector_weight / (RRF_C + (rank + 1) as f64);
    }
    for (rank, id) in lexical_ids.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) +=
            lexical_weight / (RRF_C + (rank + 1) as f64);
    }
    scores
}

/// Weighted-score fusion over normalized per-list scores in [0, 1]:
/// `w_v * s_v + w_l * s_l`.
pub fn weighted_fuse(
    vector_scores: &HashMap<String, f64>,
    lexical_scores: &HashMap<String, f64>,
    vector_weight: f64,
    lexical_weight: f64,
) -> HashMap<String, f64> {
    let mut fused: HashMap<String, f64> = HashMap::new();
    for (id, s) in vector_scores {
        *fused.entry(id.clone()).or_insert(0.0) += vector_weight * s;
    }
    for (id, s) in lexical_scores {
        *fused.entry(id.clone()).or_insert(0.0) += lexical_weight * s;
    }
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn doc_in_both_lists_outranks_single_list_docs() {
        let fused = rrf_fuse(&ids(&["a", "b"]), &ids(&["a", "c"]), 0.7, 0.3);
        let a = fused["a"];
        let b = fused["b"];
        let c = fused["c"];
        assert!(a > b && a > c);
        // a = 0.7/61 + 0.3/61
        assert!((a - 1.0 / 61.0).abs() < 1e-9);
        // b (vector rank 2) = 0.7/62; c (lex rank 2) = 0.3/62
        assert!((b - 0.7 / 62.0).abs() < 1e-9);
        assert!((c - 0.3 / 62.0).abs() < 1e-9);
        assert!(b > c, "vector weight dominates at equal rank");
    }

    #[test]
    fn empty_lists_fuse_to_empty() {
        assert!(rrf_fuse(&[], &[], 0.7, 0.3).is_empty());
    }

    #[test]
    fn weighted_fuse_combines_normalized_scores() {
        let mut v = HashMap::new();
        v.insert("a".to_string(), 1.0);
        v.insert("b".to_string(), 0.5);
        let mut l = HashMap::new();
        l.insert("b".to_string(), 1.0);

        let fused = weighted_fuse(&v, &l, 0.7, 0.3);
        assert!((fused["a"] - 0.7).abs() < 1e-9);
        assert!((fused["b"] - (0.35 + 0.3)).abs() < 1e-9);
    }
}
