// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Field-weighted BM25 scoring for the in-memory backend.
//!
//! The SQLite backend delegates to FTS5's bm25() with the same field
//! weights; this module gives the in-memory store an ordering-equivalent
//! ranking so tests against either backend agree on relative order.

use std::collections::HashMap;

use crate::models::StoredDoc;

/// BM25 term-frequency saturation.
const K1: f64 = 1.2;
/// BM25 length normalization.
const B: f64 = 0.75;

/// Field weights: title >> content >> tags.
pub const W_TITLE: f64 = 8.0;
pub const W_CONTENT: f64 = 2.0;
pub const W_TAGS: f64 = 1.0;

/// Lowercased alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Weighted term frequencies for one document.
fn weighted_tf(doc: &StoredDoc) -> (HashMap<String, f64>, f64) {
    let mut tf: HashMap<String, f64> = HashMap::new();
    let mut length = 0.0;

    let mut add = |text: &str, weight: f64, tf: &mut HashMap<String, f64>, length: &mut f64| {
        for token in tokenize(text) {
            *tf.entry(token).or_insert(0.0) += weight;
            *length += weight;
        }
    };

    if let Some(title) = &doc.title {
        add(title, W_TITLE, &mut tf, &mut length);
    }
    add(&doc.content, W_CONTENT, &mut tf, &mut length);
    for tag in &doc.tags {
        add(tag, W_TAGS, &mut tf, &mut length);
    }

    (tf, length)
}

/// Score `docs` against `query`, returning `(index, score)` pairs for docs
/// with a positive score, sorted by score descending (ties by index for
/// determinism).
pub fn bm25_rank(query: &str, docs: &[StoredDoc]) -> Vec<(usize, f64)> {
    let query_terms = tokenize(query);
    if query_terms.is_empty() || docs.is_empty() {
        return Vec::new();
    }

    let per_doc: Vec<(HashMap<String, f64>, f64)> = docs.iter().map(weighted_tf).collect();
    let n = docs.len() as f64;
    let avgdl = per_doc.iter().map(|(_, len)| len).sum::<f64>() / n;
    let avgdl = if avgdl > 0.0 { avgdl } else { 1.0 };

    // Document frequency per query term.
    let mut df: HashMap<&str, f64> = HashMap::new();
    for term in &query_terms {
        let count = per_doc.iter().filter(|(tf, _)| tf.contains_key(term)).count() as f64;
        df.insert(term.as_str(), count);
    }

    let mut scored: Vec<(usize, f64)> = Vec::new();
    for (i, (tf, length)) in per_doc.iter().enumerate() {
        let mut score = 0.0;
        for term in &query_terms {
            let Some(&freq) = tf.get(term.as_str()) else {
                continue;
            };
            let n_q = df[term.as_str()];
            // Standard BM25 IDF with the +1 guard against negative values.
            let idf = ((n - n_q + 0.5) / (n_q + 0.5) + 1.0).ln();
            let norm = freq * (K1 + 1.0) / (freq + K1 * (1.0 - B + B * length / avgdl));
            score += idf * norm;
        }
        if score > 0.0 {
            scored.push((i, score));
        }
    }

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored
}
