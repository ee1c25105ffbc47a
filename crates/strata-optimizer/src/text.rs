// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text utilities shared by the optimization steps.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Lowercased alphanumeric word tokens.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Split into trimmed, non-empty sentences on `.`, `!`, `?`.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Character-level Shannon entropy normalized into [0, 1] by the ~6.6-bit
/// ceiling of typical ASCII text.
pub fn normalized_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in text.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }
    let total = text.chars().count() as f64;
    let entropy: f64 = freq
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum();
    (entropy / 6.6).min(1.0)
}

/// Jaccard overlap of the word sets of two texts.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<String> = words(a).into_iter().collect();
    let set_b: HashSet<String> = words(b).into_iter().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Collapse runs of whitespace and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hashed bag-of-words projection used for semantic comparisons when no
/// embedding is attached. Two texts project into the same 128-dim space, so
/// cosine between them is meaningful (unlike per-text vocabularies).
pub fn bow_projection(text: &str) -> Vec<f32> {
    const DIM: usize = 128;
    let mut v = vec![0.0f32; DIM];
    for word in words(text) {
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        v[(hasher.finish() % DIM as u64) as usize] += 1.0;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Truncate to roughly `max_tokens`, preferring the last sentence boundary
/// past 80% of the allowance over a mid-word cut.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * 4;
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }
    let clipped: String = chars[..max_chars].iter().collect();
    if let Some(last_period) = clipped.rfind('.') {
        if last_period * 10 >= max_chars * 8 {
            return clipped[..=last_period].to_string();
        }
    }
    format!("{clipped}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_is_chars_over_four() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn sentences_split_and_trim() {
        let s = split_sentences("First one. Second!  Third? ");
        assert_eq!(s, vec!["First one", "Second", "Third"]);
        assert!(split_sentences("...").is_empty());
    }

    #[test]
    fn entropy_separates_repetition_from_prose() {
        let repetitive = normalized_entropy("aaaaaaaaaaaaaaaa");
        let prose = normalized_entropy("The quick brown fox jumps over the lazy dog");
        assert!(repetitive < 0.1);
        assert!(prose > 0.5);
        assert_eq!(normalized_entropy(""), 0.0);
    }

    #[test]
    fn jaccard_overlap() {
        assert_eq!(jaccard("a b c", "a b c"), 1.0);
        assert_eq!(jaccard("a b", "c d"), 0.0);
        let half = jaccard("rust ownership", "rust borrowing lifetimes");
        assert!(half > 0.0 && half < 1.0);
        assert_eq!(jaccard("", "anything"), 0.0);
    }

    #[test]
    fn bow_projection_is_comparable_across_texts() {
        use strata_core::types::cosine_similarity;
        let a = bow_projection("machine learning is a subset of ai");
        let b = bow_projection("machine learning is a subset of ai");
        let c = bow_projection("python is a programming language");
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c) < 0.7);
    }

    #[test]
    fn truncation_prefers_sentence_boundary() {
        let text = format!("{}{}", "word ".repeat(100), "Tail sentence here");
        let mut with_period = text.clone();
        with_period.insert_str(396, ".");
        let truncated = truncate_to_tokens(&with_period, 100);
        assert!(truncated.chars().count() <= 401);
        assert!(truncated.ends_with('.'));

        // No boundary near the cut: hard truncate with an ellipsis.
        let run_on = "x".repeat(1000);
        let truncated = truncate_to_tokens(&run_on, 10);
        assert!(truncated.ends_with("..."));
        assert!(truncated.chars().count() <= 43);
    }

    #[test]
    fn short_text_is_untouched_by_truncation() {
        assert_eq!(truncate_to_tokens("short", 100), "short");
    }
}
