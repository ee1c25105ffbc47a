// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step 5: query-focused extractive compression.
//!
//! Applied only to entries exceeding a quarter of the token budget. Keeps
//! the sentences most relevant to the query plus a configurable window of
//! neighbors; when the content carries a section header, the first and last
//! sentences are always preserved. An entry is only replaced when the
//! compressed form saves at least 10%.

use std::collections::BTreeSet;
use std::collections::HashSet;

use crate::text::{clean_text, estimate_tokens, split_sentences, words};
use crate::types::{Candidate, OptimizerStats};

/// Top relevant sentences selected before window expansion.
const TOP_SENTENCES: usize = 5;

/// A short capitalized sentence reads as a section header.
fn is_header(sentence: &str) -> bool {
    sentence.split_whitespace().count() <= 5
        && sentence.chars().next().map(char::is_uppercase).unwrap_or(false)
}

/// Extract query-relevant sentences with surrounding context.
fn extract_relevant(content: &str, query: &str, context_window: usize) -> String {
    let sentences = split_sentences(content);
    if sentences.is_empty() {
        return content.to_string();
    }
    let query_words: HashSet<String> = words(query).into_iter().collect();

    let mut scored: Vec<(usize, usize)> = Vec::new();
    let mut any_header = false;
    for (i, sentence) in sentences.iter().enumerate() {
        if sentence.chars().count() < 10 {
            continue;
        }
        let sentence_words: HashSet<String> = words(sentence).into_iter().collect();
        let overlap = query_words.intersection(&sentence_words).count();
        let header = is_header(sentence);
        any_header |= header;
        let score = overlap + if header { 2 } else { 0 };
        if score > 0 {
            scored.push((i, score));
        }
    }

    if scored.is_empty() {
        // Nothing matched the query: keep the leading sentences.
        return sentences
            .iter()
            .take(3.min(sentences.len()))
            .cloned()
            .collect::<Vec<_>>()
            .join(". ");
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut selected: BTreeSet<usize> = BTreeSet::new();
    for (idx, _) in scored.iter().take(TOP_SENTENCES) {
        let start = idx.saturating_sub(context_window);
        let end = (idx + context_window).min(sentences.len() - 1);
        selected.extend(start..=end);
    }
    // A sectioned entry keeps its first and last sentence.
    if any_header {
        selected.insert(0);
        selected.insert(sentences.len() - 1);
    }

    selected
        .into_iter()
        .map(|i| sentences[i].clone())
        .collect::<Vec<_>>()
        .join(". ")
}

/// Compress oversized entries in place.
pub fn compress_candidates(
    candidates: &mut [Candidate],
    query: &str,
    max_context_tokens: usize,
    context_window: usize,
    stats: &mut OptimizerStats,
) {
    let per_entry_budget = max_context_tokens / 4;
    for candidate in candidates.iter_mut() {
        if estimate_tokens(&candidate.content) <= per_entry_budget {
            continue;
        }
        let compressed = clean_text(&extract_relevant(&candidate.content, query, context_window));
        // Only worth it when it saves meaningful space.
        if compressed.chars().count() * 10 < candidate.content.chars().count() * 9 {
            candidate.content = compressed;
            candidate.compressed = true;
            stats.compressed_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_entry(query_word: &str) -> String {
        let mut sentences: Vec<String> = (0..40)
            .map(|i| format!("Filler sentence number {i} about unrelated matters entirely"))
            .collect();
        sentences[20] = format!("The {query_word} subsystem handles retries with jitter");
        sentences.join(". ")
    }

    #[test]
    fn oversized_entry_is_compressed_around_relevant_sentence() {
        let content = long_entry("scheduler");
        let mut candidates = vec![Candidate::new("a", content.clone(), 0.9)];
        let mut stats = OptimizerStats::default();
        compress_candidates(&mut candidates, "scheduler retries", 400, 1, &mut stats);

        assert!(candidates[0].compressed);
        assert_eq!(stats.compressed_count, 1);
        assert!(candidates[0].content.contains("scheduler"));
        // The context window keeps one neighbor on each side.
        assert!(candidates[0].content.contains("number 19"));
        assert!(candidates[0].content.contains("number 21"));
        assert!(candidates[0].content.chars().count() < content.chars().count());
    }

    #[test]
    fn small_entries_are_untouched() {
        let mut candidates = vec![Candidate::new("a", "Short note about retries.", 0.9)];
        let mut stats = OptimizerStats::default();
        compress_candidates(&mut candidates, "retries", 4000, 1, &mut stats);
        assert!(!candidates[0].compressed);
        assert_eq!(stats.compressed_count, 0);
    }

    #[test]
    fn header_sections_preserve_first_and_last_sentences() {
        let mut sentences: Vec<String> = vec!["Deployment Guide".to_string()];
        sentences.extend(
            (0..30).map(|i| format!("Filler paragraph {i} about many unrelated procedures")),
        );
        sentences.push("Final closing remark of the section".to_string());
        let content = sentences.join(". ");

        let mut candidates = vec![Candidate::new("a", content, 0.9)];
        let mut stats = OptimizerStats::default();
        compress_candidates(&mut candidates, "procedures rollout", 400, 0, &mut stats);

        assert!(candidates[0].compressed);
        assert!(candidates[0].content.starts_with("Deployment Guide"));
        assert!(candidates[0].content.ends_with("Final closing remark of the section"));
    }

    #[test]
    fn no_query_match_keeps_leading_sentences() {
        let extracted = extract_relevant(
            "First point here. Second point follows. Third one too. Fourth trails.",
            "zebra quantum",
            1,
        );
        assert!(extracted.starts_with("First point here"));
        assert!(!extracted.contains("Fourth"));
    }
}
