// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step 7: token-budget enforcement.
//!
//! Accumulates entries in descending score order until the budget would be
//! exceeded. The first entry past the line is truncated at a sentence
//! boundary when the remaining allowance is worth it; everything after is
//! discarded.

use crate::text::{estimate_tokens, truncate_to_tokens};
use crate::types::{Candidate, OptimizerStats};

/// Minimum remaining tokens that justify a truncated partial entry.
const MIN_PARTIAL_TOKENS: usize = 100;

pub fn enforce_token_budget(
    candidates: Vec<Candidate>,
    max_context_tokens: usize,
    stats: &mut OptimizerStats,
) -> Vec<Candidate> {
    let mut kept = Vec::with_capacity(candidates.len());
    let mut used = 0usize;
    let mut iter = candidates.into_iter();

    for mut candidate in iter.by_ref() {
        let tokens = estimate_tokens(&candidate.content);
        if used + tokens <= max_context_tokens {
            used += tokens;
            kept.push(candidate);
            continue;
        }

        let remaining = max_context_tokens - used;
        if remaining > MIN_PARTIAL_TOKENS {
            candidate.content = truncate_to_tokens(&candidate.content, remaining);
            candidate.truncated = true;
            kept.push(candidate);
        } else {
            stats.budget_dropped += 1;
        }
        break;
    }
    stats.budget_dropped += iter.count();
    kept
}
