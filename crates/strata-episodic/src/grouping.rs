// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message grouping policy for episodization.
//!
//! A group closes when the wall-clock window fills, the message cap is
//! reached (inclusive), or an idle gap follows the last message. The
//! trailing group is held back until the idle gap has elapsed against the
//! current clock, so an in-flight burst is not episodized mid-conversation.
//! Pure function: the jobs feed it ordered un-episodized messages.

use chrono::{DateTime, Duration, Utc};

use strata_store::ChatMessage;

/// Bounds for one conversation kind.
#[derive(Debug, Clone, Copy)]
pub struct GroupingPolicy {
    /// Wall-clock window measured from the group's first message.
    pub window: Duration,
    /// Gap between consecutive messages that closes a group, and the
    /// quiet period required before the trailing group may close.
    pub idle_gap: Duration,
    /// Maximum messages per group (inclusive: the group closes when the
    /// cap is reached).
    pub cap: usize,
}

/// Split `messages` (chronologically ordered) into closed groups.
pub fn group_messages(
    messages: &[ChatMessage],
    policy: &GroupingPolicy,
    now: DateTime<Utc>,
) -> Vec<Vec<ChatMessage>> {
    let mut groups: Vec<Vec<ChatMessage>> = Vec::new();
    let mut current: Vec<ChatMessage> = Vec::new();
    let mut group_start: Option<DateTime<Utc>> = None;

    for message in messages {
        if let (Some(start), Some(last)) = (group_start, current.last()) {
            let beyond_window = message.created_at - start > policy.window;
            let idle = message.created_at - last.created_at >= policy.idle_gap;
            if beyond_window || idle {
                groups.push(std::mem::take(&mut current));
                group_start = None;
            }
        }

        if group_start.is_none() {
            group_start = Some(message.created_at);
        }
        current.push(message.clone());

        if current.len() >= policy.cap {
            groups.push(std::mem::take(&mut current));
            group_start = None;
        }
    }

    // The trailing group closes only once the conversation has gone quiet.
    if let Some(last) = current.last() {
        if now - last.created_at >= policy.idle_gap {
            groups.push(current);
        }
    }

    groups
}
