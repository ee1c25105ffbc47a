// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Episodization job: consolidate un-episodized messages into episodes.
//!
//! For each conversation, un-episodized messages are grouped by the window
//! / cap / idle-gap policy; each closed group becomes one episode inside a
//! single store transaction that also flips the source messages'
//! `episodized` flags. The transaction either commits or leaves the
//! messages untouched for the next run.
//!
//! A group that keeps failing is skipped after its retry budget and flagged
//! in the audit log; one poisoned group never blocks the others.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use strata_config::model::EpisodicConfig;
use strata_core::error::StrataError;
use strata_embedding::EmbeddingService;
use strata_store::{
    AuditAction, AuditEvent, ChatMessage, EpisodeRecord, MessageSnapshot, SourceKind, VectorStore,
};

use crate::grouping::{group_messages, GroupingPolicy};

/// Outcome of one episodization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodizationReport {
    pub conversations_scanned: usize,
    pub episodes_created: usize,
    pub messages_episodized: usize,
    pub groups_skipped: usize,
}

/// The episodization job. One instance is shared by the scheduler and any
/// manual trigger path.
pub struct EpisodizationJob {
    store: Arc<dyn VectorStore>,
    embeddings: EmbeddingService,
    config: EpisodicConfig,
    /// Per-conversation locks around the episodize transactions.
    conversation_locks: DashMap<String, Arc<Mutex<()>>>,
    /// Failed attempts per group key, bounded by the retry budget.
    group_failures: DashMap<String, u32>,
}

impl EpisodizationJob {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: EmbeddingService,
        config: EpisodicConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            config,
            conversation_locks: DashMap::new(),
            group_failures: DashMap::new(),
        }
    }

    fn policy_for(&self, kind: SourceKind) -> GroupingPolicy {
        GroupingPolicy {
            window: Duration::seconds(self.config.window_seconds as i64),
            idle_gap: Duration::seconds(self.config.idle_gap_seconds as i64),
            cap: match kind {
                SourceKind::SuperChat => self.config.super_chat_cap,
                SourceKind::DeepDive => self.config.deep_dive_cap,
            },
        }
    }

    /// Run one pass over every conversation. Idempotent: running twice with
    /// no new messages creates no episodes and flips no flags.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<EpisodizationReport, StrataError> {
        let mut report = EpisodizationReport::default();
        let conversations = self.store.list_conversations().await?;

        for conversation in conversations {
            report.conversations_scanned += 1;

            let lock = self
                .conversation_locks
                .entry(conversation.id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            let _guard = lock.lock().await;

            let messages = self.store.unepisodized_messages(&conversation.id).await?;
            if messages.is_empty() {
                continue;
            }

            let policy = self.policy_for(conversation.kind);
            let groups = group_messages(&messages, &policy, now);

            for group in groups {
                let key = group_key(&conversation.id, &group);
                if self.exhausted(&key) {
                    report.groups_skipped += 1;
                    continue;
                }

                match self
                    .episodize_one(&conversation.user_id, conversation.kind, &conversation.id, &group, now)
                    .await
                {
                    Ok(count) => {
                        self.group_failures.remove(&key);
                        report.episodes_created += 1;
                        report.messages_episodized += count;
                    }
                    Err(e) => {
                        let attempts = self.note_failure(&key);
                        warn!(
                            conversation_id = %conversation.id,
                            attempts,
                            error = %e,
                            "episodize group failed; will retry on a later run"
                        );
                        metrics::counter!("strata_episodize_failures_total").increment(1);
                        if self.exhausted(&key) {
                            report.groups_skipped += 1;
                            self.store
                                .append_audit(&AuditEvent::new(
                                    AuditAction::EpisodizeFailed,
                                    key.clone(),
                                    conversation.user_id.clone(),
                                    now,
                                    json!({
                                        "conversation_id": conversation.id,
                                        "attempts": attempts,
                                        "error": e.to_string(),
                                    }),
                                ))
                                .await?;
                        }
                    }
                }
            }
        }

        info!(
            conversations = report.conversations_scanned,
            episodes = report.episodes_created,
            messages = report.messages_episodized,
            skipped = report.groups_skipped,
            "episodization run complete"
        );
        metrics::counter!("strata_episodes_created_total")
            .increment(report.episodes_created as u64);
        Ok(report)
    }

    async fn episodize_one(
        &self,
        user_id: &str,
        kind: SourceKind,
        conversation_id: &str,
        group: &[ChatMessage],
        now: DateTime<Utc>,
    ) -> Result<usize, StrataError> {
        let snapshots: Vec<MessageSnapshot> = group.iter().map(MessageSnapshot::from).collect();
        let text = snapshots
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let embed_text = sample_for_embedding(&text, self.config.embed_char_budget);
        let embedding = self.embeddings.embed_text(&embed_text).await?;

        let episode = EpisodeRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            source_kind: kind,
            source_id: conversation_id.to_string(),
            message_count: snapshots.len(),
            date_from: group[0].created_at,
            date_to: group[group.len() - 1].created_at,
            messages: snapshots,
            embedding,
            metadata: json!({}),
            tags: Vec::new(),
            importance: 0.5,
            created_at: now,
        };

        let message_ids: Vec<String> = group.iter().map(|m| m.id.clone()).collect();
        self.store.episodize_group(&episode, &message_ids).await?;

        self.store
            .append_audit(&AuditEvent::new(
                AuditAction::Episodized,
                episode.id.clone(),
                user_id,
                now,
                json!({
                    "conversation_id": conversation_id,
                    "message_count": message_ids.len(),
                }),
            ))
            .await?;
        Ok(message_ids.len())
    }

    fn note_failure(&self, key: &str) -> u32 {
        let mut entry = self.group_failures.entry(key.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    fn exhausted(&self, key: &str) -> bool {
        self.group_failures
            .get(key)
            .map(|attempts| *attempts >= self.config.group_retry_budget)
            .unwrap_or(false)
    }
}

/// Stable identity of a message group: conversation plus first and last
/// message ids.
fn group_key(conversation_id: &str, group: &[ChatMessage]) -> String {
    format!(
        "{conversation_id}:{}:{}",
        group[0].id,
        group[group.len() - 1].id
    )
}

/// Keep the embedding input within budget: head, middle, and tail thirds of
/// an oversized text.
fn sample_for_embedding(text: &str, budget_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= budget_chars {
        return text.to_string();
    }
    let third = budget_chars / 3;
    let mid_start = chars.len() / 2 - third / 2;
    let head: String = chars[..third].iter().collect();
    let middle: String = chars[mid_start..mid_start + third].iter().collect();
    let tail: String = chars[chars.len() - third..].iter().collect();
    format!("{head} {middle} {tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use strata_core::types::UserId;
    use strata_store::{InMemoryStore, Role};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn config() -> EpisodicConfig {
        EpisodicConfig {
            idle_gap_seconds: 900, // 15 min, so 10-min spacing stays grouped
            ..EpisodicConfig::default()
        }
    }

    async fn seed_messages(store: &InMemoryStore, minutes: &[i64]) -> String {
        let conversation = store.ensure_super_chat(&UserId::from("u1")).await.unwrap();
        for (i, minute) in minutes.iter().enumerate() {
            store
                .append_message(&ChatMessage {
                    id: format!("m{i:03}"),
                    conversation_id: conversation.id.clone(),
                    role: Role::User,
                    content: format!("message {i}"),
                    created_at: at(*minute),
                    episodized: false,
                    episodized_at: None,
                })
                .await
                .unwrap();
        }
        conversation.id
    }

    #[tokio::test]
    async fn run_creates_episodes_and_flips_flags() {
        let store = Arc::new(InMemoryStore::new());
        let minutes: Vec<i64> = (0..12)
            .map(|i| i * 10)
            .chain((0..3).map(|i| 110 + 30 + i * 10))
            .collect();
        let conversation_id = seed_messages(&store, &minutes).await;

        let job = EpisodizationJob::new(
            store.clone(),
            EmbeddingService::fallback(32),
            config(),
        );
        let report = job.run(at(300)).await.unwrap();
        assert_eq!(report.episodes_created, 2);
        assert_eq!(report.messages_episodized, 15);

        let episodes = store.list_episodes().await.unwrap();
        assert_eq!(episodes.len(), 2);
        let mut counts: Vec<usize> = episodes.iter().map(|e| e.message_count).collect();
        counts.sort();
        assert_eq!(counts, vec![3, 12]);
        for episode in &episodes {
            assert_eq!(episode.message_count, episode.messages.len());
            assert!(episode.date_from <= episode.date_to);
            assert!(!episode.embedding.is_empty());
        }
        assert!(store
            .unepisodized_messages(&conversation_id)
            .await
            .unwrap()
            .is_empty());

        // Audit trail carries one event per episode.
        let audit = store.list_audit(Some(&UserId::from("u1")), 10).await.unwrap();
        assert_eq!(
            audit
                .iter()
                .filter(|e| e.action == AuditAction::Episodized)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn running_twice_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        seed_messages(&store, &[0, 1, 2]).await;

        let job = EpisodizationJob::new(
            store.clone(),
            EmbeddingService::fallback(32),
            config(),
        );
        let first = job.run(at(60)).await.unwrap();
        assert_eq!(first.episodes_created, 1);

        let second = job.run(at(120)).await.unwrap();
        assert_eq!(second.episodes_created, 0);
        assert_eq!(second.messages_episodized, 0);
        assert_eq!(store.list_episodes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hot_conversation_is_left_for_the_next_run() {
        let store = Arc::new(InMemoryStore::new());
        let conversation_id = seed_messages(&store, &[0, 1]).await;

        let job = EpisodizationJob::new(
            store.clone(),
            EmbeddingService::fallback(32),
            config(),
        );
        // Only 5 minutes after the last message; idle gap is 15 minutes.
        let report = job.run(at(6)).await.unwrap();
        assert_eq!(report.episodes_created, 0);
        assert_eq!(
            store
                .unepisodized_messages(&conversation_id)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn failure_budget_tracks_and_exhausts() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
        let job = EpisodizationJob::new(
            store,
            EmbeddingService::fallback(32),
            EpisodicConfig {
                group_retry_budget: 2,
                ..EpisodicConfig::default()
            },
        );
        assert!(!job.exhausted("g1"));
        assert_eq!(job.note_failure("g1"), 1);
        assert!(!job.exhausted("g1"));
        assert_eq!(job.note_failure("g1"), 2);
        assert!(job.exhausted("g1"));
        // Other groups are unaffected.
        assert!(!job.exhausted("g2"));
    }

    #[test]
    fn oversized_text_is_sampled_head_middle_tail() {
        let text: String = ('a'..='z').cycle().take(9000).collect();
        let sampled = sample_for_embedding(&text, 900);
        assert!(sampled.chars().count() <= 902);
        assert!(sampled.starts_with(&text[..10]));
        assert!(sampled.ends_with(&text[text.len() - 10..]));

        let short = "short text";
        assert_eq!(sample_for_embedding(short, 900), short);
    }
}
