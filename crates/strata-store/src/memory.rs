// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process in-memory store backend.
//!
//! The reference backend used by tests and the pure-in-memory deployment
//! mode. ANN is brute-force cosine; lexical ranking is the same weighted
//! BM25 the SQLite backend gets from FTS5. All mutations take the single
//! write lock, which gives the serializability the episodic transactions
//! rely on.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use strata_core::error::StrataError;
use strata_core::traits::adapter::BackendAdapter;
use strata_core::types::{cosine_similarity, BackendKind, HealthStatus, UserId};
use strata_filter::CompiledFilter;

use crate::lexical::bm25_rank;
use crate::models::{
    AuditEvent, ChatMessage, Conversation, EpisodeRecord, InstanceRecord, PersonaRecord,
    ScanOrder, SearchTable, SourceKind, StoredDoc,
};
use crate::traits::VectorStore;

#[derive(Default)]
struct Inner {
    personas: HashMap<String, PersonaRecord>,
    knowledge: HashMap<String, StoredDoc>,
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, ChatMessage>,
    episodes: HashMap<String, EpisodeRecord>,
    instances: HashMap<String, InstanceRecord>,
    audit: Vec<AuditEvent>,
}

/// In-memory [`VectorStore`] backend.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn doc_passes(
    doc: &StoredDoc,
    user: Option<&UserId>,
    predicate: Option<&CompiledFilter>,
) -> bool {
    if let Some(user) = user {
        if doc.user_id != user.as_str() {
            return false;
        }
    }
    match predicate {
        Some(filter) => filter.matches(&doc.to_filter_doc()),
        None => true,
    }
}

impl Inner {
    /// Candidate docs of one table, filtered and in a deterministic order.
    fn collect(
        &self,
        table: SearchTable,
        user: Option<&UserId>,
        predicate: Option<&CompiledFilter>,
    ) -> Vec<StoredDoc> {
        let mut docs: Vec<StoredDoc> = match table {
            SearchTable::Knowledge => self.knowledge.values().cloned().collect(),
            SearchTable::Episodes => self.episodes.values().map(|e| e.to_doc()).collect(),
            SearchTable::Instances => self.instances.values().map(|i| i.to_doc()).collect(),
        };
        docs.retain(|d| doc_passes(d, user, predicate));
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs
    }
}

#[async_trait]
impl BackendAdapter for InMemoryStore {
    fn name(&self) -> &str {
        "memory-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 4, 0)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn get_persona(&self, user: &UserId) -> Result<Option<PersonaRecord>, StrataError> {
        Ok(self.inner.read().await.personas.get(user.as_str()).cloned())
    }

    async fn upsert_persona(&self, persona: &PersonaRecord) -> Result<(), StrataError> {
        self.inner
            .write()
            .await
            .personas
            .insert(persona.user_id.clone(), persona.clone());
        Ok(())
    }

    async fn delete_persona(&self, user: &UserId) -> Result<(), StrataError> {
        let removed = self.inner.write().await.personas.remove(user.as_str());
        if removed.is_none() {
            return Err(StrataError::NotFound {
                entity: "persona",
                id: user.as_str().to_string(),
            });
        }
        Ok(())
    }

    async fn put_knowledge(&self, doc: &StoredDoc) -> Result<(), StrataError> {
        let mut inner = self.inner.write().await;
        if inner.knowledge.contains_key(&doc.id) {
            return Err(StrataError::Conflict(format!(
                "knowledge item `{}` already exists",
                doc.id
            )));
        }
        inner.knowledge.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn get_knowledge(&self, id: &str) -> Result<Option<StoredDoc>, StrataError> {
        Ok(self.inner.read().await.knowledge.get(id).cloned())
    }

    async fn delete_knowledge(&self, id: &str) -> Result<(), StrataError> {
        let removed = self.inner.write().await.knowledge.remove(id);
        if removed.is_none() {
            return Err(StrataError::NotFound {
                entity: "knowledge_item",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn touch_knowledge(
        &self,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), StrataError> {
        let mut inner = self.inner.write().await;
        for id in ids {
            if let Some(doc) = inner.knowledge.get_mut(id) {
                doc.last_accessed_at = Some(at);
            }
        }
        Ok(())
    }

    async fn ann(
        &self,
        table: SearchTable,
        user: Option<&UserId>,
        embedding: &[f32],
        k: usize,
        predicate: Option<&CompiledFilter>,
    ) -> Result<Vec<(StoredDoc, f32)>, StrataError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().await;
        let docs = inner.collect(table, user, predicate);
        let mut scored: Vec<(StoredDoc, f32)> = docs
            .into_iter()
            .filter(|d| !d.embedding.is_empty())
            .map(|d| {
                // Clamp into [0, 1]; anti-similar vectors rank at zero.
                let sim = cosine_similarity(embedding, &d.embedding).max(0.0);
                (d, sim)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.id.cmp(&b.0.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn lex(
        &self,
        table: SearchTable,
        user: Option<&UserId>,
        query: &str,
        k: usize,
        predicate: Option<&CompiledFilter>,
    ) -> Result<Vec<(StoredDoc, f64)>, StrataError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().await;
        let docs = inner.collect(table, user, predicate);
        let ranked = bm25_rank(query, &docs);
        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(i, score)| (docs[i].clone(), score))
            .collect())
    }

    async fn scan(
        &self,
        table: SearchTable,
        user: Option<&UserId>,
        predicate: Option<&CompiledFilter>,
        limit: usize,
        order: ScanOrder,
    ) -> Result<Vec<StoredDoc>, StrataError> {
        let inner = self.inner.read().await;
        let mut docs = inner.collect(table, user, predicate);
        match order {
            ScanOrder::CreatedAtDesc => {
                docs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)))
            }
            ScanOrder::CreatedAtAsc => {
                docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            }
            ScanOrder::ImportanceDesc => docs.sort_by(|a, b| {
                b.importance
                    .partial_cmp(&a.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            }),
        }
        docs.truncate(limit);
        Ok(docs)
    }

    async fn ensure_super_chat(&self, user: &UserId) -> Result<Conversation, StrataError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .conversations
            .values()
            .find(|c| c.user_id == user.as_str() && c.kind == SourceKind::SuperChat)
        {
            return Ok(existing.clone());
        }
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            user_id: user.as_str().to_string(),
            kind: SourceKind::SuperChat,
            title: None,
            tenant_id: None,
            created_at: Utc::now(),
        };
        inner
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn create_deep_dive(
        &self,
        user: &UserId,
        title: &str,
        tenant_id: Option<&str>,
    ) -> Result<Conversation, StrataError> {
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            user_id: user.as_str().to_string(),
            kind: SourceKind::DeepDive,
            title: Some(title.to_string()),
            tenant_id: tenant_id.map(String::from),
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StrataError> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<Conversation> = inner.conversations.values().cloned().collect();
        conversations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(conversations)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StrataError> {
        Ok(self.inner.read().await.conversations.get(id).cloned())
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<(), StrataError> {
        let mut inner = self.inner.write().await;
        if !inner.conversations.contains_key(&message.conversation_id) {
            return Err(StrataError::NotFound {
                entity: "conversation",
                id: message.conversation_id.clone(),
            });
        }
        if inner.messages.contains_key(&message.id) {
            return Err(StrataError::Conflict(format!(
                "message `{}` already exists",
                message.id
            )));
        }
        inner.messages.insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn unepisodized_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ChatMessage>, StrataError> {
        let inner = self.inner.read().await;
        let mut messages: Vec<ChatMessage> = inner
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id && !m.episodized)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn recent_messages(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StrataError> {
        let inner = self.inner.read().await;
        let user_conversations: Vec<&str> = inner
            .conversations
            .values()
            .filter(|c| c.user_id == user.as_str())
            .map(|c| c.id.as_str())
            .collect();
        let mut messages: Vec<ChatMessage> = inner
            .messages
            .values()
            .filter(|m| user_conversations.contains(&m.conversation_id.as_str()))
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        messages.truncate(limit);
        Ok(messages)
    }

    async fn episodize_group(
        &self,
        episode: &EpisodeRecord,
        message_ids: &[String],
    ) -> Result<(), StrataError> {
        if episode.message_count != episode.messages.len() {
            return Err(StrataError::Validation(format!(
                "episode message_count {} does not match snapshot length {}",
                episode.message_count,
                episode.messages.len()
            )));
        }
        if episode.date_from > episode.date_to {
            return Err(StrataError::Validation(
                "episode date_from must not exceed date_to".into(),
            ));
        }

        let mut inner = self.inner.write().await;
        // Validate before mutating: all-or-nothing.
        for id in message_ids {
            match inner.messages.get(id) {
                None => {
                    return Err(StrataError::NotFound {
                        entity: "chat_message",
                        id: id.clone(),
                    })
                }
                Some(m) if m.episodized => {
                    return Err(StrataError::Conflict(format!(
                        "message `{id}` is already episodized"
                    )))
                }
                Some(_) => {}
            }
        }
        if inner.episodes.contains_key(&episode.id) {
            return Err(StrataError::Conflict(format!(
                "episode `{}` already exists",
                episode.id
            )));
        }

        inner.episodes.insert(episode.id.clone(), episode.clone());
        for id in message_ids {
            let message = inner.messages.get_mut(id).expect("validated above");
            message.episodized = true;
            message.episodized_at = Some(episode.created_at);
        }
        Ok(())
    }

    async fn get_episode(&self, id: &str) -> Result<Option<EpisodeRecord>, StrataError> {
        Ok(self.inner.read().await.episodes.get(id).cloned())
    }

    async fn list_episodes_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<EpisodeRecord>, StrataError> {
        let inner = self.inner.read().await;
        let mut episodes: Vec<EpisodeRecord> = inner
            .episodes
            .values()
            .filter(|e| e.created_at <= cutoff)
            .cloned()
            .collect();
        episodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(episodes)
    }

    async fn list_episodes(&self) -> Result<Vec<EpisodeRecord>, StrataError> {
        let inner = self.inner.read().await;
        let mut episodes: Vec<EpisodeRecord> = inner.episodes.values().cloned().collect();
        episodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(episodes)
    }

    async fn instancize_episode(&self, instance: &InstanceRecord) -> Result<(), StrataError> {
        let mut inner = self.inner.write().await;
        if !inner.episodes.contains_key(&instance.original_episode_id) {
            return Err(StrataError::NotFound {
                entity: "episode",
                id: instance.original_episode_id.clone(),
            });
        }
        inner.episodes.remove(&instance.original_episode_id);
        inner.instances.insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    async fn get_instance(&self, id: &str) -> Result<Option<InstanceRecord>, StrataError> {
        Ok(self.inner.read().await.instances.get(id).cloned())
    }

    async fn list_compression_due(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<InstanceRecord>, StrataError> {
        let inner = self.inner.read().await;
        let mut due: Vec<InstanceRecord> = inner
            .instances
            .values()
            .filter(|i| i.created_at <= cutoff && !i.compression_candidate)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn mark_compression_candidate(&self, instance_id: &str) -> Result<(), StrataError> {
        let mut inner = self.inner.write().await;
        match inner.instances.get_mut(instance_id) {
            Some(instance) => {
                instance.compression_candidate = true;
                Ok(())
            }
            None => Err(StrataError::NotFound {
                entity: "instance",
                id: instance_id.to_string(),
            }),
        }
    }

    async fn append_audit(&self, event: &AuditEvent) -> Result<(), StrataError> {
        self.inner.write().await.audit.push(event.clone());
        Ok(())
    }

    async fn list_audit(
        &self,
        user: Option<&UserId>,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, StrataError> {
        let inner = self.inner.read().await;
        let mut events: Vec<AuditEvent> = inner
            .audit
            .iter()
            .filter(|e| user.map(|u| e.user_id == u.as_str()).unwrap_or(true))
            .cloned()
            .collect();
        events.reverse();
        events.truncate(limit);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditAction, MessageSnapshot, Role};
    use chrono::TimeZone;
    use serde_json::json;
    use strata_filter::{compile, FieldTypeRegistry, FilterExpr};

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()
    }

    fn doc(id: &str, user: &str, content: &str, embedding: Vec<f32>) -> StoredDoc {
        StoredDoc {
            id: id.into(),
            user_id: user.into(),
            category: crate::models::Category::Knowledge,
            title: None,
            content: content.into(),
            tags: vec![],
            metadata: json!({}),
            importance: 0.5,
            confidence: 1.0,
            embedding,
            source_id: None,
            created_at: t(0),
            updated_at: t(0),
            last_accessed_at: None,
        }
    }

    fn message(id: &str, conversation: &str, minute: u32) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            conversation_id: conversation.into(),
            role: Role::User,
            content: format!("message {id}"),
            created_at: t(minute),
            episodized: false,
            episodized_at: None,
        }
    }

    fn episode_for(messages: &[ChatMessage]) -> EpisodeRecord {
        EpisodeRecord {
            id: Uuid::new_v4().to_string(),
            user_id: "u1".into(),
            source_kind: SourceKind::SuperChat,
            source_id: messages[0].conversation_id.clone(),
            messages: messages.iter().map(MessageSnapshot::from).collect(),
            message_count: messages.len(),
            date_from: messages[0].created_at,
            date_to: messages[messages.len() - 1].created_at,
            embedding: vec![0.1; 8],
            metadata: json!({}),
            tags: vec![],
            importance: 0.5,
            created_at: t(30),
        }
    }

    #[tokio::test]
    async fn knowledge_put_get_delete() {
        let store = InMemoryStore::new();
        let d = doc("k1", "u1", "rust ownership", vec![1.0, 0.0]);
        store.put_knowledge(&d).await.unwrap();
        assert!(store.get_knowledge("k1").await.unwrap().is_some());
        // Duplicate insert conflicts.
        assert!(matches!(
            store.put_knowledge(&d).await,
            Err(StrataError::Conflict(_))
        ));
        store.delete_knowledge("k1").await.unwrap();
        assert!(store.get_knowledge("k1").await.unwrap().is_none());
        assert!(matches!(
            store.delete_knowledge("k1").await,
            Err(StrataError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn ann_ranks_by_cosine_and_respects_user_scope() {
        let store = InMemoryStore::new();
        store
            .put_knowledge(&doc("a", "u1", "x", vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .put_knowledge(&doc("b", "u1", "y", vec![0.6, 0.8]))
            .await
            .unwrap();
        store
            .put_knowledge(&doc("c", "u2", "z", vec![1.0, 0.0]))
            .await
            .unwrap();

        let hits = store
            .ann(
                SearchTable::Knowledge,
                Some(&UserId::from("u1")),
                &[1.0, 0.0],
                10,
                None,
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.id, "a");
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert!(hits[1].1 < hits[0].1);
    }

    #[tokio::test]
    async fn ann_pushes_predicate_down() {
        let store = InMemoryStore::new();
        let mut tagged = doc("a", "u1", "x", vec![1.0, 0.0]);
        tagged.tags = vec!["python".into()];
        store.put_knowledge(&tagged).await.unwrap();
        store
            .put_knowledge(&doc("b", "u1", "y", vec![1.0, 0.0]))
            .await
            .unwrap();

        let filter = compile(
            &FilterExpr::any_of("tags", vec!["python"]),
            &FieldTypeRegistry::with_engine_schema(),
            Utc::now(),
        )
        .unwrap();
        let hits = store
            .ann(
                SearchTable::Knowledge,
                Some(&UserId::from("u1")),
                &[1.0, 0.0],
                10,
                Some(&filter),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "a");
    }

    #[tokio::test]
    async fn k_zero_returns_empty() {
        let store = InMemoryStore::new();
        store
            .put_knowledge(&doc("a", "u1", "x", vec![1.0, 0.0]))
            .await
            .unwrap();
        assert!(store
            .ann(SearchTable::Knowledge, None, &[1.0, 0.0], 0, None)
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .lex(SearchTable::Knowledge, None, "x", 0, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn episodize_group_is_atomic_and_conflicts_on_reuse() {
        let store = InMemoryStore::new();
        let user = UserId::from("u1");
        let conversation = store.ensure_super_chat(&user).await.unwrap();
        let m1 = message("m1", &conversation.id, 1);
        let m2 = message("m2", &conversation.id, 2);
        store.append_message(&m1).await.unwrap();
        store.append_message(&m2).await.unwrap();

        let episode = episode_for(&[m1.clone(), m2.clone()]);
        store
            .episodize_group(&episode, &["m1".into(), "m2".into()])
            .await
            .unwrap();

        // Flags flipped atomically with the insert.
        let remaining = store.unepisodized_messages(&conversation.id).await.unwrap();
        assert!(remaining.is_empty());

        // Re-running against the same messages conflicts and writes nothing.
        let episode2 = episode_for(&[m1, m2]);
        assert!(matches!(
            store
                .episodize_group(&episode2, &["m1".into(), "m2".into()])
                .await,
            Err(StrataError::Conflict(_))
        ));
        assert_eq!(store.list_episodes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn episodize_group_rejects_partially_missing_messages() {
        let store = InMemoryStore::new();
        let user = UserId::from("u1");
        let conversation = store.ensure_super_chat(&user).await.unwrap();
        let m1 = message("m1", &conversation.id, 1);
        store.append_message(&m1).await.unwrap();

        let episode = episode_for(&[m1.clone()]);
        let result = store
            .episodize_group(&episode, &["m1".into(), "ghost".into()])
            .await;
        assert!(matches!(result, Err(StrataError::NotFound { .. })));
        // Nothing was written: m1 untouched, no episode row.
        assert_eq!(
            store
                .unepisodized_messages(&conversation.id)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(store.list_episodes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn instancize_moves_episode_exactly_once() {
        let store = InMemoryStore::new();
        let user = UserId::from("u1");
        let conversation = store.ensure_super_chat(&user).await.unwrap();
        let m1 = message("m1", &conversation.id, 1);
        store.append_message(&m1).await.unwrap();
        let episode = episode_for(&[m1]);
        store.episodize_group(&episode, &["m1".into()]).await.unwrap();

        let instance = InstanceRecord::from_episode(&episode, t(45));
        store.instancize_episode(&instance).await.unwrap();

        // Episode and instance never coexist.
        assert!(store.get_episode(&episode.id).await.unwrap().is_none());
        assert!(store.get_instance(&instance.id).await.unwrap().is_some());

        // Second run: episode is gone, NotFound, no duplicate instance.
        let instance2 = InstanceRecord::from_episode(&episode, t(46));
        assert!(matches!(
            store.instancize_episode(&instance2).await,
            Err(StrataError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn super_chat_is_singleton_per_user() {
        let store = InMemoryStore::new();
        let user = UserId::from("u1");
        let first = store.ensure_super_chat(&user).await.unwrap();
        let second = store.ensure_super_chat(&user).await.unwrap();
        assert_eq!(first.id, second.id);

        let other = store.ensure_super_chat(&UserId::from("u2")).await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn audit_log_is_append_only_newest_first() {
        let store = InMemoryStore::new();
        for i in 0..3 {
            store
                .append_audit(&AuditEvent::new(
                    AuditAction::Episodized,
                    format!("e{i}"),
                    "u1",
                    t(i),
                    json!({}),
                ))
                .await
                .unwrap();
        }
        let events = store.list_audit(Some(&UserId::from("u1")), 2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].entity_id, "e2");
    }

    #[tokio::test]
    async fn scan_orders_and_limits() {
        let store = InMemoryStore::new();
        let mut a = doc("a", "u1", "x", vec![]);
        a.importance = 0.2;
        a.created_at = t(1);
        let mut b = doc("b", "u1", "y", vec![]);
        b.importance = 0.9;
        b.created_at = t(2);
        store.put_knowledge(&a).await.unwrap();
        store.put_knowledge(&b).await.unwrap();

        let newest = store
            .scan(SearchTable::Knowledge, None, None, 10, ScanOrder::CreatedAtDesc)
            .await
            .unwrap();
        assert_eq!(newest[0].id, "b");

        let important = store
            .scan(SearchTable::Knowledge, None, None, 1, ScanOrder::ImportanceDesc)
            .await
            .unwrap();
        assert_eq!(important.len(), 1);
        assert_eq!(important[0].id, "b");
    }
}
