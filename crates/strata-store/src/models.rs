// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain row types persisted by the vector store.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum::{Display, EnumString};

/// Render a timestamp in the canonical storage form: RFC 3339 with
/// millisecond precision and a `Z` suffix, so lexicographic order equals
/// time order.
pub fn canonical_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a canonical timestamp back.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The search-capable tables exposed through `ann` / `lex` / `scan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SearchTable {
    Knowledge,
    Episodes,
    Instances,
}

/// Ordering for filter-only scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    CreatedAtDesc,
    CreatedAtAsc,
    ImportanceDesc,
}

/// Category of a long-lived knowledge item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Knowledge,
    Skill,
    Process,
    Other,
}

/// Role of a chat message author.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Shape of a conversation container.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// At most one per user; a monotonic timeline.
    SuperChat,
    /// Per-topic thread with a title and optional tenant scope.
    DeepDive,
}

/// A row surfaced by the search operations, independent of which table it
/// came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDoc {
    pub id: String,
    pub user_id: String,
    pub category: Category,
    pub title: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    pub metadata: Value,
    /// Clamped into [0, 1] before any ranker sees it.
    pub importance: f64,
    pub confidence: f64,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Origin identifier used by diversity sampling (conversation id for
    /// episodes, ingest source for knowledge).
    pub source_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl StoredDoc {
    /// Project the row into the JSON shape the filter evaluator sees. Must
    /// list every filterable field so in-memory evaluation agrees with the
    /// store-side predicate.
    pub fn to_filter_doc(&self) -> Value {
        json!({
            "id": self.id,
            "user_id": self.user_id,
            "category": self.category.to_string(),
            "title": self.title,
            "content": self.content,
            "tags": self.tags,
            "metadata": self.metadata,
            "importance": self.importance,
            "confidence": self.confidence,
            "source_id": self.source_id,
            "created_at": canonical_ts(self.created_at),
            "updated_at": canonical_ts(self.updated_at),
            "last_accessed_at": self.last_accessed_at.map(canonical_ts),
        })
    }
}

/// Per-user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaRecord {
    pub user_id: String,
    pub name: Option<String>,
    pub preferences: Map<String, Value>,
    pub interests: Vec<String>,
    pub expertise: Vec<String>,
    /// Accumulated profile text.
    pub raw_content: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonaRecord {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
            preferences: Map::new(),
            interests: Vec::new(),
            expertise: Vec::new(),
            raw_content: String::new(),
            embedding: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge an update into this persona: preference keys overwrite, tag
    /// sets union (order-preserving), raw content appends, embedding
    /// replaces. Last writer wins on `name`.
    pub fn merge_from(&mut self, update: &PersonaRecord) {
        if update.name.is_some() {
            self.name = update.name.clone();
        }
        for (k, v) in &update.preferences {
            self.preferences.insert(k.clone(), v.clone());
        }
        for tag in &update.interests {
            if !self.interests.contains(tag) {
                self.interests.push(tag.clone());
            }
        }
        for tag in &update.expertise {
            if !self.expertise.contains(tag) {
                self.expertise.push(tag.clone());
            }
        }
        if !update.raw_content.is_empty() {
            if !self.raw_content.is_empty() {
                self.raw_content.push('\n');
            }
            self.raw_content.push_str(&update.raw_content);
        }
        if !update.embedding.is_empty() {
            self.embedding = update.embedding.clone();
        }
        self.updated_at = update.updated_at;
    }

    /// The text the persona embedding is computed from.
    pub fn embedding_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("Name: {name}"));
        }
        if !self.interests.is_empty() {
            parts.push(format!("Interests: {}", self.interests.join(", ")));
        }
        if !self.expertise.is_empty() {
            parts.push(format!("Expertise: {}", self.expertise.join(", ")));
        }
        if !self.raw_content.is_empty() {
            parts.push(self.raw_content.clone());
        }
        parts.join(" | ")
    }
}

/// A conversation container (super-chat or deep-dive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub kind: SourceKind,
    pub title: Option<String>,
    pub tenant_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One turn in a conversation. Immutable after write except for the
/// episodization flag pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub episodized: bool,
    pub episodized_at: Option<DateTime<Utc>>,
}

/// Frozen copy of a message carried inside an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatMessage> for MessageSnapshot {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            created_at: msg.created_at,
        }
    }
}

/// A consolidated run of messages from one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: String,
    pub user_id: String,
    pub source_kind: SourceKind,
    pub source_id: String,
    pub messages: Vec<MessageSnapshot>,
    pub message_count: usize,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub metadata: Value,
    pub tags: Vec<String>,
    pub importance: f64,
    pub created_at: DateTime<Utc>,
}

impl EpisodeRecord {
    /// The space-joined message text an episode embedding and lexical index
    /// are computed from.
    pub fn joined_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_doc(&self) -> StoredDoc {
        StoredDoc {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            category: Category::Other,
            title: None,
            content: self.joined_text(),
            tags: self.tags.clone(),
            metadata: self.metadata.clone(),
            importance: self.importance,
            confidence: 1.0,
            embedding: self.embedding.clone(),
            source_id: Some(self.source_id.clone()),
            created_at: self.created_at,
            updated_at: self.created_at,
            last_accessed_at: None,
        }
    }
}

/// An archived episode past the retention window. Mirrors [`EpisodeRecord`]
/// plus archival fields; an episode and its instance never coexist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: String,
    pub user_id: String,
    pub source_kind: SourceKind,
    pub source_id: String,
    pub original_episode_id: String,
    pub messages: Vec<MessageSnapshot>,
    pub message_count: usize,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub metadata: Value,
    pub tags: Vec<String>,
    pub importance: f64,
    pub created_at: DateTime<Utc>,
    pub instancized_at: DateTime<Utc>,
    pub compression_candidate: bool,
    pub compressed: bool,
    pub compressed_blob: Option<Vec<u8>>,
}

impl InstanceRecord {
    /// Build the archival copy of an episode.
    pub fn from_episode(episode: &EpisodeRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: episode.user_id.clone(),
            source_kind: episode.source_kind,
            source_id: episode.source_id.clone(),
            original_episode_id: episode.id.clone(),
            messages: episode.messages.clone(),
            message_count: episode.message_count,
            date_from: episode.date_from,
            date_to: episode.date_to,
            embedding: episode.embedding.clone(),
            metadata: episode.metadata.clone(),
            tags: episode.tags.clone(),
            importance: episode.importance,
            created_at: episode.created_at,
            instancized_at: now,
            compression_candidate: false,
            compressed: false,
            compressed_blob: None,
        }
    }

    pub fn to_doc(&self) -> StoredDoc {
        StoredDoc {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            category: Category::Other,
            title: None,
            content: self
                .messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            tags: self.tags.clone(),
            metadata: self.metadata.clone(),
            importance: self.importance,
            confidence: 1.0,
            embedding: self.embedding.clone(),
            source_id: Some(self.source_id.clone()),
            created_at: self.created_at,
            updated_at: self.instancized_at,
            last_accessed_at: None,
        }
    }
}

/// Lifecycle audit actions. The audit log is append-only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Episodized,
    Instancized,
    CompressionCandidate,
    EpisodizeFailed,
    OrphanDetected,
    Invalidated,
}

/// One append-only lifecycle audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub action: AuditAction,
    pub entity_id: String,
    pub user_id: String,
    pub at: DateTime<Utc>,
    pub detail: Value,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        entity_id: impl Into<String>,
        user_id: impl Into<String>,
        at: DateTime<Utc>,
        detail: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            entity_id: entity_id.into(),
            user_id: user_id.into(),
            at,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn canonical_ts_is_sortable_and_parseable() {
        let early = canonical_ts(t(1));
        let late = canonical_ts(t(12));
        assert!(early < late);
        assert_eq!(parse_ts(&early).unwrap(), t(1));
    }

    #[test]
    fn persona_merge_unions_tags_and_overwrites_preferences() {
        let mut base = PersonaRecord::new("u1", t(0));
        base.interests = vec!["rust".into()];
        base.preferences.insert("theme".into(), json!("dark"));
        base.raw_content = "Works on databases".into();

        let mut update = PersonaRecord::new("u1", t(2));
        update.name = Some("Sam".into());
        update.interests = vec!["rust".into(), "databases".into()];
        update.preferences.insert("theme".into(), json!("light"));
        update.raw_content = "Prefers short answers".into();
        update.embedding = vec![0.5; 4];

        base.merge_from(&update);
        assert_eq!(base.name.as_deref(), Some("Sam"));
        assert_eq!(base.interests, vec!["rust".to_string(), "databases".to_string()]);
        assert_eq!(base.preferences["theme"], json!("light"));
        assert!(base.raw_content.contains("databases"));
        assert!(base.raw_content.contains("short answers"));
        assert_eq!(base.embedding.len(), 4);
        assert_eq!(base.updated_at, t(2));
        assert_eq!(base.created_at, t(0));
    }

    #[test]
    fn episode_doc_projection_joins_messages() {
        let episode = EpisodeRecord {
            id: "e1".into(),
            user_id: "u1".into(),
            source_kind: SourceKind::SuperChat,
            source_id: "c1".into(),
            messages: vec![
                MessageSnapshot {
                    role: Role::User,
                    content: "hello".into(),
                    created_at: t(1),
                },
                MessageSnapshot {
                    role: Role::Assistant,
                    content: "hi there".into(),
                    created_at: t(1),
                },
            ],
            message_count: 2,
            date_from: t(1),
            date_to: t(1),
            embedding: vec![0.1; 4],
            metadata: json!({}),
            tags: vec![],
            importance: 0.5,
            created_at: t(2),
        };
        let doc = episode.to_doc();
        assert_eq!(doc.content, "hello hi there");
        assert_eq!(doc.source_id.as_deref(), Some("c1"));
    }

    #[test]
    fn instance_mirrors_episode() {
        let episode = EpisodeRecord {
            id: "e1".into(),
            user_id: "u1".into(),
            source_kind: SourceKind::DeepDive,
            source_id: "c9".into(),
            messages: vec![],
            message_count: 0,
            date_from: t(1),
            date_to: t(2),
            embedding: vec![0.2; 8],
            metadata: json!({"topic": "planning"}),
            tags: vec!["planning".into()],
            importance: 0.7,
            created_at: t(3),
        };
        let instance = InstanceRecord::from_episode(&episode, t(5));
        assert_eq!(instance.original_episode_id, "e1");
        assert_eq!(instance.instancized_at, t(5));
        assert_eq!(instance.date_from, t(1));
        assert!(!instance.compressed);
        assert!(instance.compressed_blob.is_none());
        assert_ne!(instance.id, episode.id);
    }

    #[test]
    fn filter_doc_exposes_nested_metadata() {
        let doc = StoredDoc {
            id: "k1".into(),
            user_id: "u1".into(),
            category: Category::Knowledge,
            title: Some("T".into()),
            content: "body".into(),
            tags: vec!["a".into()],
            metadata: json!({"department": "eng"}),
            importance: 0.9,
            confidence: 1.0,
            embedding: vec![],
            source_id: None,
            created_at: t(0),
            updated_at: t(0),
            last_accessed_at: None,
        };
        let v = doc.to_filter_doc();
        assert_eq!(v["metadata"]["department"], "eng");
        assert_eq!(v["tags"][0], "a");
        assert!(v["created_at"].as_str().unwrap().ends_with('Z'));
    }
}
