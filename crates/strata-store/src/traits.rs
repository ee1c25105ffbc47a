// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The vector store contract.
//!
//! The engine assumes a vector-indexed relational store; this trait is the
//! whole surface it consumes. Backends are tagged variants (in-process
//! in-memory store for tests, SQLite store in-tree, networked stores out of
//! tree) and the core is buildable against any of them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use strata_core::error::StrataError;
use strata_core::traits::adapter::BackendAdapter;
use strata_core::types::UserId;
use strata_filter::CompiledFilter;

use crate::models::{
    AuditEvent, ChatMessage, Conversation, EpisodeRecord, InstanceRecord, PersonaRecord,
    ScanOrder, SearchTable, StoredDoc,
};

/// Persistent KV + vector ANN + full-text index consumed by the engine.
///
/// All operations are atomic unless noted. The two `*_group` operations are
/// the episodic pipeline's bounded transactions: they either commit fully
/// or leave the store untouched.
#[async_trait]
pub trait VectorStore: BackendAdapter {
    // --- Persona ---

    async fn get_persona(&self, user: &UserId) -> Result<Option<PersonaRecord>, StrataError>;

    /// Insert or replace the single persona row for a user. Concurrent
    /// writers are serialized by the store; last writer wins on fields.
    async fn upsert_persona(&self, persona: &PersonaRecord) -> Result<(), StrataError>;

    async fn delete_persona(&self, user: &UserId) -> Result<(), StrataError>;

    // --- Knowledge ---

    async fn put_knowledge(&self, doc: &StoredDoc) -> Result<(), StrataError>;

    async fn get_knowledge(&self, id: &str) -> Result<Option<StoredDoc>, StrataError>;

    async fn delete_knowledge(&self, id: &str) -> Result<(), StrataError>;

    /// Stamp `last_accessed_at` on the given knowledge rows.
    async fn touch_knowledge(&self, ids: &[String], at: DateTime<Utc>)
        -> Result<(), StrataError>;

    // --- Search surface (knowledge / episodes / instances) ---

    /// Top-k rows by cosine similarity where the predicate holds.
    /// Similarities are returned in [0, 1] (1 = identical).
    async fn ann(
        &self,
        table: SearchTable,
        user: Option<&UserId>,
        embedding: &[f32],
        k: usize,
        predicate: Option<&CompiledFilter>,
    ) -> Result<Vec<(StoredDoc, f32)>, StrataError>;

    /// Top-k rows by field-weighted lexical relevance (BM25 family), field
    /// weights title >> content >> tags.
    async fn lex(
        &self,
        table: SearchTable,
        user: Option<&UserId>,
        query: &str,
        k: usize,
        predicate: Option<&CompiledFilter>,
    ) -> Result<Vec<(StoredDoc, f64)>, StrataError>;

    /// Paged rows for filter-only queries.
    async fn scan(
        &self,
        table: SearchTable,
        user: Option<&UserId>,
        predicate: Option<&CompiledFilter>,
        limit: usize,
        order: ScanOrder,
    ) -> Result<Vec<StoredDoc>, StrataError>;

    // --- Conversations & messages ---

    /// Fetch or create the user's single super-chat conversation.
    async fn ensure_super_chat(&self, user: &UserId) -> Result<Conversation, StrataError>;

    async fn create_deep_dive(
        &self,
        user: &UserId,
        title: &str,
        tenant_id: Option<&str>,
    ) -> Result<Conversation, StrataError>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StrataError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StrataError>;

    async fn append_message(&self, message: &ChatMessage) -> Result<(), StrataError>;

    /// Un-episodized messages of one conversation in chronological order.
    async fn unepisodized_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ChatMessage>, StrataError>;

    /// Most recent messages across a user's conversations, newest first.
    async fn recent_messages(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StrataError>;

    // --- Episodic lifecycle transactions ---

    /// Atomically insert `episode` and flip `episodized` on exactly the
    /// given source messages. Fails with `Conflict` (and writes nothing)
    /// if any message is already episodized, so two pipeline runs cannot
    /// double-consume a message.
    async fn episodize_group(
        &self,
        episode: &EpisodeRecord,
        message_ids: &[String],
    ) -> Result<(), StrataError>;

    async fn get_episode(&self, id: &str) -> Result<Option<EpisodeRecord>, StrataError>;

    /// Episodes created at or before `cutoff`, oldest first.
    async fn list_episodes_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<EpisodeRecord>, StrataError>;

    /// All episodes (maintenance surface: orphan detection).
    async fn list_episodes(&self) -> Result<Vec<EpisodeRecord>, StrataError>;

    /// Atomically insert `instance` and delete its original episode. Fails
    /// with `NotFound` (and writes nothing) when the episode no longer
    /// exists, making a second run a no-op.
    async fn instancize_episode(&self, instance: &InstanceRecord) -> Result<(), StrataError>;

    async fn get_instance(&self, id: &str) -> Result<Option<InstanceRecord>, StrataError>;

    /// Instances created at or before `cutoff` that are not yet flagged as
    /// compression candidates.
    async fn list_compression_due(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<InstanceRecord>, StrataError>;

    /// Flag an instance as a compression candidate. Idempotent.
    async fn mark_compression_candidate(&self, instance_id: &str) -> Result<(), StrataError>;

    // --- Lifecycle audit log (append-only) ---

    async fn append_audit(&self, event: &AuditEvent) -> Result<(), StrataError>;

    async fn list_audit(
        &self,
        user: Option<&UserId>,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, StrataError>;
}
