// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store abstraction and backends for the Strata memory engine.
//!
//! The [`VectorStore`] trait is the persistence contract the engine
//! consumes: persistent KV, vector ANN, field-weighted full-text ranking,
//! filter-predicate pushdown, and the episodic pipeline's bounded
//! transactions. Two backends ship in-tree:
//!
//! - [`InMemoryStore`]: brute-force reference backend for tests and
//!   embedded use
//! - [`SqliteStore`]: tokio-rusqlite + refinery migrations, BLOB vectors,
//!   FTS5 BM25 with field weights

pub mod lexical;
pub mod memory;
pub mod models;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryStore;
pub use models::{
    canonical_ts, parse_ts, AuditAction, AuditEvent, Category, ChatMessage, Conversation,
    EpisodeRecord, InstanceRecord, MessageSnapshot, PersonaRecord, Role, ScanOrder, SearchTable,
    SourceKind, StoredDoc,
};
pub use sqlite::SqliteStore;
pub use traits::VectorStore;
