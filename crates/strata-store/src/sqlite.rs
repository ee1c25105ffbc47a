// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite store backend.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; do not create additional write connections. Embeddings live in
//! BLOB columns and ANN is a cosine pass over predicate-passing rows;
//! lexical ranking uses FTS5 bm25() with field weights title >> content >>
//! tags. A `REGEXP` scalar function is registered so compiled filter
//! predicates with regex leaves work unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, types::Value as SqlValue, OptionalExtension};
use tokio_rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use strata_core::error::StrataError;
use strata_core::traits::adapter::BackendAdapter;
use strata_core::types::{blob_to_vec, cosine_similarity, vec_to_blob, BackendKind, HealthStatus, UserId};
use strata_filter::{CompiledFilter, SqlParam};

use crate::lexical::{tokenize, W_CONTENT, W_TAGS, W_TITLE};
use crate::models::{
    canonical_ts, parse_ts, AuditAction, AuditEvent, ChatMessage, Conversation, EpisodeRecord,
    InstanceRecord, MessageSnapshot, PersonaRecord, Role, ScanOrder, SearchTable, SourceKind,
    StoredDoc,
};
use crate::traits::VectorStore;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// SQLite-backed [`VectorStore`].
pub struct SqliteStore {
    conn: Connection,
}

fn map_sql(e: rusqlite::Error) -> StrataError {
    match &e {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StrataError::Conflict(e.to_string())
        }
        _ => StrataError::transient_with("sqlite operation failed", e),
    }
}

fn tr_err(e: tokio_rusqlite::Error) -> StrataError {
    StrataError::transient_with("sqlite connection failed", e)
}

fn ts_col(s: String) -> Result<DateTime<Utc>, StrataError> {
    parse_ts(&s).ok_or_else(|| StrataError::Internal(format!("malformed stored timestamp `{s}`")))
}

fn json_col<T: serde::de::DeserializeOwned>(s: String) -> Result<T, StrataError> {
    serde_json::from_str(&s)
        .map_err(|e| StrataError::Internal(format!("malformed stored JSON: {e}")))
}

fn enum_col<T: std::str::FromStr>(s: String, what: &str) -> Result<T, StrataError> {
    s.parse()
        .map_err(|_| StrataError::Internal(format!("malformed stored {what} `{s}`")))
}

fn sql_params(params: &[SqlParam]) -> Vec<SqlValue> {
    params
        .iter()
        .map(|p| match p {
            SqlParam::Text(s) => SqlValue::Text(s.clone()),
            SqlParam::Real(r) => SqlValue::Real(*r),
            SqlParam::Int(i) => SqlValue::Integer(*i),
        })
        .collect()
}

/// Escape a user query into a safe FTS5 MATCH expression: quoted tokens
/// joined with OR.
fn fts_match_expr(query: &str) -> Option<String> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return None;
    }
    Some(
        tokens
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

const DOC_COLS: &str = "id, user_id, category, title, content, tags, metadata, importance, \
                        confidence, embedding, source_id, created_at, updated_at, \
                        last_accessed_at";

fn row_to_doc(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDoc> {
    Ok(RawDoc {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        tags: row.get(5)?,
        metadata: row.get(6)?,
        importance: row.get(7)?,
        confidence: row.get(8)?,
        embedding: row.get(9)?,
        source_id: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        last_accessed_at: row.get(13)?,
    })
}

/// Column-shaped row before JSON / timestamp decoding.
struct RawDoc {
    id: String,
    user_id: String,
    category: String,
    title: Option<String>,
    content: String,
    tags: String,
    metadata: String,
    importance: f64,
    confidence: f64,
    embedding: Option<Vec<u8>>,
    source_id: Option<String>,
    created_at: String,
    updated_at: String,
    last_accessed_at: Option<String>,
}

impl RawDoc {
    fn decode(self) -> Result<StoredDoc, StrataError> {
        Ok(StoredDoc {
            id: self.id,
            user_id: self.user_id,
            category: enum_col(self.category, "category")?,
            title: self.title,
            content: self.content,
            tags: json_col(self.tags)?,
            metadata: json_col(self.metadata)?,
            importance: self.importance,
            confidence: self.confidence,
            embedding: self.embedding.map(|b| blob_to_vec(&b)).unwrap_or_default(),
            source_id: self.source_id,
            created_at: ts_col(self.created_at)?,
            updated_at: ts_col(self.updated_at)?,
            last_accessed_at: self.last_accessed_at.map(ts_col).transpose()?,
        })
    }
}

impl SearchTable {
    fn table_name(&self) -> &'static str {
        match self {
            SearchTable::Knowledge => "knowledge_base",
            SearchTable::Episodes => "episodes",
            SearchTable::Instances => "instances",
        }
    }

    fn fts_name(&self) -> &'static str {
        match self {
            SearchTable::Knowledge => "knowledge_fts",
            SearchTable::Episodes => "episodes_fts",
            SearchTable::Instances => "instances_fts",
        }
    }

    /// The doc-column projection for this table. Episodes and instances
    /// alias their joined `content` column and synthesize the fields the
    /// doc shape carries but their schema does not.
    fn doc_select(&self) -> String {
        match self {
            SearchTable::Knowledge => format!("SELECT {DOC_COLS} FROM knowledge_base"),
            SearchTable::Episodes => {
                "SELECT id, user_id, 'other' AS category, NULL AS title, content, tags, \
                 metadata, importance, 1.0 AS confidence, embedding, source_id, created_at, \
                 created_at AS updated_at, NULL AS last_accessed_at FROM episodes"
                    .to_string()
            }
            SearchTable::Instances => {
                "SELECT id, user_id, 'other' AS category, NULL AS title, content, tags, \
                 metadata, importance, 1.0 AS confidence, embedding, source_id, created_at, \
                 instancized_at AS updated_at, NULL AS last_accessed_at FROM instances"
                    .to_string()
            }
        }
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path`, apply PRAGMAs and pending
    /// migrations, and register the `REGEXP` function.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, StrataError> {
        let conn = Connection::open(path).await.map_err(tr_err)?;
        conn.call(move |conn| {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;

            conn.create_scalar_function(
                "regexp",
                2,
                FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
                |ctx| {
                    let pattern: String = ctx.get(0)?;
                    let haystack: String = ctx.get(1)?;
                    let re = regex::Regex::new(&pattern).map_err(|e| {
                        rusqlite::Error::UserFunctionError(Box::new(e))
                    })?;
                    Ok(re.is_match(&haystack))
                },
            )?;

            embedded::migrations::runner()
                .run(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(tr_err)?;

        info!(path, wal_mode, "sqlite store opened");
        Ok(Self { conn })
    }

    async fn query_docs(
        &self,
        sql: String,
        bound: Vec<SqlValue>,
    ) -> Result<Vec<StoredDoc>, StrataError> {
        let raw: Vec<RawDoc> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(bound.iter()), row_to_doc)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(tr_err)?;
        raw.into_iter().map(RawDoc::decode).collect()
    }

    /// Assemble `WHERE` text and parameters from the user scope and a
    /// compiled predicate.
    fn where_clause(
        user: Option<&UserId>,
        predicate: Option<&CompiledFilter>,
    ) -> (String, Vec<SqlValue>) {
        let mut clauses = Vec::new();
        let mut bound = Vec::new();
        if let Some(user) = user {
            clauses.push("user_id = ?".to_string());
            bound.push(SqlValue::Text(user.as_str().to_string()));
        }
        if let Some(filter) = predicate {
            clauses.push(format!("({})", filter.sql().where_sql));
            bound.extend(sql_params(&filter.sql().params));
        }
        if clauses.is_empty() {
            ("1".to_string(), bound)
        } else {
            (clauses.join(" AND "), bound)
        }
    }
}

#[async_trait]
impl BackendAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 4, 0)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        let ok = self
            .conn
            .call(|conn| {
                let value: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
                Ok(value == 1)
            })
            .await
            .map_err(tr_err)?;
        if ok {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("probe query failed".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        // tokio-rusqlite closes the background thread on drop; flush WAL.
        self.conn
            .call(|conn| {
                conn.pragma_update(None, "wal_checkpoint", "TRUNCATE").ok();
                Ok(())
            })
            .await
            .map_err(tr_err)
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn get_persona(&self, user: &UserId) -> Result<Option<PersonaRecord>, StrataError> {
        let user_id = user.as_str().to_string();
        let row = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, name, preferences, interests, expertise, raw_content, \
                     embedding, created_at, updated_at FROM user_persona WHERE user_id = ?1",
                )?;
                let row = stmt
                    .query_row(params![user_id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, Option<Vec<u8>>>(6)?,
                            row.get::<_, String>(7)?,
                            row.get::<_, String>(8)?,
                        ))
                    })
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(tr_err)?;

        row.map(
            |(user_id, name, preferences, interests, expertise, raw_content, embedding, created, updated)| {
                Ok(PersonaRecord {
                    user_id,
                    name,
                    preferences: json_col(preferences)?,
                    interests: json_col(interests)?,
                    expertise: json_col(expertise)?,
                    raw_content,
                    embedding: embedding.map(|b| blob_to_vec(&b)).unwrap_or_default(),
                    created_at: ts_col(created)?,
                    updated_at: ts_col(updated)?,
                })
            },
        )
        .transpose()
    }

    async fn upsert_persona(&self, persona: &PersonaRecord) -> Result<(), StrataError> {
        let p = persona.clone();
        self.conn
            .call(move |conn| {
                Ok(conn
                    .execute(
                        "INSERT INTO user_persona \
                         (user_id, name, preferences, interests, expertise, raw_content, \
                          embedding, created_at, updated_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                         ON CONFLICT(user_id) DO UPDATE SET \
                            name = excluded.name, \
                            preferences = excluded.preferences, \
                            interests = excluded.interests, \
                            expertise = excluded.expertise, \
                            raw_content = excluded.raw_content, \
                            embedding = excluded.embedding, \
                            updated_at = excluded.updated_at",
                        params![
                            p.user_id,
                            p.name,
                            serde_json::to_string(&p.preferences).unwrap_or_else(|_| "{}".into()),
                            serde_json::to_string(&p.interests).unwrap_or_else(|_| "[]".into()),
                            serde_json::to_string(&p.expertise).unwrap_or_else(|_| "[]".into()),
                            p.raw_content,
                            vec_to_blob(&p.embedding),
                            canonical_ts(p.created_at),
                            canonical_ts(p.updated_at),
                        ],
                    )
                    .map(|_| ())
                    .map_err(map_sql))
            })
            .await
            .map_err(tr_err)?
    }

    async fn delete_persona(&self, user: &UserId) -> Result<(), StrataError> {
        let user_id = user.as_str().to_string();
        let affected = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM user_persona WHERE user_id = ?1", params![user_id]))
            })
            .await
            .map_err(tr_err)?
            .map_err(map_sql)?;
        if affected == 0 {
            return Err(StrataError::NotFound {
                entity: "persona",
                id: user.as_str().to_string(),
            });
        }
        Ok(())
    }

    async fn put_knowledge(&self, doc: &StoredDoc) -> Result<(), StrataError> {
        let d = doc.clone();
        self.conn
            .call(move |conn| {
                Ok(conn
                    .execute(
                        "INSERT INTO knowledge_base \
                         (id, user_id, category, title, content, tags, metadata, importance, \
                          confidence, embedding, source_id, created_at, updated_at, \
                          last_accessed_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                        params![
                            d.id,
                            d.user_id,
                            d.category.to_string(),
                            d.title,
                            d.content,
                            serde_json::to_string(&d.tags).unwrap_or_else(|_| "[]".into()),
                            d.metadata.to_string(),
                            d.importance,
                            d.confidence,
                            vec_to_blob(&d.embedding),
                            d.source_id,
                            canonical_ts(d.created_at),
                            canonical_ts(d.updated_at),
                            d.last_accessed_at.map(canonical_ts),
                        ],
                    )
                    .map(|_| ())
                    .map_err(map_sql))
            })
            .await
            .map_err(tr_err)?
    }

    async fn get_knowledge(&self, id: &str) -> Result<Option<StoredDoc>, StrataError> {
        let sql = format!("SELECT {DOC_COLS} FROM knowledge_base WHERE id = ?");
        let docs = self
            .query_docs(sql, vec![SqlValue::Text(id.to_string())])
            .await?;
        Ok(docs.into_iter().next())
    }

    async fn delete_knowledge(&self, id: &str) -> Result<(), StrataError> {
        let id_owned = id.to_string();
        let affected = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM knowledge_base WHERE id = ?1", params![id_owned]))
            })
            .await
            .map_err(tr_err)?
            .map_err(map_sql)?;
        if affected == 0 {
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
        if ids.is_empty() {
            return Ok(());
        }
        let ids = ids.to_vec();
        let stamp = canonical_ts(at);
        self.conn
            .call(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "UPDATE knowledge_base SET last_accessed_at = ? WHERE id IN ({placeholders})"
                );
                let mut bound: Vec<SqlValue> = vec![SqlValue::Text(stamp)];
                bound.extend(ids.into_iter().map(SqlValue::Text));
                Ok(conn
                    .execute(&sql, params_from_iter(bound.iter()))
                    .map(|_| ())
                    .map_err(map_sql))
            })
            .await
            .map_err(tr_err)?
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
        let (where_sql, bound) = Self::where_clause(user, predicate);
        let sql = format!(
            "{} WHERE embedding IS NOT NULL AND {where_sql}",
            table.doc_select()
        );
        let docs = self.query_docs(sql, bound).await?;

        let mut scored: Vec<(StoredDoc, f32)> = docs
            .into_iter()
            .filter(|d| !d.embedding.is_empty())
            .map(|d| {
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
        let Some(match_expr) = fts_match_expr(query) else {
            return Ok(Vec::new());
        };

        let (where_sql, mut bound) = Self::where_clause(user, predicate);
        let bm25_call = match table {
            SearchTable::Knowledge => {
                format!("bm25(knowledge_fts, {W_TITLE}, {W_CONTENT}, {W_TAGS})")
            }
            _ => format!("bm25({})", table.fts_name()),
        };
        // bm25() is ascending (more negative = more relevant); negate it so
        // callers see a positive, descending relevance score.
        let sql = format!(
            "SELECT d.*, -f.score AS relevance FROM ({}) d \
             JOIN (SELECT rowid, {bm25_call} AS score FROM {} WHERE {} MATCH ?) f \
             ON d.rowid = f.rowid WHERE {where_sql} \
             ORDER BY f.score ASC, d.id ASC LIMIT ?",
            match table {
                SearchTable::Knowledge =>
                    format!("SELECT rowid, {DOC_COLS} FROM knowledge_base"),
                SearchTable::Episodes =>
                    "SELECT rowid, id, user_id, 'other' AS category, NULL AS title, content, \
                     tags, metadata, importance, 1.0 AS confidence, embedding, source_id, \
                     created_at, created_at AS updated_at, NULL AS last_accessed_at \
                     FROM episodes"
                        .to_string(),
                SearchTable::Instances =>
                    "SELECT rowid, id, user_id, 'other' AS category, NULL AS title, content, \
                     tags, metadata, importance, 1.0 AS confidence, embedding, source_id, \
                     created_at, instancized_at AS updated_at, NULL AS last_accessed_at \
                     FROM instances"
                        .to_string(),
            },
            table.fts_name(),
            table.fts_name(),
        );

        // Parameter order: MATCH expr comes first (inner subquery), then the
        // outer WHERE params, then the limit.
        let mut all_bound = vec![SqlValue::Text(match_expr)];
        all_bound.append(&mut bound);
        all_bound.push(SqlValue::Integer(k as i64));

        let rows: Vec<(RawDoc, f64)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(all_bound.iter()), |row| {
                    // Column 0 is rowid; doc columns start at 1; relevance last.
                    let raw = RawDoc {
                        id: row.get(1)?,
                        user_id: row.get(2)?,
                        category: row.get(3)?,
                        title: row.get(4)?,
                        content: row.get(5)?,
                        tags: row.get(6)?,
                        metadata: row.get(7)?,
                        importance: row.get(8)?,
                        confidence: row.get(9)?,
                        embedding: row.get(10)?,
                        source_id: row.get(11)?,
                        created_at: row.get(12)?,
                        updated_at: row.get(13)?,
                        last_accessed_at: row.get(14)?,
                    };
                    let relevance: f64 = row.get(15)?;
                    Ok((raw, relevance))
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(tr_err)?;

        rows.into_iter()
            .map(|(raw, score)| raw.decode().map(|d| (d, score)))
            .collect()
    }

    async fn scan(
        &self,
        table: SearchTable,
        user: Option<&UserId>,
        predicate: Option<&CompiledFilter>,
        limit: usize,
        order: ScanOrder,
    ) -> Result<Vec<StoredDoc>, StrataError> {
        let (where_sql, mut bound) = Self::where_clause(user, predicate);
        let order_sql = match order {
            ScanOrder::CreatedAtDesc => "created_at DESC, id ASC",
            ScanOrder::CreatedAtAsc => "created_at ASC, id ASC",
            ScanOrder::ImportanceDesc => "importance DESC, id ASC",
        };
        let sql = format!(
            "{} WHERE {where_sql} ORDER BY {order_sql} LIMIT ?",
            table.doc_select()
        );
        bound.push(SqlValue::Integer(limit as i64));
        self.query_docs(sql, bound).await
    }

    async fn ensure_super_chat(&self, user: &UserId) -> Result<Conversation, StrataError> {
        let user_id = user.as_str().to_string();
        let row = self
            .conn
            .call(move |conn| {
                let existing = conn
                    .query_row(
                        "SELECT id, user_id, kind, title, tenant_id, created_at \
                         FROM conversations WHERE user_id = ?1 AND kind = 'super_chat'",
                        params![user_id],
                        conversation_row,
                    )
                    .optional()?;
                if let Some(existing) = existing {
                    return Ok(Ok(existing));
                }
                let id = Uuid::new_v4().to_string();
                let now = canonical_ts(Utc::now());
                let insert = conn
                    .execute(
                        "INSERT INTO conversations (id, user_id, kind, title, tenant_id, created_at) \
                         VALUES (?1, ?2, 'super_chat', NULL, NULL, ?3)",
                        params![id, user_id, now],
                    )
                    .map_err(map_sql);
                if let Err(e) = insert {
                    return Ok(Err(e));
                }
                let created = conn.query_row(
                    "SELECT id, user_id, kind, title, tenant_id, created_at \
                     FROM conversations WHERE id = ?1",
                    params![id],
                    conversation_row,
                )?;
                Ok(Ok(created))
            })
            .await
            .map_err(tr_err)??;
        decode_conversation(row)
    }

    async fn create_deep_dive(
        &self,
        user: &UserId,
        title: &str,
        tenant_id: Option<&str>,
    ) -> Result<Conversation, StrataError> {
        let user_id = user.as_str().to_string();
        let title = title.to_string();
        let tenant = tenant_id.map(String::from);
        let row = self
            .conn
            .call(move |conn| {
                let id = Uuid::new_v4().to_string();
                let now = canonical_ts(Utc::now());
                let insert = conn
                    .execute(
                        "INSERT INTO conversations (id, user_id, kind, title, tenant_id, created_at) \
                         VALUES (?1, ?2, 'deep_dive', ?3, ?4, ?5)",
                        params![id, user_id, title, tenant, now],
                    )
                    .map_err(map_sql);
                if let Err(e) = insert {
                    return Ok(Err(e));
                }
                let created = conn.query_row(
                    "SELECT id, user_id, kind, title, tenant_id, created_at \
                     FROM conversations WHERE id = ?1",
                    params![id],
                    conversation_row,
                )?;
                Ok(Ok(created))
            })
            .await
            .map_err(tr_err)??;
        decode_conversation(row)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StrataError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, kind, title, tenant_id, created_at \
                     FROM conversations ORDER BY id",
                )?;
                let rows = stmt.query_map([], conversation_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(tr_err)?;
        rows.into_iter().map(decode_conversation).collect()
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StrataError> {
        let id = id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, user_id, kind, title, tenant_id, created_at \
                         FROM conversations WHERE id = ?1",
                        params![id],
                        conversation_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(tr_err)?;
        row.map(decode_conversation).transpose()
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<(), StrataError> {
        let m = message.clone();
        self.conn
            .call(move |conn| {
                Ok(conn
                    .execute(
                        "INSERT INTO chat_messages \
                         (id, conversation_id, role, content, created_at, episodized, episodized_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            m.id,
                            m.conversation_id,
                            m.role.to_string(),
                            m.content,
                            canonical_ts(m.created_at),
                            m.episodized,
                            m.episodized_at.map(canonical_ts),
                        ],
                    )
                    .map(|_| ())
                    .map_err(map_sql))
            })
            .await
            .map_err(tr_err)?
    }

    async fn unepisodized_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ChatMessage>, StrataError> {
        let conversation_id = conversation_id.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, conversation_id, role, content, created_at, episodized, episodized_at \
                     FROM chat_messages WHERE conversation_id = ?1 AND episodized = 0 \
                     ORDER BY created_at ASC, id ASC",
                )?;
                let rows = stmt.query_map(params![conversation_id], message_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(tr_err)?;
        rows.into_iter().map(decode_message).collect()
    }

    async fn recent_messages(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StrataError> {
        let user_id = user.as_str().to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT m.id, m.conversation_id, m.role, m.content, m.created_at, \
                            m.episodized, m.episodized_at \
                     FROM chat_messages m JOIN conversations c ON m.conversation_id = c.id \
                     WHERE c.user_id = ?1 ORDER BY m.created_at DESC, m.id ASC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![user_id, limit as i64], message_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(tr_err)?;
        rows.into_iter().map(decode_message).collect()
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

        let e = episode.clone();
        let ids = message_ids.to_vec();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let insert = tx
                    .execute(
                        "INSERT INTO episodes \
                         (id, user_id, source_kind, source_id, messages, message_count, \
                          date_from, date_to, content, embedding, metadata, tags, importance, \
                          created_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                        params![
                            e.id,
                            e.user_id,
                            e.source_kind.to_string(),
                            e.source_id,
                            serde_json::to_string(&e.messages).unwrap_or_else(|_| "[]".into()),
                            e.message_count as i64,
                            canonical_ts(e.date_from),
                            canonical_ts(e.date_to),
                            e.joined_text(),
                            vec_to_blob(&e.embedding),
                            e.metadata.to_string(),
                            serde_json::to_string(&e.tags).unwrap_or_else(|_| "[]".into()),
                            e.importance,
                            canonical_ts(e.created_at),
                        ],
                    )
                    .map_err(map_sql);
                if let Err(err) = insert {
                    return Ok(Err(err));
                }

                // Flip the flags only on still-unepisodized rows; a shortfall
                // means another run consumed one of them, so roll back.
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "UPDATE chat_messages SET episodized = 1, episodized_at = ? \
                     WHERE id IN ({placeholders}) AND episodized = 0"
                );
                let mut bound: Vec<SqlValue> =
                    vec![SqlValue::Text(canonical_ts(e.created_at))];
                bound.extend(ids.iter().cloned().map(SqlValue::Text));
                let flipped = tx
                    .execute(&sql, params_from_iter(bound.iter()))
                    .map_err(map_sql);
                match flipped {
                    Ok(n) if n == ids.len() => {}
                    Ok(n) => {
                        return Ok(Err(StrataError::Conflict(format!(
                            "episodize flipped {n} of {} messages; group retried later",
                            ids.len()
                        ))));
                    }
                    Err(err) => return Ok(Err(err)),
                }

                tx.commit()?;
                Ok(Ok(()))
            })
            .await
            .map_err(tr_err)?
    }

    async fn get_episode(&self, id: &str) -> Result<Option<EpisodeRecord>, StrataError> {
        let id = id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!("{EPISODE_COLS_SQL} WHERE id = ?1"),
                        params![id],
                        episode_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(tr_err)?;
        row.map(decode_episode).transpose()
    }

    async fn list_episodes_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<EpisodeRecord>, StrataError> {
        let cutoff = canonical_ts(cutoff);
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{EPISODE_COLS_SQL} WHERE created_at <= ?1 ORDER BY created_at ASC, id ASC"
                ))?;
                let rows = stmt.query_map(params![cutoff], episode_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(tr_err)?;
        rows.into_iter().map(decode_episode).collect()
    }

    async fn list_episodes(&self) -> Result<Vec<EpisodeRecord>, StrataError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare(&format!("{EPISODE_COLS_SQL} ORDER BY id ASC"))?;
                let rows = stmt.query_map([], episode_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(tr_err)?;
        rows.into_iter().map(decode_episode).collect()
    }

    async fn instancize_episode(&self, instance: &InstanceRecord) -> Result<(), StrataError> {
        let i = instance.clone();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let deleted = tx
                    .execute(
                        "DELETE FROM episodes WHERE id = ?1",
                        params![i.original_episode_id],
                    )
                    .map_err(map_sql);
                match deleted {
                    Ok(1) => {}
                    Ok(_) => {
                        return Ok(Err(StrataError::NotFound {
                            entity: "episode",
                            id: i.original_episode_id.clone(),
                        }));
                    }
                    Err(err) => return Ok(Err(err)),
                }

                let content: String = i
                    .messages
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                let insert = tx
                    .execute(
                        "INSERT INTO instances \
                         (id, user_id, source_kind, source_id, original_episode_id, messages, \
                          message_count, date_from, date_to, content, embedding, metadata, tags, \
                          importance, created_at, instancized_at, compression_candidate, \
                          compressed, compressed_blob) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
                                 ?15, ?16, ?17, ?18, ?19)",
                        params![
                            i.id,
                            i.user_id,
                            i.source_kind.to_string(),
                            i.source_id,
                            i.original_episode_id,
                            serde_json::to_string(&i.messages).unwrap_or_else(|_| "[]".into()),
                            i.message_count as i64,
                            canonical_ts(i.date_from),
                            canonical_ts(i.date_to),
                            content,
                            vec_to_blob(&i.embedding),
                            i.metadata.to_string(),
                            serde_json::to_string(&i.tags).unwrap_or_else(|_| "[]".into()),
                            i.importance,
                            canonical_ts(i.created_at),
                            canonical_ts(i.instancized_at),
                            i.compression_candidate,
                            i.compressed,
                            i.compressed_blob,
                        ],
                    )
                    .map_err(map_sql);
                if let Err(err) = insert {
                    return Ok(Err(err));
                }

                tx.commit()?;
                Ok(Ok(()))
            })
            .await
            .map_err(tr_err)?
    }

    async fn get_instance(&self, id: &str) -> Result<Option<InstanceRecord>, StrataError> {
        let id = id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!("{INSTANCE_COLS_SQL} WHERE id = ?1"),
                        params![id],
                        instance_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(tr_err)?;
        row.map(decode_instance).transpose()
    }

    async fn list_compression_due(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<InstanceRecord>, StrataError> {
        let cutoff = canonical_ts(cutoff);
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{INSTANCE_COLS_SQL} WHERE created_at <= ?1 AND compression_candidate = 0 \
                     ORDER BY created_at ASC, id ASC"
                ))?;
                let rows = stmt.query_map(params![cutoff], instance_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(tr_err)?;
        rows.into_iter().map(decode_instance).collect()
    }

    async fn mark_compression_candidate(&self, instance_id: &str) -> Result<(), StrataError> {
        let id = instance_id.to_string();
        let affected = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE instances SET compression_candidate = 1 WHERE id = ?1",
                    params![id],
                ))
            })
            .await
            .map_err(tr_err)?
            .map_err(map_sql)?;
        if affected == 0 {
            return Err(StrataError::NotFound {
                entity: "instance",
                id: instance_id.to_string(),
            });
        }
        Ok(())
    }

    async fn append_audit(&self, event: &AuditEvent) -> Result<(), StrataError> {
        let e = event.clone();
        self.conn
            .call(move |conn| {
                Ok(conn
                    .execute(
                        "INSERT INTO audit_log (id, action, entity_id, user_id, at, detail) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            e.id,
                            e.action.to_string(),
                            e.entity_id,
                            e.user_id,
                            canonical_ts(e.at),
                            e.detail.to_string(),
                        ],
                    )
                    .map(|_| ())
                    .map_err(map_sql))
            })
            .await
            .map_err(tr_err)?
    }

    async fn list_audit(
        &self,
        user: Option<&UserId>,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, StrataError> {
        let user = user.map(|u| u.as_str().to_string());
        let rows = self
            .conn
            .call(move |conn| {
                let mut out = Vec::new();
                match user {
                    Some(user_id) => {
                        let mut stmt = conn.prepare(
                            "SELECT id, action, entity_id, user_id, at, detail FROM audit_log \
                             WHERE user_id = ?1 ORDER BY at DESC, id ASC LIMIT ?2",
                        )?;
                        let rows = stmt.query_map(params![user_id, limit as i64], audit_row)?;
                        for row in rows {
                            out.push(row?);
                        }
                    }
                    None => {
                        let mut stmt = conn.prepare(
                            "SELECT id, action, entity_id, user_id, at, detail FROM audit_log \
                             ORDER BY at DESC, id ASC LIMIT ?1",
                        )?;
                        let rows = stmt.query_map(params![limit as i64], audit_row)?;
                        for row in rows {
                            out.push(row?);
                        }
                    }
                }
                Ok(out)
            })
            .await
            .map_err(tr_err)?;
        rows.into_iter().map(decode_audit).collect()
    }
}

const EPISODE_COLS_SQL: &str =
    "SELECT id, user_id, source_kind, source_id, messages, message_count, date_from, date_to, \
     embedding, metadata, tags, importance, created_at FROM episodes";

const INSTANCE_COLS_SQL: &str =
    "SELECT id, user_id, source_kind, source_id, original_episode_id, messages, message_count, \
     date_from, date_to, embedding, metadata, tags, importance, created_at, instancized_at, \
     compression_candidate, compressed, compressed_blob FROM instances";

type ConversationRow = (String, String, String, Option<String>, Option<String>, String);

fn conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_conversation(row: ConversationRow) -> Result<Conversation, StrataError> {
    let (id, user_id, kind, title, tenant_id, created_at) = row;
    Ok(Conversation {
        id,
        user_id,
        kind: enum_col::<SourceKind>(kind, "source kind")?,
        title,
        tenant_id,
        created_at: ts_col(created_at)?,
    })
}

type MessageRow = (String, String, String, String, String, bool, Option<String>);

fn message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn decode_message(row: MessageRow) -> Result<ChatMessage, StrataError> {
    let (id, conversation_id, role, content, created_at, episodized, episodized_at) = row;
    Ok(ChatMessage {
        id,
        conversation_id,
        role: enum_col::<Role>(role, "role")?,
        content,
        created_at: ts_col(created_at)?,
        episodized,
        episodized_at: episodized_at.map(ts_col).transpose()?,
    })
}

struct EpisodeRow {
    id: String,
    user_id: String,
    source_kind: String,
    source_id: String,
    messages: String,
    message_count: i64,
    date_from: String,
    date_to: String,
    embedding: Option<Vec<u8>>,
    metadata: String,
    tags: String,
    importance: f64,
    created_at: String,
}

fn episode_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EpisodeRow> {
    Ok(EpisodeRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        source_kind: row.get(2)?,
        source_id: row.get(3)?,
        messages: row.get(4)?,
        message_count: row.get(5)?,
        date_from: row.get(6)?,
        date_to: row.get(7)?,
        embedding: row.get(8)?,
        metadata: row.get(9)?,
        tags: row.get(10)?,
        importance: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn decode_episode(row: EpisodeRow) -> Result<EpisodeRecord, StrataError> {
    let messages: Vec<MessageSnapshot> = json_col(row.messages)?;
    Ok(EpisodeRecord {
        id: row.id,
        user_id: row.user_id,
        source_kind: enum_col::<SourceKind>(row.source_kind, "source kind")?,
        source_id: row.source_id,
        messages,
        message_count: row.message_count as usize,
        date_from: ts_col(row.date_from)?,
        date_to: ts_col(row.date_to)?,
        embedding: row.embedding.map(|b| blob_to_vec(&b)).unwrap_or_default(),
        metadata: json_col(row.metadata)?,
        tags: json_col(row.tags)?,
        importance: row.importance,
        created_at: ts_col(row.created_at)?,
    })
}

struct InstanceRow {
    id: String,
    user_id: String,
    source_kind: String,
    source_id: String,
    original_episode_id: String,
    messages: String,
    message_count: i64,
    date_from: String,
    date_to: String,
    embedding: Option<Vec<u8>>,
    metadata: String,
    tags: String,
    importance: f64,
    created_at: String,
    instancized_at: String,
    compression_candidate: bool,
    compressed: bool,
    compressed_blob: Option<Vec<u8>>,
}

fn instance_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InstanceRow> {
    Ok(InstanceRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        source_kind: row.get(2)?,
        source_id: row.get(3)?,
        original_episode_id: row.get(4)?,
        messages: row.get(5)?,
        message_count: row.get(6)?,
        date_from: row.get(7)?,
        date_to: row.get(8)?,
        embedding: row.get(9)?,
        metadata: row.get(10)?,
        tags: row.get(11)?,
        importance: row.get(12)?,
        created_at: row.get(13)?,
        instancized_at: row.get(14)?,
        compression_candidate: row.get(15)?,
        compressed: row.get(16)?,
        compressed_blob: row.get(17)?,
    })
}

fn decode_instance(row: InstanceRow) -> Result<InstanceRecord, StrataError> {
    let messages: Vec<MessageSnapshot> = json_col(row.messages)?;
    Ok(InstanceRecord {
        id: row.id,
        user_id: row.user_id,
        source_kind: enum_col::<SourceKind>(row.source_kind, "source kind")?,
        source_id: row.source_id,
        original_episode_id: row.original_episode_id,
        messages,
        message_count: row.message_count as usize,
        date_from: ts_col(row.date_from)?,
        date_to: ts_col(row.date_to)?,
        embedding: row.embedding.map(|b| blob_to_vec(&b)).unwrap_or_default(),
        metadata: json_col(row.metadata)?,
        tags: json_col(row.tags)?,
        importance: row.importance,
        created_at: ts_col(row.created_at)?,
        instancized_at: ts_col(row.instancized_at)?,
        compression_candidate: row.compression_candidate,
        compressed: row.compressed,
        compressed_blob: row.compressed_blob,
    })
}

type AuditRow = (String, String, String, String, String, String);

fn audit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_audit(row: AuditRow) -> Result<AuditEvent, StrataError> {
    let (id, action, entity_id, user_id, at, detail) = row;
    Ok(AuditEvent {
        id,
        action: enum_col::<AuditAction>(action, "audit action")?,
        entity_id,
        user_id,
        at: ts_col(at)?,
        detail: json_col(detail)?,
    })
}
