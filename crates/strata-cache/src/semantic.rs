// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic cache layer: persona, query-result, and input-fingerprint
//! namespaces, all per-user.
//!
//! Keyspace:
//! - `persona:<user>`: persona snapshot, TTL 1 h
//! - `query:<user>:<fingerprint>`: ranked result list + query embedding,
//!   TTL 30 min, LRU-capped per user
//! - `input:<user>:<fingerprint>`: classification/embedding memo, TTL 5 min
//!
//! A direct miss on a query key falls through to a semantic-match pass over
//! the user's stored query embeddings: best cosine at or above the
//! configured threshold counts as a hit and refreshes the TTL.
//!
//! Every method degrades to a miss/no-op on backend failure (logged once);
//! cache trouble must never surface to callers.

use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use strata_config::model::CacheConfig;
use strata_core::error::StrataError;
use strata_core::types::cosine_similarity;

use crate::traits::Cache;

static DEGRADED_ONCE: Once = Once::new();

/// How a cache lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheHitKind {
    Exact,
    Semantic,
}

/// Envelope stored under `query:<user>:<fingerprint>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueryEnvelope {
    embedding: Vec<f32>,
    payload: Value,
    access_count: u64,
    stored_at: DateTime<Utc>,
}

/// The semantic cache layer over any [`Cache`] backend.
pub struct SemanticCache {
    cache: Arc<dyn Cache>,
    config: CacheConfig,
}

impl SemanticCache {
    pub fn new(cache: Arc<dyn Cache>, config: CacheConfig) -> Self {
        Self { cache, config }
    }

    /// Stable fingerprint over the normalized query text plus the canonical
    /// JSON of the compiled filter.
    pub fn fingerprint(query: &str, filter_canonical: Option<&str>) -> String {
        let normalized = query.trim().to_lowercase();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut material = normalized.into_bytes();
        material.push(0);
        if let Some(filter) = filter_canonical {
            material.extend_from_slice(filter.as_bytes());
        }
        let hash = digest(&SHA256, &material);
        hash.as_ref()
            .iter()
            .take(8)
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    fn persona_key(user: &str) -> String {
        format!("persona:{user}")
    }

    fn query_key(user: &str, fingerprint: &str) -> String {
        format!("query:{user}:{fingerprint}")
    }

    fn query_prefix(user: &str) -> String {
        format!("query:{user}:")
    }

    fn input_key(user: &str, fingerprint: &str) -> String {
        format!("input:{user}:{fingerprint}")
    }

    fn degraded(&self, context: &str, error: &StrataError) {
        DEGRADED_ONCE.call_once(|| {
            warn!(%error, context, "cache degraded; continuing against the store");
        });
    }

    // --- Persona namespace ---

    pub async fn get_persona(&self, user: &str) -> Option<Value> {
        let key = Self::persona_key(user);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => {
                // Hits refresh the TTL.
                let _ = self
                    .cache
                    .touch(&key, Duration::from_secs(self.config.persona_ttl_s))
                    .await;
                serde_json::from_slice(&bytes).ok()
            }
            Ok(None) => None,
            Err(e) => {
                self.degraded("persona get", &e);
                None
            }
        }
    }

    pub async fn put_persona(&self, user: &str, snapshot: &Value) {
        let key = Self::persona_key(user);
        let Ok(bytes) = serde_json::to_vec(snapshot) else {
            return;
        };
        if let Err(e) = self
            .cache
            .set(&key, &bytes, Duration::from_secs(self.config.persona_ttl_s))
            .await
        {
            self.degraded("persona put", &e);
        }
    }

    // --- Query namespace ---

    /// Look up cached results: exact fingerprint first, then semantic match
    /// over the user's stored query embeddings when `embedding` is given.
    pub async fn get_query(
        &self,
        user: &str,
        fingerprint: &str,
        embedding: Option<&[f32]>,
    ) -> Option<(Value, CacheHitKind)> {
        let key = Self::query_key(user, fingerprint);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => {
                if let Ok(envelope) = serde_json::from_slice::<QueryEnvelope>(&bytes) {
                    self.record_hit(&key, envelope.clone()).await;
                    return Some((envelope.payload, CacheHitKind::Exact));
                }
                None
            }
            Ok(None) => match embedding {
                Some(embedding) => self.semantic_lookup(user, embedding).await,
                None => None,
            },
            Err(e) => {
                self.degraded("query get", &e);
                None
            }
        }
    }

    async fn semantic_lookup(
        &self,
        user: &str,
        embedding: &[f32],
    ) -> Option<(Value, CacheHitKind)> {
        let keys = match self.cache.scan_prefix(&Self::query_prefix(user)).await {
            Ok(keys) => keys,
            Err(e) => {
                self.degraded("query scan", &e);
                return None;
            }
        };

        // The per-user LRU cap bounds this scan at max_query_per_user.
        let mut best: Option<(String, QueryEnvelope, f32)> = None;
        for key in keys {
            let Ok(Some(bytes)) = self.cache.get(&key).await else {
                continue;
            };
            let Ok(envelope) = serde_json::from_slice::<QueryEnvelope>(&bytes) else {
                continue;
            };
            let similarity = cosine_similarity(embedding, &envelope.embedding);
            let better = match &best {
                Some((_, _, current)) => similarity > *current,
                None => true,
            };
            if better {
                best = Some((key, envelope, similarity));
            }
        }

        let (key, envelope, similarity) = best?;
        if f64::from(similarity) < self.config.semantic_match_threshold {
            return None;
        }
        debug!(user, similarity, "semantic cache hit");
        self.record_hit(&key, envelope.clone()).await;
        Some((envelope.payload, CacheHitKind::Semantic))
    }

    /// A hit bumps the access counter and refreshes the TTL.
    async fn record_hit(&self, key: &str, mut envelope: QueryEnvelope) {
        envelope.access_count += 1;
        if let Ok(bytes) = serde_json::to_vec(&envelope) {
            let _ = self
                .cache
                .set(key, &bytes, Duration::from_secs(self.config.query_ttl_s))
                .await;
        }
    }

    /// Store a query result, evicting past the per-user LRU cap: lowest
    /// access count goes first, ties broken by oldest.
    pub async fn put_query(
        &self,
        user: &str,
        fingerprint: &str,
        embedding: &[f32],
        payload: Value,
    ) {
        let envelope = QueryEnvelope {
            embedding: embedding.to_vec(),
            payload,
            access_count: 0,
            stored_at: Utc::now(),
        };
        let Ok(bytes) = serde_json::to_vec(&envelope) else {
            return;
        };
        let key = Self::query_key(user, fingerprint);
        if let Err(e) = self
            .cache
            .set(&key, &bytes, Duration::from_secs(self.config.query_ttl_s))
            .await
        {
            self.degraded("query put", &e);
            return;
        }
        self.enforce_query_cap(user, &key).await;
    }

    async fn enforce_query_cap(&self, user: &str, just_written: &str) {
        let keys = match self.cache.scan_prefix(&Self::query_prefix(user)).await {
            Ok(keys) => keys,
            Err(e) => {
                self.degraded("query cap scan", &e);
                return;
            }
        };
        if keys.len() <= self.config.max_query_per_user {
            return;
        }

        let mut candidates: Vec<(String, u64, DateTime<Utc>)> = Vec::new();
        for key in keys {
            if key == just_written {
                continue;
            }
            let Ok(Some(bytes)) = self.cache.get(&key).await else {
                continue;
            };
            let Ok(envelope) = serde_json::from_slice::<QueryEnvelope>(&bytes) else {
                // Unreadable entries are the first to go.
                let _ = self.cache.delete(&key).await;
                continue;
            };
            candidates.push((key, envelope.access_count, envelope.stored_at));
        }

        let excess = (candidates.len() + 1).saturating_sub(self.config.max_query_per_user);
        if excess == 0 {
            return;
        }
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));
        for (key, _, _) in candidates.into_iter().take(excess) {
            let _ = self.cache.delete(&key).await;
        }
    }

    // --- Input-fingerprint namespace ---

    pub async fn get_input(&self, user: &str, fingerprint: &str) -> Option<Value> {
        match self.cache.get(&Self::input_key(user, fingerprint)).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).ok(),
            Ok(None) => None,
            Err(e) => {
                self.degraded("input get", &e);
                None
            }
        }
    }

    pub async fn put_input(&self, user: &str, fingerprint: &str, payload: &Value) {
        let Ok(bytes) = serde_json::to_vec(payload) else {
            return;
        };
        if let Err(e) = self
            .cache
            .set(
                &Self::input_key(user, fingerprint),
                &bytes,
                Duration::from_secs(self.config.input_ttl_s),
            )
            .await
        {
            self.degraded("input put", &e);
        }
    }

    // --- Invalidation ---

    /// Best-effort invalidation after a write to the persona or any of the
    /// user's knowledge: drops `persona:<user>` (when `persona_touched`)
    /// and every `query:<user>:*` entry. A ghost read remains possible but
    /// is bounded by TTL.
    pub async fn invalidate_user(&self, user: &str, persona_touched: bool) -> usize {
        let mut removed = 0;
        if persona_touched {
            match self.cache.delete(&Self::persona_key(user)).await {
                Ok(()) => removed += 1,
                Err(e) => self.degraded("persona invalidation", &e),
            }
        }
        match self.cache.delete_prefix(&Self::query_prefix(user)).await {
            Ok(n) => removed += n,
            Err(e) => self.degraded("query invalidation", &e),
        }
        debug!(user, removed, "cache invalidated");
        removed
    }
}
