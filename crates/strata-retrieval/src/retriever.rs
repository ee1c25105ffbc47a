// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retriever: vector + lexical search fused into one ranking.
//!
//! 1. Embed the query
//! 2. Compile the filter once
//! 3. Run `ann` and `lex` in parallel, predicate pushed down, each fetching
//!    `max(k, k_fetch_min)` candidates
//! 4. Normalize per-list scores into [0, 1]
//! 5. Fuse with RRF (C = 60, weights from config); a weighted-score variant
//!    is exposed for callers that want score-proportional fusion
//! 6. Optional freshness decay and clamped importance boost
//! 7. Deterministic ordering: fused desc, importance desc, recency desc,
//!    id asc
//!
//! Two retrievals with identical inputs and store state return identical
//! orderings.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use strata_config::model::RetrievalConfig;
use strata_core::deadline::Deadline;
use strata_core::error::StrataError;
use strata_core::types::{clamp_unit, UserId};
use strata_embedding::EmbeddingService;
use strata_filter::{compile, CompiledFilter, FieldTypeRegistry, FilterExpr};
use strata_store::{ScanOrder, SearchTable, StoredDoc, VectorStore};

use crate::rrf::{rrf_fuse, weighted_fuse};

/// How the two subqueries are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionKind {
    #[default]
    ReciprocalRank,
    WeightedScore,
}

/// Degradation mode under backpressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    #[default]
    Hybrid,
    /// Vector subquery only; lexical ranking skipped.
    VectorOnly,
}

/// A retrieval request against one search table.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub user: UserId,
    pub query: String,
    pub filter: Option<FilterExpr>,
    pub k: usize,
    pub table: SearchTable,
    pub fusion: FusionKind,
    pub mode: RetrievalMode,
    /// Multiply fused scores by clamped importance.
    pub importance_boost: bool,
    /// Relaxation order: field names whose leaves are dropped, one per
    /// round, when fewer than `k_min` results pass the filter. Empty
    /// disables relaxation.
    pub relaxation: Vec<String>,
    pub k_min: usize,
}

impl RetrievalRequest {
    pub fn new(user: impl Into<UserId>, query: impl Into<String>, k: usize) -> Self {
        Self {
            user: user.into(),
            query: query.into(),
            filter: None,
            k,
            table: SearchTable::Knowledge,
            fusion: FusionKind::ReciprocalRank,
            mode: RetrievalMode::Hybrid,
            importance_boost: false,
            relaxation: Vec::new(),
            k_min: 1,
        }
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn on_table(mut self, table: SearchTable) -> Self {
        self.table = table;
        self
    }
}

/// One fused hit.
#[derive(Debug, Clone)]
pub struct RetrievedHit {
    pub doc: StoredDoc,
    /// Cosine similarity in [0, 1]; 0 when the vector subquery missed it.
    pub vector_score: f32,
    /// Normalized lexical relevance in [0, 1]; 0 when lexically unmatched.
    pub lex_score: f64,
    pub fused_score: f64,
    /// Why the hit ranked where it did ("vector", "lexical", "freshness",
    /// "importance", "relaxed:<field>", "filter-scan").
    pub reasons: Vec<String>,
}

/// Per-retrieval metrics, surfaced alongside the hits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub vector_candidates: usize,
    pub lex_candidates: usize,
    pub relaxed_fields: Vec<String>,
    pub pure_scan: bool,
}

/// The result of one retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub hits: Vec<RetrievedHit>,
    pub metrics: RetrievalMetrics,
}

/// Hybrid retriever over one store and one embedding space.
pub struct HybridRetriever {
    store: Arc<dyn VectorStore>,
    embeddings: EmbeddingService,
    registry: FieldTypeRegistry,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: EmbeddingService,
        registry: FieldTypeRegistry,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            registry,
            config,
        }
    }

    pub fn embeddings(&self) -> &EmbeddingService {
        &self.embeddings
    }

    /// Run a retrieval. Deterministic for a fixed store snapshot.
    pub async fn retrieve(
        &self,
        request: &RetrievalRequest,
        deadline: &Deadline,
    ) -> Result<RetrievalOutcome, StrataError> {
        if request.k == 0 {
            return Ok(RetrievalOutcome {
                hits: Vec::new(),
                metrics: RetrievalMetrics::default(),
            });
        }
        deadline.checkpoint("retrieval")?;

        // Empty query with a filter: pure filter-scan, no subqueries.
        if request.query.trim().is_empty() {
            return self.filter_scan(request).await;
        }

        let query_embedding = self.embeddings.embed_text(&request.query).await?;
        let now = Utc::now();

        let mut filter = match &request.filter {
            Some(expr) => Some(compile(expr, &self.registry, now)?),
            None => None,
        };
        let mut relaxed_fields = Vec::new();
        let mut relaxation = request.relaxation.iter();
        let mut remaining_expr = request.filter.clone();

        loop {
            deadline.checkpoint("retrieval subqueries")?;
            let (hits, metrics) = self
                .subqueries_with_retry(request, &query_embedding, filter.as_ref(), now)
                .await?;

            let enough = hits.len() >= request.k_min.min(request.k);
            if enough || filter.is_none() {
                let mut metrics = metrics;
                metrics.relaxed_fields = relaxed_fields.clone();
                let mut hits = hits;
                for field in &relaxed_fields {
                    for hit in &mut hits {
                        hit.reasons.push(format!("relaxed:{field}"));
                    }
                }
                return Ok(RetrievalOutcome { hits, metrics });
            }

            // Relax along the caller-provided order, tightest first.
            let Some(field) = relaxation.next() else {
                let mut metrics = metrics;
                metrics.relaxed_fields = relaxed_fields;
                return Ok(RetrievalOutcome { hits, metrics });
            };
            remaining_expr = remaining_expr.as_ref().and_then(|e| e.without_field(field));
            relaxed_fields.push(field.clone());
            debug!(field, "relaxing retrieval filter");
            filter = match &remaining_expr {
                Some(expr) => Some(compile(expr, &self.registry, now)?),
                None => None,
            };
        }
    }

    /// Store reads retry transiently-failed subqueries up to three times
    /// with jittered backoff before surfacing `Transient` to the caller.
    async fn subqueries_with_retry(
        &self,
        request: &RetrievalRequest,
        query_embedding: &[f32],
        filter: Option<&CompiledFilter>,
        now: DateTime<Utc>,
    ) -> Result<(Vec<RetrievedHit>, RetrievalMetrics), StrataError> {
        const READ_ATTEMPTS: u32 = 3;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .run_subqueries(request, query_embedding, filter, now)
                .await
            {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < READ_ATTEMPTS => {
                    let jitter = rand::Rng::gen_range(&mut rand::thread_rng(), 0..100u64);
                    let backoff =
                        std::time::Duration::from_millis(50 * 2_u64.pow(attempt - 1) + jitter);
                    debug!(attempt, error = %e, "transient store read; retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_subqueries(
        &self,
        request: &RetrievalRequest,
        query_embedding: &[f32],
        filter: Option<&CompiledFilter>,
        now: DateTime<Utc>,
    ) -> Result<(Vec<RetrievedHit>, RetrievalMetrics), StrataError> {
        let k_fetch = request.k.max(self.config.k_fetch_min);

        let ann_fut = self.store.ann(
            request.table,
            Some(&request.user),
            query_embedding,
            k_fetch,
            filter,
        );

        let (ann_hits, lex_hits) = match request.mode {
            RetrievalMode::Hybrid => {
                let lex_fut = self.store.lex(
                    request.table,
                    Some(&request.user),
                    &request.query,
                    k_fetch,
                    filter,
                );
                tokio::try_join!(ann_fut, lex_fut)?
            }
            RetrievalMode::VectorOnly => (ann_fut.await?, Vec::new()),
        };

        // Zero-similarity candidates carry no signal; keeping them would let
        // rank-based fusion resurrect unrelated documents.
        let ann_hits: Vec<(StoredDoc, f32)> =
            ann_hits.into_iter().filter(|(_, sim)| *sim > 0.0).collect();

        let metrics = RetrievalMetrics {
            vector_candidates: ann_hits.len(),
            lex_candidates: lex_hits.len(),
            relaxed_fields: Vec::new(),
            pure_scan: false,
        };

        // Normalize lexical scores by the query-specific maximum.
        let lex_max = lex_hits
            .iter()
            .map(|(_, s)| *s)
            .fold(f64::NEG_INFINITY, f64::max);
        let lex_norm: HashMap<String, f64> = lex_hits
            .iter()
            .map(|(doc, score)| {
                let normalized = if lex_max > 0.0 { score / lex_max } else { 0.0 };
                (doc.id.clone(), normalized)
            })
            .collect();
        let vec_scores: HashMap<String, f64> = ann_hits
            .iter()
            .map(|(doc, sim)| (doc.id.clone(), f64::from(*sim)))
            .collect();

        let fused = match request.fusion {
            FusionKind::ReciprocalRank => {
                let vector_ids: Vec<String> =
                    ann_hits.iter().map(|(d, _)| d.id.clone()).collect();
                let lexical_ids: Vec<String> =
                    lex_hits.iter().map(|(d, _)| d.id.clone()).collect();
                rrf_fuse(
                    &vector_ids,
                    &lexical_ids,
                    self.config.vector_weight,
                    self.config.lexical_weight,
                )
            }
            FusionKind::WeightedScore => weighted_fuse(
                &vec_scores,
                &lex_norm,
                self.config.vector_weight,
                self.config.lexical_weight,
            ),
        };

        // Collect unique docs from both lists.
        let mut docs: HashMap<String, StoredDoc> = HashMap::new();
        for (doc, _) in &ann_hits {
            docs.entry(doc.id.clone()).or_insert_with(|| doc.clone());
        }
        for (doc, _) in &lex_hits {
            docs.entry(doc.id.clone()).or_insert_with(|| doc.clone());
        }

        let mut hits: Vec<RetrievedHit> = docs
            .into_values()
            .map(|doc| {
                let vector_score = vec_scores.get(&doc.id).copied().unwrap_or(0.0) as f32;
                let lex_score = lex_norm.get(&doc.id).copied().unwrap_or(0.0);
                let mut fused_score = fused.get(&doc.id).copied().unwrap_or(0.0);
                let mut reasons = Vec::new();
                if vector_score > 0.0 {
                    reasons.push("vector".to_string());
                }
                if lex_score > 0.0 {
                    reasons.push("lexical".to_string());
                }

                if let Some(half_life) = self.config.freshness_half_life_days {
                    let age_days =
                        (now - doc.created_at).num_seconds().max(0) as f64 / 86_400.0;
                    let lambda = std::f64::consts::LN_2 / half_life;
                    fused_score *= (-lambda * age_days).exp();
                    reasons.push("freshness".to_string());
                }
                if request.importance_boost {
                    fused_score *= clamp_unit(doc.importance);
                    reasons.push("importance".to_string());
                }

                RetrievedHit {
                    doc,
                    vector_score,
                    lex_score,
                    fused_score,
                    reasons,
                }
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(request.k);
        Ok((hits, metrics))
    }

    /// Filter-only path for empty queries: scan by importance, no vector or
    /// lexical subqueries.
    async fn filter_scan(
        &self,
        request: &RetrievalRequest,
    ) -> Result<RetrievalOutcome, StrataError> {
        let filter = match &request.filter {
            Some(expr) => Some(compile(expr, &self.registry, Utc::now())?),
            None => None,
        };
        let docs = self
            .store
            .scan(
                request.table,
                Some(&request.user),
                filter.as_ref(),
                request.k,
                ScanOrder::ImportanceDesc,
            )
            .await?;
        let hits = docs
            .into_iter()
            .map(|doc| RetrievedHit {
                doc,
                vector_score: 0.0,
                lex_score: 0.0,
                fused_score: 0.0,
                reasons: vec!["filter-scan".to_string()],
            })
            .collect();
        Ok(RetrievalOutcome {
            hits,
            metrics: RetrievalMetrics {
                pure_scan: true,
                ..RetrievalMetrics::default()
            },
        })
    }
}

/// Deterministic ordering: fused desc, importance desc, recency desc, id asc.
fn sort_hits(hits: &mut [RetrievedHit]) {
    hits.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.doc
                    .importance
                    .partial_cmp(&a.doc.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| b.doc.created_at.cmp(&a.doc.created_at))
            .then_with(|| a.doc.id.cmp(&b.doc.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use strata_core::traits::adapter::BackendAdapter;
    use strata_core::traits::Embedder;
    use strata_core::types::{
        BackendKind, EmbeddingInput, EmbeddingOutput, HealthStatus,
    };
    use strata_store::InMemoryStore;

    /// Keyword-axis embedder: maps texts into a 3-dim space by topic so
    /// vector similarity is predictable in tests.
    struct TopicEmbedder;

    fn topic_vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v = [0.0f32; 3];
        for word in lower.split_whitespace() {
            match word {
                "vector" | "search" | "hnsw" | "ann" => v[0] += 1.0,
                "postgresql" | "indexing" | "database" => v[1] += 1.0,
                "docker" | "networking" | "container" => v[2] += 1.0,
                _ => {}
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v.to_vec()
    }

    #[async_trait]
    impl BackendAdapter for TopicEmbedder {
        fn name(&self) -> &str {
            "topic-test"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }
        fn kind(&self) -> BackendKind {
            BackendKind::Embedding
        }
        async fn health_check(&self) -> Result<HealthStatus, StrataError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), StrataError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Embedder for TopicEmbedder {
        fn dimensions(&self) -> usize {
            3
        }
        async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, StrataError> {
            Ok(EmbeddingOutput {
                embeddings: input.texts.iter().map(|t| topic_vector(t)).collect(),
                dimensions: 3,
            })
        }
    }

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()
    }

    fn doc(id: &str, title: &str, content: &str, minute: u32) -> StoredDoc {
        StoredDoc {
            id: id.into(),
            user_id: "u1".into(),
            category: strata_store::Category::Knowledge,
            title: Some(title.into()),
            content: content.into(),
            tags: vec![],
            metadata: json!({}),
            importance: 0.5,
            confidence: 1.0,
            embedding: topic_vector(&format!("{title} {content}")),
            source_id: None,
            created_at: t(minute),
            updated_at: t(minute),
            last_accessed_at: None,
        }
    }

    async fn retriever_with_corpus() -> HybridRetriever {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_knowledge(&doc(
                "pg",
                "PostgreSQL indexing",
                "How PostgreSQL indexing works for large tables",
                1,
            ))
            .await
            .unwrap();
        store
            .put_knowledge(&doc(
                "hnsw",
                "HNSW vector search",
                "Approximate vector search with HNSW graphs in PostgreSQL",
                2,
            ))
            .await
            .unwrap();
        store
            .put_knowledge(&doc(
                "docker",
                "Docker networking",
                "Container networking bridges and overlays",
                3,
            ))
            .await
            .unwrap();

        HybridRetriever::new(
            store,
            EmbeddingService::with_embedder(Arc::new(TopicEmbedder)),
            FieldTypeRegistry::with_engine_schema(),
            RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn hybrid_ranking_places_double_hit_first() {
        let retriever = retriever_with_corpus().await;
        let request = RetrievalRequest::new("u1", "vector search over PostgreSQL", 10);
        let outcome = retriever.retrieve(&request, &Deadline::none()).await.unwrap();

        let ids: Vec<&str> = outcome.hits.iter().map(|h| h.doc.id.as_str()).collect();
        assert_eq!(ids[0], "hnsw", "vector+lexical double hit ranks first");
        assert!(ids.contains(&"pg"), "lexical-only hit survives");
        assert!(!ids.contains(&"docker"), "unrelated doc is absent");

        let top = &outcome.hits[0];
        assert!(top.vector_score > 0.0);
        assert!(top.lex_score > 0.0);
        assert!(top.reasons.contains(&"vector".to_string()));
        assert!(top.reasons.contains(&"lexical".to_string()));
    }

    #[tokio::test]
    async fn retrieval_is_deterministic() {
        let retriever = retriever_with_corpus().await;
        let request = RetrievalRequest::new("u1", "vector search over PostgreSQL", 10);
        let first = retriever.retrieve(&request, &Deadline::none()).await.unwrap();
        let second = retriever.retrieve(&request, &Deadline::none()).await.unwrap();
        let first_ids: Vec<String> = first.hits.iter().map(|h| h.doc.id.clone()).collect();
        let second_ids: Vec<String> = second.hits.iter().map(|h| h.doc.id.clone()).collect();
        assert_eq!(first_ids, second_ids);
        for (a, b) in first.hits.iter().zip(second.hits.iter()) {
            assert_eq!(a.fused_score, b.fused_score);
        }
    }

    #[tokio::test]
    async fn k_zero_makes_no_store_calls() {
        let retriever = retriever_with_corpus().await;
        let request = RetrievalRequest::new("u1", "anything", 0);
        let outcome = retriever.retrieve(&request, &Deadline::none()).await.unwrap();
        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.metrics.vector_candidates, 0);
    }

    #[tokio::test]
    async fn empty_query_is_a_pure_filter_scan() {
        let retriever = retriever_with_corpus().await;
        let request = RetrievalRequest::new("u1", "   ", 10)
            .with_filter(FilterExpr::contains("title", "Docker"));
        let outcome = retriever.retrieve(&request, &Deadline::none()).await.unwrap();
        assert!(outcome.metrics.pure_scan);
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].doc.id, "docker");
        assert_eq!(outcome.hits[0].reasons, vec!["filter-scan"]);
    }

    #[tokio::test]
    async fn filter_pushdown_limits_candidates() {
        let retriever = retriever_with_corpus().await;
        let request = RetrievalRequest::new("u1", "vector search", 10)
            .with_filter(FilterExpr::contains("title", "HNSW"));
        let outcome = retriever.retrieve(&request, &Deadline::none()).await.unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].doc.id, "hnsw");
    }

    #[tokio::test]
    async fn relaxation_drops_fields_in_caller_order() {
        let retriever = retriever_with_corpus().await;
        let mut request = RetrievalRequest::new("u1", "vector search", 10).with_filter(
            FilterExpr::and(vec![
                FilterExpr::contains("title", "HNSW"),
                FilterExpr::recent("created_at", 0),
            ]),
        );
        request.relaxation = vec!["created_at".to_string()];
        request.k_min = 1;

        let outcome = retriever.retrieve(&request, &Deadline::none()).await.unwrap();
        assert_eq!(outcome.metrics.relaxed_fields, vec!["created_at"]);
        assert_eq!(outcome.hits.len(), 1);
        assert!(outcome.hits[0]
            .reasons
            .contains(&"relaxed:created_at".to_string()));
    }

    #[tokio::test]
    async fn relaxation_is_off_by_default() {
        let retriever = retriever_with_corpus().await;
        let request = RetrievalRequest::new("u1", "vector search", 10)
            .with_filter(FilterExpr::recent("created_at", 0));
        let outcome = retriever.retrieve(&request, &Deadline::none()).await.unwrap();
        assert!(outcome.hits.is_empty());
        assert!(outcome.metrics.relaxed_fields.is_empty());
    }

    #[tokio::test]
    async fn vector_only_mode_skips_lexical() {
        let retriever = retriever_with_corpus().await;
        let mut request = RetrievalRequest::new("u1", "vector search over PostgreSQL", 10);
        request.mode = RetrievalMode::VectorOnly;
        let outcome = retriever.retrieve(&request, &Deadline::none()).await.unwrap();
        assert_eq!(outcome.metrics.lex_candidates, 0);
        assert!(outcome.hits.iter().all(|h| h.lex_score == 0.0));
        assert!(!outcome.hits.is_empty());
    }

    #[tokio::test]
    async fn expired_deadline_cancels() {
        let retriever = retriever_with_corpus().await;
        let request = RetrievalRequest::new("u1", "vector search", 10);
        let deadline = Deadline::after(std::time::Duration::ZERO);
        assert!(matches!(
            retriever.retrieve(&request, &deadline).await,
            Err(StrataError::Cancelled(_))
        ));
    }

    #[tokio::test]
    async fn weighted_score_variant_ranks_by_normalized_scores() {
        let retriever = retriever_with_corpus().await;
        let mut request = RetrievalRequest::new("u1", "vector search over PostgreSQL", 10);
        request.fusion = FusionKind::WeightedScore;
        let outcome = retriever.retrieve(&request, &Deadline::none()).await.unwrap();
        assert_eq!(outcome.hits[0].doc.id, "hnsw");
        // Weighted fusion keeps scores within [0, 1].
        assert!(outcome.hits.iter().all(|h| h.fused_score <= 1.0));
    }
}
