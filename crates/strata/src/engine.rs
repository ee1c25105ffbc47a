// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory facade: one entry point over stores, retrievers, cache,
//! optimizer, and the episodic pipeline.
//!
//! Construction goes through [`EngineBuilder`], the single ownership root:
//! configuration is an immutable value, backends and capabilities are
//! injected, and nothing is global. Every public operation accepts a
//! [`Deadline`] that child operations inherit.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use strata_cache::{Cache, CacheHitKind, InMemoryCache, SemanticCache};
use strata_config::{validate_config, StrataConfig};
use strata_core::deadline::Deadline;
use strata_core::error::StrataError;
use strata_core::traits::{Classifier, Embedder};
use strata_core::types::{Classification, MemoryLayer, UserId};
use strata_embedding::EmbeddingService;
use strata_episodic::{EpisodizationJob, InstancizationJob, JobScheduler};
use strata_filter::{FieldTypeRegistry, FilterExpr, FilterValue};
use strata_optimizer::{
    Candidate, OptimizedContext, Optimizer, OptimizerParams, OptimizerProfile,
};
use strata_retrieval::{
    HybridRetriever, RetrievalMode, RetrievalRequest, RetrievedHit,
};
use strata_store::{
    AuditAction, AuditEvent, Category, ChatMessage, InMemoryStore, PersonaRecord, Role,
    SearchTable, StoredDoc, VectorStore,
};

use crate::recording;
use crate::rules;
use crate::types::{
    Context, ContextMessage, RetrievalResult, RetrievedEntry, StoreOutcome, WrittenRecord,
};

/// Optional caller-provided hints for an ingest.
#[derive(Debug, Clone, Default)]
pub struct IngestHints {
    /// Skip classification and route to this layer.
    pub layer: Option<MemoryLayer>,
    pub tags: Vec<String>,
    pub metadata: Option<Value>,
    pub importance: Option<f64>,
}

/// Construction root for [`MemoryEngine`].
pub struct EngineBuilder {
    config: StrataConfig,
    store: Option<Arc<dyn VectorStore>>,
    cache: Option<Arc<dyn Cache>>,
    classifier: Option<Arc<dyn Classifier>>,
    semantic_embedder: Option<Arc<dyn Embedder>>,
    episodic_embedder: Option<Arc<dyn Embedder>>,
}

impl EngineBuilder {
    pub fn new(config: StrataConfig) -> Self {
        Self {
            config,
            store: None,
            cache: None,
            classifier: None,
            semantic_embedder: None,
            episodic_embedder: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_semantic_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.semantic_embedder = Some(embedder);
        self
    }

    pub fn with_episodic_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.episodic_embedder = Some(embedder);
        self
    }

    pub fn build(self) -> Result<MemoryEngine, StrataError> {
        if let Err(errors) = validate_config(&self.config) {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(StrataError::Validation(joined));
        }

        let store: Arc<dyn VectorStore> =
            self.store.unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let cache: Arc<dyn Cache> =
            self.cache.unwrap_or_else(|| Arc::new(InMemoryCache::new()));

        let semantic_embeddings = match self.semantic_embedder {
            Some(embedder) => EmbeddingService::with_embedder(embedder),
            None => EmbeddingService::from_config(
                &self.config.embedding,
                self.config.embedding.dim_semantic,
            )?,
        };
        let episodic_embeddings = match self.episodic_embedder {
            Some(embedder) => EmbeddingService::with_embedder(embedder),
            None => EmbeddingService::from_config(
                &self.config.embedding,
                self.config.embedding.dim_episodic,
            )?,
        };

        let registry = FieldTypeRegistry::with_engine_schema();
        let semantic_retriever = HybridRetriever::new(
            store.clone(),
            semantic_embeddings.clone(),
            registry.clone(),
            self.config.retrieval.clone(),
        );
        let episodic_retriever = HybridRetriever::new(
            store.clone(),
            episodic_embeddings.clone(),
            registry.clone(),
            self.config.retrieval.clone(),
        );

        let optimizer = Optimizer::new(OptimizerParams::from_config(&self.config.optimizer)?);

        let scheduler = Arc::new(JobScheduler::new(
            Arc::new(EpisodizationJob::new(
                store.clone(),
                episodic_embeddings,
                self.config.episodic.clone(),
            )),
            Arc::new(InstancizationJob::new(
                store.clone(),
                self.config.episodic.clone(),
            )),
            self.config.episodic.clone(),
        ));

        Ok(MemoryEngine {
            semantic_cache: SemanticCache::new(cache, self.config.cache.clone()),
            store,
            classifier: self.classifier,
            semantic_retriever,
            episodic_retriever,
            optimizer,
            scheduler,
            config: self.config,
        })
    }
}

/// The unified memory API consumed by external collaborators.
pub struct MemoryEngine {
    config: StrataConfig,
    store: Arc<dyn VectorStore>,
    semantic_cache: SemanticCache,
    classifier: Option<Arc<dyn Classifier>>,
    semantic_retriever: HybridRetriever,
    episodic_retriever: HybridRetriever,
    optimizer: Optimizer,
    scheduler: Arc<JobScheduler>,
}

/// Serialized shape of a cached retrieval result.
#[derive(Serialize, Deserialize)]
struct CachedRetrieval {
    entries: Vec<RetrievedEntry>,
    stats: strata_optimizer::OptimizerStats,
}

impl MemoryEngine {
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    /// Spawn the episodic background loops. They stop when `shutdown` is
    /// cancelled.
    pub fn start_background_jobs(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        self.scheduler.clone().spawn(shutdown)
    }

    // --- Ingest ---

    /// Classify `text` and persist it into the matching memory layer.
    /// Cache invalidation happens after the write commits, before this
    /// returns.
    pub async fn ingest_memory(
        &self,
        user: &UserId,
        text: &str,
        hints: Option<IngestHints>,
        deadline: &Deadline,
    ) -> Result<StoreOutcome, StrataError> {
        deadline.checkpoint("ingest")?;
        if text.trim().is_empty() {
            return Err(StrataError::Validation(
                "cannot ingest empty text".into(),
            ));
        }
        let hints = hints.unwrap_or_default();
        let classification = self.classify(user, text, hints.layer).await?;
        let now = Utc::now();

        let written = match classification.layer {
            MemoryLayer::Persona => {
                let record = self.write_persona(user, text, now).await?;
                vec![WrittenRecord {
                    layer: "persona".into(),
                    id: record,
                }]
            }
            MemoryLayer::Knowledge | MemoryLayer::Skill | MemoryLayer::Process => {
                let id = self
                    .write_knowledge(user, text, &classification, &hints, now)
                    .await?;
                vec![WrittenRecord {
                    layer: classification.layer.to_string(),
                    id,
                }]
            }
            MemoryLayer::Episodic => {
                let id = self.write_episodic_event(user, text, now).await?;
                vec![WrittenRecord {
                    layer: "episodic_event".into(),
                    id,
                }]
            }
        };

        // Invalidation after successful commit, before returning. Episodic
        // events live outside the query cache until episodized; TTL bounds
        // any staleness there.
        let invalidated = match classification.layer {
            MemoryLayer::Episodic => 0,
            layer => {
                let persona_touched = layer == MemoryLayer::Persona;
                let removed = self
                    .semantic_cache
                    .invalidate_user(user.as_str(), persona_touched)
                    .await;
                if removed > 0 {
                    self.store
                        .append_audit(&AuditEvent::new(
                            AuditAction::Invalidated,
                            user.as_str(),
                            user.as_str(),
                            now,
                            json!({ "entries": removed }),
                        ))
                        .await?;
                }
                recording::record_invalidation(removed);
                removed
            }
        };

        recording::record_ingest(&classification.layer.to_string());
        info!(
            user_id = %user,
            layer = %classification.layer,
            invalidated,
            "memory ingested"
        );

        Ok(StoreOutcome {
            written,
            classification,
            invalidated,
        })
    }

    async fn classify(
        &self,
        user: &UserId,
        text: &str,
        layer_hint: Option<MemoryLayer>,
    ) -> Result<Classification, StrataError> {
        if let Some(layer) = layer_hint {
            return Ok(Classification {
                layer,
                category: layer.to_string(),
                confidence: 1.0,
            });
        }

        // Repeated identical inputs within the memo window skip the
        // capability call.
        let fingerprint = SemanticCache::fingerprint(text, None);
        if let Some(memo) = self
            .semantic_cache
            .get_input(user.as_str(), &fingerprint)
            .await
        {
            if let Ok(cached) = serde_json::from_value::<Classification>(memo) {
                return Ok(cached);
            }
        }

        let classification = match &self.classifier {
            Some(classifier) => classifier.classify(text, None).await?,
            None => rules::classify(text),
        };

        if let Ok(memo) = serde_json::to_value(&classification) {
            self.semantic_cache
                .put_input(user.as_str(), &fingerprint, &memo)
                .await;
        }
        Ok(classification)
    }

    async fn write_persona(
        &self,
        user: &UserId,
        text: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<String, StrataError> {
        let mut persona = self
            .store
            .get_persona(user)
            .await?
            .unwrap_or_else(|| PersonaRecord::new(user.as_str(), now));

        let mut update = PersonaRecord::new(user.as_str(), now);
        update.raw_content = text.to_string();
        persona.merge_from(&update);
        persona.embedding = self
            .semantic_retriever
            .embeddings()
            .embed_text(&persona.embedding_text())
            .await?;

        self.store.upsert_persona(&persona).await?;
        Ok(user.as_str().to_string())
    }

    async fn write_knowledge(
        &self,
        user: &UserId,
        text: &str,
        classification: &Classification,
        hints: &IngestHints,
        now: chrono::DateTime<Utc>,
    ) -> Result<String, StrataError> {
        let category = match classification.layer {
            MemoryLayer::Skill => Category::Skill,
            MemoryLayer::Process => Category::Process,
            _ => Category::Knowledge,
        };
        let embedding = self
            .semantic_retriever
            .embeddings()
            .embed_text(text)
            .await?;
        let doc = StoredDoc {
            id: Uuid::new_v4().to_string(),
            user_id: user.as_str().to_string(),
            category,
            title: None,
            content: text.to_string(),
            tags: hints.tags.clone(),
            metadata: hints.metadata.clone().unwrap_or_else(|| json!({})),
            importance: hints.importance.unwrap_or(0.5).clamp(0.0, 1.0),
            confidence: classification.confidence.clamp(0.0, 1.0),
            embedding,
            source_id: None,
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
        };
        self.store.put_knowledge(&doc).await?;
        Ok(doc.id)
    }

    async fn write_episodic_event(
        &self,
        user: &UserId,
        text: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<String, StrataError> {
        let conversation = self.store.ensure_super_chat(user).await?;
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.id,
            role: Role::User,
            content: text.to_string(),
            created_at: now,
            episodized: false,
            episodized_at: None,
        };
        self.store.append_message(&message).await?;
        Ok(message.id)
    }

    // --- Retrieval ---

    /// Hybrid search plus context optimization, consulting the semantic
    /// cache first and writing the result back on a miss.
    pub async fn retrieve(
        &self,
        user: &UserId,
        query: &str,
        filter: Option<FilterExpr>,
        k: usize,
        profile: Option<OptimizerProfile>,
        deadline: &Deadline,
    ) -> Result<RetrievalResult, StrataError> {
        let started = Instant::now();
        if k == 0 {
            return Ok(RetrievalResult::empty());
        }
        deadline.checkpoint("retrieve")?;

        // The fingerprint hashes the raw filter tree, so temporal sugar
        // (`recent(7 days)`) maps to a stable key rather than a moving
        // cutoff timestamp.
        let filter_canonical = filter.as_ref().map(FilterExpr::canonical_json);
        let fingerprint = SemanticCache::fingerprint(query, filter_canonical.as_deref());

        // 1. Exact cache hit.
        if let Some((payload, kind)) = self
            .semantic_cache
            .get_query(user.as_str(), &fingerprint, None)
            .await
        {
            if let Ok(cached) = serde_json::from_value::<CachedRetrieval>(payload) {
                recording::record_retrieval(elapsed_ms(started), "exact", false);
                return Ok(RetrievalResult {
                    entries: cached.entries,
                    stats: cached.stats,
                    cache_hit_kind: Some(kind),
                    degraded: false,
                });
            }
        }

        // 2. Semantic cache hit over the query-embedding index.
        let query_embedding = self
            .semantic_retriever
            .embeddings()
            .embed_text(query)
            .await?;
        if let Some((payload, kind)) = self
            .semantic_cache
            .get_query(user.as_str(), &fingerprint, Some(&query_embedding))
            .await
        {
            if let Ok(cached) = serde_json::from_value::<CachedRetrieval>(payload) {
                recording::record_retrieval(elapsed_ms(started), "semantic", false);
                return Ok(RetrievalResult {
                    entries: cached.entries,
                    stats: cached.stats,
                    cache_hit_kind: Some(kind),
                    degraded: false,
                });
            }
        }

        // 3. Miss: run the hybrid pipeline.
        let mut request = RetrievalRequest::new(user.clone(), query, k);
        request.filter = filter;
        let outcome = match self.semantic_retriever.retrieve(&request, deadline).await {
            Ok(outcome) => outcome,
            // Store overload: degrade to vector-only before giving up.
            Err(e) if e.is_transient() => {
                warn!(error = %e, "hybrid retrieval degraded to vector-only");
                request.mode = RetrievalMode::VectorOnly;
                let outcome = self.semantic_retriever.retrieve(&request, deadline).await?;
                let optimized = self
                    .optimize_hits(&outcome.hits, query, profile, deadline)
                    .await;
                let entries = merge_entries(&outcome.hits, optimized.entries);
                recording::record_retrieval(elapsed_ms(started), "miss", true);
                return Ok(RetrievalResult {
                    entries,
                    stats: optimized.stats,
                    cache_hit_kind: None,
                    degraded: true,
                });
            }
            Err(e) => return Err(e),
        };

        let optimized = self
            .optimize_hits(&outcome.hits, query, profile, deadline)
            .await;
        let entries = merge_entries(&outcome.hits, optimized.entries);
        let stats = optimized.stats;

        // Stamp access times on what we are about to return.
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        if !ids.is_empty() {
            self.store.touch_knowledge(&ids, Utc::now()).await?;
        }

        // 4. Write back through the cache.
        if let Ok(payload) = serde_json::to_value(CachedRetrieval {
            entries: entries.clone(),
            stats: stats.clone(),
        }) {
            self.semantic_cache
                .put_query(user.as_str(), &fingerprint, &query_embedding, payload)
                .await;
        }

        recording::record_retrieval(elapsed_ms(started), "miss", false);
        Ok(RetrievalResult {
            entries,
            stats,
            cache_hit_kind: None,
            degraded: false,
        })
    }

    /// Run the optimizer over retrieved hits, degrading to a pass-through
    /// when the pipeline itself fails.
    async fn optimize_hits(
        &self,
        hits: &[RetrievedHit],
        query: &str,
        profile: Option<OptimizerProfile>,
        deadline: &Deadline,
    ) -> OptimizedContext {
        let mut candidates: Vec<Candidate> = hits.iter().map(hit_to_candidate).collect();
        candidates.truncate(self.config.engine.max_optimizer_candidates);

        let result = match profile {
            Some(profile) => {
                Optimizer::new(profile.params())
                    .optimize(candidates.clone(), query, None, None, deadline)
                    .await
            }
            None => {
                self.optimizer
                    .optimize(candidates.clone(), query, None, None, deadline)
                    .await
            }
        };
        match result {
            Ok(optimized) => optimized,
            Err(e) => {
                warn!(error = %e, "optimizer failed; returning raw retriever output");
                Optimizer::skipped(candidates)
            }
        }
    }

    // --- Context assembly ---

    /// Assemble persona, top semantic hits, recent raw messages, and top
    /// episodic hits into one optimizer-trimmed context object.
    pub async fn get_context(
        &self,
        user: &UserId,
        query: Option<&str>,
        k: usize,
        deadline: &Deadline,
    ) -> Result<Context, StrataError> {
        deadline.checkpoint("context assembly")?;
        let query = query.unwrap_or("");

        // Persona: cache first, store on miss, repopulate on the way out.
        let persona = match self.semantic_cache.get_persona(user.as_str()).await {
            Some(snapshot) => Some(snapshot),
            None => match self.store.get_persona(user).await? {
                Some(record) => {
                    let snapshot = serde_json::to_value(&record)
                        .map_err(|e| StrataError::Internal(e.to_string()))?;
                    self.semantic_cache
                        .put_persona(user.as_str(), &snapshot)
                        .await;
                    Some(snapshot)
                }
                None => None,
            },
        };

        let mut semantic_request = RetrievalRequest::new(user.clone(), query, k);
        semantic_request.table = SearchTable::Knowledge;
        let semantic = self
            .semantic_retriever
            .retrieve(&semantic_request, deadline)
            .await?;

        let mut episodic_request = RetrievalRequest::new(user.clone(), query, k);
        episodic_request.table = SearchTable::Episodes;
        let episodic = self
            .episodic_retriever
            .retrieve(&episodic_request, deadline)
            .await?;

        let recent = self.store.recent_messages(user, 10).await?;

        // One optimizer pass over both layers; partition afterwards by id.
        let semantic_ids: std::collections::HashSet<String> =
            semantic.hits.iter().map(|h| h.doc.id.clone()).collect();
        let mut all_hits = semantic.hits;
        all_hits.extend(episodic.hits);
        let optimized = self.optimize_hits(&all_hits, query, None, deadline).await;
        let entries = merge_entries(&all_hits, optimized.entries);

        let (semantic_entries, episodic_entries): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| semantic_ids.contains(&e.id));

        Ok(Context {
            user_id: user.as_str().to_string(),
            persona,
            semantic: semantic_entries,
            episodic: episodic_entries,
            recent_messages: recent
                .into_iter()
                .map(|m| ContextMessage {
                    role: m.role.to_string(),
                    content: m.content,
                    created_at: strata_store::canonical_ts(m.created_at),
                })
                .collect(),
            stats: optimized.stats,
        })
    }

    // --- Filter-building search wrappers ---

    pub async fn search_by_time_window(
        &self,
        user: &UserId,
        query: &str,
        days: i64,
        k: usize,
        deadline: &Deadline,
    ) -> Result<RetrievalResult, StrataError> {
        self.retrieve(
            user,
            query,
            Some(FilterExpr::recent("created_at", days)),
            k,
            None,
            deadline,
        )
        .await
    }

    pub async fn search_by_category(
        &self,
        user: &UserId,
        query: &str,
        category: Category,
        k: usize,
        deadline: &Deadline,
    ) -> Result<RetrievalResult, StrataError> {
        self.retrieve(
            user,
            query,
            Some(FilterExpr::eq("category", category.to_string())),
            k,
            None,
            deadline,
        )
        .await
    }

    pub async fn search_by_tags(
        &self,
        user: &UserId,
        query: &str,
        tags: Vec<String>,
        k: usize,
        deadline: &Deadline,
    ) -> Result<RetrievalResult, StrataError> {
        self.retrieve(
            user,
            query,
            Some(FilterExpr::any_of("tags", tags)),
            k,
            None,
            deadline,
        )
        .await
    }

    pub async fn search_important_items(
        &self,
        user: &UserId,
        query: &str,
        min_importance: f64,
        k: usize,
        deadline: &Deadline,
    ) -> Result<RetrievalResult, StrataError> {
        self.retrieve(
            user,
            query,
            Some(FilterExpr::gte("importance", min_importance)),
            k,
            None,
            deadline,
        )
        .await
    }

    pub async fn search_with_metadata(
        &self,
        user: &UserId,
        query: &str,
        path: &str,
        value: FilterValue,
        k: usize,
        deadline: &Deadline,
    ) -> Result<RetrievalResult, StrataError> {
        self.retrieve(
            user,
            query,
            Some(FilterExpr::eq(format!("metadata.{path}"), value)),
            k,
            None,
            deadline,
        )
        .await
    }

    /// Delete a user's persona, cascading cache invalidation.
    pub async fn delete_persona(&self, user: &UserId) -> Result<(), StrataError> {
        self.store.delete_persona(user).await?;
        let removed = self.semantic_cache.invalidate_user(user.as_str(), true).await;
        recording::record_invalidation(removed);
        Ok(())
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn hit_to_candidate(hit: &RetrievedHit) -> Candidate {
    let mut candidate = Candidate::new(&hit.doc.id, &hit.doc.content, hit.fused_score);
    candidate.importance = hit.doc.importance;
    if let Some(source) = &hit.doc.source_id {
        candidate = candidate.with_source(source.clone());
    }
    if !hit.doc.embedding.is_empty() {
        candidate = candidate.with_embedding(hit.doc.embedding.clone());
    }
    candidate
}

/// Join optimizer survivors back with their retrieval score breakdowns.
fn merge_entries(hits: &[RetrievedHit], survivors: Vec<Candidate>) -> Vec<RetrievedEntry> {
    survivors
        .into_iter()
        .map(|candidate| {
            let hit = hits.iter().find(|h| h.doc.id == candidate.id);
            RetrievedEntry {
                id: candidate.id,
                content: candidate.content,
                title: hit.and_then(|h| h.doc.title.clone()),
                source_id: candidate.source_id,
                vector_score: hit.map(|h| h.vector_score).unwrap_or(0.0),
                lex_score: hit.map(|h| h.lex_score).unwrap_or(0.0),
                fused_score: hit.map(|h| h.fused_score).unwrap_or(0.0),
                relevance: candidate.relevance,
                importance: candidate.importance,
                has_contradiction: candidate.has_contradiction,
                compressed: candidate.compressed,
                truncated: candidate.truncated,
                reasons: hit.map(|h| h.reasons.clone()).unwrap_or_default(),
            }
        })
        .collect()
}
