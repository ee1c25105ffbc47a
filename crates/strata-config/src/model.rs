// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Strata memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages. Defaults
//! match the documented configuration surface; range checks live in
//! [`crate::validation`].

use serde::{Deserialize, Serialize};

/// Top-level Strata configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    /// Engine-wide settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Embedding dimensions and provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Hybrid retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Semantic cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Episodic lifecycle pipeline settings.
    #[serde(default)]
    pub episodic: EpisodicConfig,

    /// Context optimizer settings.
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            cache: CacheConfig::default(),
            episodic: EpisodicConfig::default(),
            optimizer: OptimizerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Default operation deadline in milliseconds. 0 means unbounded.
    #[serde(default = "default_deadline_ms")]
    pub default_deadline_ms: u64,

    /// Ceiling on candidate list size fed into the optimizer.
    #[serde(default = "default_max_candidates")]
    pub max_optimizer_candidates: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_deadline_ms: default_deadline_ms(),
            max_optimizer_candidates: default_max_candidates(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_deadline_ms() -> u64 {
    30_000
}

fn default_max_candidates() -> usize {
    200
}

/// Embedding dimensions and remote provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Dimension for semantic-layer embeddings (personas, knowledge).
    #[serde(default = "default_dim_semantic")]
    pub dim_semantic: usize,

    /// Dimension for episodic-layer embeddings (episodes, instances).
    #[serde(default = "default_dim_episodic")]
    pub dim_episodic: usize,

    /// Remote embedding API key. `None` selects the deterministic fallback.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Remote embedding endpoint URL.
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    /// Remote embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dim_semantic: default_dim_semantic(),
            dim_episodic: default_dim_episodic(),
            api_key: None,
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
        }
    }
}

fn default_dim_semantic() -> usize {
    1536
}

fn default_dim_episodic() -> usize {
    384
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Hybrid retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Minimum per-subquery fetch size pushed to the store.
    #[serde(default = "default_k_fetch_min")]
    pub k_fetch_min: usize,

    /// Weight of the vector subquery in fusion.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,

    /// Weight of the lexical subquery in fusion.
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,

    /// Freshness half-life in days. `None` disables the freshness factor.
    #[serde(default)]
    pub freshness_half_life_days: Option<f64>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_fetch_min: default_k_fetch_min(),
            vector_weight: default_vector_weight(),
            lexical_weight: default_lexical_weight(),
            freshness_half_life_days: None,
        }
    }
}

fn default_k_fetch_min() -> usize {
    50
}

fn default_vector_weight() -> f64 {
    0.7
}

fn default_lexical_weight() -> f64 {
    0.3
}

/// Semantic cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Persona snapshot TTL in seconds.
    #[serde(default = "default_persona_ttl_s")]
    pub persona_ttl_s: u64,

    /// Query result TTL in seconds.
    #[serde(default = "default_query_ttl_s")]
    pub query_ttl_s: u64,

    /// Input fingerprint TTL in seconds.
    #[serde(default = "default_input_ttl_s")]
    pub input_ttl_s: u64,

    /// Minimum cosine similarity for a semantic cache hit.
    #[serde(default = "default_semantic_match_threshold")]
    pub semantic_match_threshold: f64,

    /// LRU cap on cached query results per user.
    #[serde(default = "default_max_query_per_user")]
    pub max_query_per_user: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persona_ttl_s: default_persona_ttl_s(),
            query_ttl_s: default_query_ttl_s(),
            input_ttl_s: default_input_ttl_s(),
            semantic_match_threshold: default_semantic_match_threshold(),
            max_query_per_user: default_max_query_per_user(),
        }
    }
}

fn default_persona_ttl_s() -> u64 {
    3600
}

fn default_query_ttl_s() -> u64 {
    1800
}

fn default_input_ttl_s() -> u64 {
    300
}

fn default_semantic_match_threshold() -> f64 {
    0.85
}

fn default_max_query_per_user() -> usize {
    10
}

/// Episodic lifecycle pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EpisodicConfig {
    /// Wall-clock grouping window in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    /// Idle gap that closes a group, in seconds.
    #[serde(default = "default_idle_gap_seconds")]
    pub idle_gap_seconds: u64,

    /// Maximum messages per group for super-chat conversations.
    #[serde(default = "default_super_chat_cap")]
    pub super_chat_cap: usize,

    /// Maximum messages per group for deep-dive conversations.
    #[serde(default = "default_deep_dive_cap")]
    pub deep_dive_cap: usize,

    /// Days after which an episode becomes an instance.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Days after which an instance becomes a compression candidate.
    #[serde(default = "default_compress_after_days")]
    pub compress_after_days: i64,

    /// Interval between episodization runs, in seconds.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// UTC hour (0-23) at which the daily instancization run fires.
    #[serde(default = "default_instancize_hour_utc")]
    pub instancize_hour_utc: u8,

    /// Character budget per episode embedding before sampling kicks in.
    #[serde(default = "default_embed_char_budget")]
    pub embed_char_budget: usize,

    /// Retry budget per message group before it is skipped and flagged.
    #[serde(default = "default_group_retry_budget")]
    pub group_retry_budget: u32,
}

impl Default for EpisodicConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            idle_gap_seconds: default_idle_gap_seconds(),
            super_chat_cap: default_super_chat_cap(),
            deep_dive_cap: default_deep_dive_cap(),
            retention_days: default_retention_days(),
            compress_after_days: default_compress_after_days(),
            interval_seconds: default_interval_seconds(),
            instancize_hour_utc: default_instancize_hour_utc(),
            embed_char_budget: default_embed_char_budget(),
            group_retry_budget: default_group_retry_budget(),
        }
    }
}

fn default_window_seconds() -> u64 {
    21_600
}

fn default_idle_gap_seconds() -> u64 {
    120
}

fn default_super_chat_cap() -> usize {
    50
}

fn default_deep_dive_cap() -> usize {
    30
}

fn default_retention_days() -> i64 {
    30
}

fn default_compress_after_days() -> i64 {
    90
}

fn default_interval_seconds() -> u64 {
    21_600
}

fn default_instancize_hour_utc() -> u8 {
    2
}

fn default_embed_char_budget() -> usize {
    8_000
}

fn default_group_retry_budget() -> u32 {
    3
}

/// Context optimizer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Preset profile: conservative, balanced, aggressive, quality.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Cosine similarity threshold for semantic deduplication.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Maximum surviving entries per source.
    #[serde(default = "default_max_per_source")]
    pub max_per_source: usize,

    /// Base relevance threshold for adaptive re-ranking.
    #[serde(default = "default_rerank_threshold_base")]
    pub rerank_threshold_base: f64,

    /// Maximum re-ranking iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Sentences of context kept around each relevant sentence in compression.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Hard cap on total context tokens.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Minimum entries preserved by re-ranking.
    #[serde(default = "default_min_kept")]
    pub min_kept: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            similarity_threshold: default_similarity_threshold(),
            max_per_source: default_max_per_source(),
            rerank_threshold_base: default_rerank_threshold_base(),
            max_iterations: default_max_iterations(),
            context_window: default_context_window(),
            max_context_tokens: default_max_context_tokens(),
            min_kept: default_min_kept(),
        }
    }
}

fn default_profile() -> String {
    "balanced".to_string()
}

fn default_similarity_threshold() -> f64 {
    0.80
}

fn default_max_per_source() -> usize {
    3
}

fn default_rerank_threshold_base() -> f64 {
    0.65
}

fn default_max_iterations() -> usize {
    3
}

fn default_context_window() -> usize {
    1
}

fn default_max_context_tokens() -> usize {
    4000
}

fn default_min_kept() -> usize {
    3
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "strata.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}
