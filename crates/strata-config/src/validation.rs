// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates the documented ranges that cannot be expressed via serde
//! attributes. Collects every violation instead of failing fast.

use crate::diagnostic::ConfigError;
use crate::model::StrataConfig;

/// Recognized optimizer profile names.
pub const PROFILES: [&str; 4] = ["conservative", "balanced", "aggressive", "quality"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors.
pub fn validate_config(config: &StrataConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Embedding dimensions.
    if config.embedding.dim_semantic < 32 {
        errors.push(ConfigError::validation(format!(
            "embedding.dim_semantic must be at least 32, got {}",
            config.embedding.dim_semantic
        )));
    }
    if config.embedding.dim_episodic < 32 {
        errors.push(ConfigError::validation(format!(
            "embedding.dim_episodic must be at least 32, got {}",
            config.embedding.dim_episodic
        )));
    }

    // Retrieval.
    if !(10..=500).contains(&config.retrieval.k_fetch_min) {
        errors.push(ConfigError::validation(format!(
            "retrieval.k_fetch_min must be in [10, 500], got {}",
            config.retrieval.k_fetch_min
        )));
    }
    let weight_sum = config.retrieval.vector_weight + config.retrieval.lexical_weight;
    if config.retrieval.vector_weight < 0.0
        || config.retrieval.lexical_weight < 0.0
        || weight_sum > 1.0 + f64::EPSILON
    {
        errors.push(ConfigError::validation(format!(
            "retrieval weights must be non-negative and sum to at most 1, got ({}, {})",
            config.retrieval.vector_weight, config.retrieval.lexical_weight
        )));
    }
    if let Some(half_life) = config.retrieval.freshness_half_life_days {
        if half_life <= 0.0 {
            errors.push(ConfigError::validation(format!(
                "retrieval.freshness_half_life_days must be positive, got {half_life}"
            )));
        }
    }

    // Cache.
    if config.cache.persona_ttl_s < 60 {
        errors.push(ConfigError::validation(format!(
            "cache.persona_ttl_s must be at least 60, got {}",
            config.cache.persona_ttl_s
        )));
    }
    if config.cache.query_ttl_s < 60 {
        errors.push(ConfigError::validation(format!(
            "cache.query_ttl_s must be at least 60, got {}",
            config.cache.query_ttl_s
        )));
    }
    if !(0.80..=0.95).contains(&config.cache.semantic_match_threshold) {
        errors.push(ConfigError::validation(format!(
            "cache.semantic_match_threshold must be in [0.80, 0.95], got {}",
            config.cache.semantic_match_threshold
        )));
    }
    if !(1..=100).contains(&config.cache.max_query_per_user) {
        errors.push(ConfigError::validation(format!(
            "cache.max_query_per_user must be in [1, 100], got {}",
            config.cache.max_query_per_user
        )));
    }

    // Episodic.
    if config.episodic.window_seconds < 60 {
        errors.push(ConfigError::validation(format!(
            "episodic.window_seconds must be at least 60, got {}",
            config.episodic.window_seconds
        )));
    }
    if config.episodic.super_chat_cap < 1 {
        errors.push(ConfigError::validation(
            "episodic.super_chat_cap must be at least 1",
        ));
    }
    if config.episodic.deep_dive_cap < 1 {
        errors.push(ConfigError::validation(
            "episodic.deep_dive_cap must be at least 1",
        ));
    }
    if config.episodic.retention_days < 1 {
        errors.push(ConfigError::validation(format!(
            "episodic.retention_days must be at least 1, got {}",
            config.episodic.retention_days
        )));
    }
    if config.episodic.compress_after_days < config.episodic.retention_days {
        errors.push(ConfigError::validation(format!(
            "episodic.compress_after_days ({}) must be at least episodic.retention_days ({})",
            config.episodic.compress_after_days, config.episodic.retention_days
        )));
    }
    if config.episodic.instancize_hour_utc > 23 {
        errors.push(ConfigError::validation(format!(
            "episodic.instancize_hour_utc must be in [0, 23], got {}",
            config.episodic.instancize_hour_utc
        )));
    }

    // Optimizer.
    if !PROFILES.contains(&config.optimizer.profile.as_str()) {
        errors.push(ConfigError::validation(format!(
            "optimizer.profile must be one of {PROFILES:?}, got `{}`",
            config.optimizer.profile
        )));
    }
    if !(0.70..=0.85).contains(&config.optimizer.similarity_threshold) {
        errors.push(ConfigError::validation(format!(
            "optimizer.similarity_threshold must be in [0.70, 0.85], got {}",
            config.optimizer.similarity_threshold
        )));
    }
    if !(2..=5).contains(&config.optimizer.max_per_source) {
        errors.push(ConfigError::validation(format!(
            "optimizer.max_per_source must be in [2, 5], got {}",
            config.optimizer.max_per_source
        )));
    }
    if !(0.50..=0.80).contains(&config.optimizer.rerank_threshold_base) {
        errors.push(ConfigError::validation(format!(
            "optimizer.rerank_threshold_base must be in [0.50, 0.80], got {}",
            config.optimizer.rerank_threshold_base
        )));
    }
    if !(1..=5).contains(&config.optimizer.max_iterations) {
        errors.push(ConfigError::validation(format!(
            "optimizer.max_iterations must be in [1, 5], got {}",
            config.optimizer.max_iterations
        )));
    }
    if config.optimizer.context_window > 3 {
        errors.push(ConfigError::validation(format!(
            "optimizer.context_window must be in [0, 3], got {}",
            config.optimizer.context_window
        )));
    }
    if config.optimizer.max_context_tokens != 0 && config.optimizer.max_context_tokens < 512 {
        errors.push(ConfigError::validation(format!(
            "optimizer.max_context_tokens must be 0 or at least 512, got {}",
            config.optimizer.max_context_tokens
        )));
    }
    if config.optimizer.min_kept < 1 {
        errors.push(ConfigError::validation(
            "optimizer.min_kept must be at least 1",
        ));
    }

    // Storage.
    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
