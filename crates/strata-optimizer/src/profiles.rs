// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optimizer tunables and preset profiles.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use strata_config::model::OptimizerConfig;
use strata_core::error::StrataError;

/// Preset parameter bundles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OptimizerProfile {
    /// Minimal reduction.
    Conservative,
    /// The default trade-off.
    #[default]
    Balanced,
    /// Maximum reduction.
    Aggressive,
    /// Favor preservation over token savings.
    Quality,
}

/// Resolved tunables for one optimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerParams {
    /// Semantic dedup threshold, in [0.70, 0.85].
    pub similarity_threshold: f64,
    /// Minimum normalized character entropy.
    pub entropy_min: f64,
    /// Minimum content length in characters.
    pub min_content_len: usize,
    pub max_context_tokens: usize,
    /// Base re-rank threshold, in [0.50, 0.80].
    pub rerank_threshold_base: f64,
    pub max_iterations: usize,
    pub max_per_source: usize,
    /// Sentences kept on each side of a relevant sentence in compression.
    pub context_window: usize,
    /// Minimum entries preserved by re-ranking.
    pub min_kept: usize,
    /// Contradiction similarity band.
    pub contradiction_lo: f64,
    pub contradiction_hi: f64,
    pub enable_contradiction: bool,
    pub enable_adaptive_threshold: bool,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        OptimizerProfile::Balanced.params()
    }
}

impl OptimizerProfile {
    /// The full tunable set this profile fixes.
    pub fn params(self) -> OptimizerParams {
        match self {
            OptimizerProfile::Conservative => OptimizerParams {
                similarity_threshold: 0.85,
                entropy_min: 0.2,
                min_content_len: 5,
                max_context_tokens: 6000,
                rerank_threshold_base: 0.50,
                max_iterations: 1,
                max_per_source: 5,
                context_window: 2,
                min_kept: 3,
                contradiction_lo: 0.70,
                contradiction_hi: 0.90,
                enable_contradiction: true,
                enable_adaptive_threshold: false,
            },
            OptimizerProfile::Balanced => OptimizerParams {
                similarity_threshold: 0.80,
                entropy_min: 0.3,
                min_content_len: 10,
                max_context_tokens: 4000,
                rerank_threshold_base: 0.65,
                max_iterations: 3,
                max_per_source: 3,
                context_window: 1,
                min_kept: 3,
                contradiction_lo: 0.70,
                contradiction_hi: 0.90,
                enable_contradiction: true,
                enable_adaptive_threshold: true,
            },
            OptimizerProfile::Aggressive => OptimizerParams {
                similarity_threshold: 0.70,
                entropy_min: 0.4,
                min_content_len: 15,
                max_context_tokens: 3000,
                rerank_threshold_base: 0.70,
                max_iterations: 2,
                max_per_source: 2,
                context_window: 0,
                min_kept: 3,
                contradiction_lo: 0.70,
                contradiction_hi: 0.90,
                enable_contradiction: true,
                enable_adaptive_threshold: true,
            },
            OptimizerProfile::Quality => OptimizerParams {
                similarity_threshold: 0.82,
                entropy_min: 0.25,
                min_content_len: 8,
                max_context_tokens: 5000,
                rerank_threshold_base: 0.60,
                max_iterations: 4,
                max_per_source: 4,
                context_window: 2,
                min_kept: 3,
                contradiction_lo: 0.70,
                contradiction_hi: 0.90,
                enable_contradiction: true,
                enable_adaptive_threshold: true,
            },
        }
    }
}

impl OptimizerParams {
    /// Resolve tunables from config: the named profile provides the bundle,
    /// then explicit config keys override it, clamped into their documented
    /// ranges.
    pub fn from_config(config: &OptimizerConfig) -> Result<Self, StrataError> {
        let profile: OptimizerProfile = config.profile.parse().map_err(|_| {
            StrataError::Validation(format!(
                "unknown optimizer profile `{}`",
                config.profile
            ))
        })?;
        let mut params = profile.params();
        params.similarity_threshold = config.similarity_threshold.clamp(0.70, 0.85);
        params.max_per_source = config.max_per_source.clamp(2, 5);
        params.rerank_threshold_base = config.rerank_threshold_base.clamp(0.50, 0.80);
        params.max_iterations = config.max_iterations.clamp(1, 5);
        params.context_window = config.context_window.min(3);
        params.max_context_tokens = config.max_context_tokens;
        params.min_kept = config.min_kept.max(1);
        Ok(params)
    }
}
