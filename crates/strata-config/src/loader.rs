// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./strata.toml` > `~/.config/strata/strata.toml`
//! > `/etc/strata/strata.toml` with environment variable overrides via the
//! `STRATA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::StrataConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/strata/strata.toml` (system-wide)
/// 3. `~/.config/strata/strata.toml` (user XDG config)
/// 4. `./strata.toml` (local directory)
/// 5. `STRATA_*` environment variables
pub fn load_config() -> Result<StrataConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string only (no XDG lookup).
///
/// Used for testing and for callers that supply config inline.
pub fn load_config_from_str(toml_content: &str) -> Result<StrataConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<StrataConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for
/// diagnostic use, before extraction).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::file("/etc/strata/strata.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("strata/strata.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("strata.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `STRATA_CACHE_QUERY_TTL_S` must map to
/// `cache.query_ttl_s`, not `cache.query.ttl.s`.
fn env_provider() -> Env {
    Env::prefixed("STRATA_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("engine_", "engine.", 1)
            .replacen("embedding_", "embedding.", 1)
            .replacen("retrieval_", "retrieval.", 1)
            .replacen("cache_", "cache.", 1)
            .replacen("episodic_", "episodic.", 1)
            .replacen("optimizer_", "optimizer.", 1)
            .replacen("storage_", "storage.", 1);
        mapped.into()
    })
}
