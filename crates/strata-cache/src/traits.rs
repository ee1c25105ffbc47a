// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The cache contract.
//!
//! Ephemeral KV with TTLs, atomic set-if-absent, and prefix operations.
//! Availability is best-effort: every call site wraps cache errors with a
//! store-fallback path, so backends surface failures honestly instead of
//! masking them.

use std::time::Duration;

use async_trait::async_trait;

use strata_core::error::StrataError;
use strata_core::traits::adapter::BackendAdapter;

/// Ephemeral KV cache consumed by the semantic cache layer.
#[async_trait]
pub trait Cache: BackendAdapter {
    /// Fetch a value; expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StrataError>;

    /// Store a value with a TTL, replacing any existing entry.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StrataError>;

    /// Store only when the key is absent. Returns whether the write
    /// happened. Atomic.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StrataError>;

    /// Remove one key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StrataError>;

    /// Remove every key with the given prefix; returns how many went.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StrataError>;

    /// List live keys with the given prefix.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StrataError>;

    /// Refresh a key's TTL without touching its value.
    async fn touch(&self, key: &str, ttl: Duration) -> Result<(), StrataError>;
}
