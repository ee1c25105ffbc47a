// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process cache backend.
//!
//! DashMap-backed KV with lazy TTL expiry: expired entries are dropped on
//! read and by an occasional sweep triggered from writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use strata_core::error::StrataError;
use strata_core::traits::adapter::BackendAdapter;
use strata_core::types::{BackendKind, HealthStatus};

use crate::traits::Cache;

/// Writes between opportunistic full sweeps of expired entries.
const SWEEP_EVERY: u64 = 256;

#[derive(Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-memory [`Cache`] backend.
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<String, Entry>,
    writes: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn maybe_sweep(&self) {
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.entries.retain(|_, entry| entry.live());
        }
    }
}

#[async_trait]
impl BackendAdapter for InMemoryCache {
    fn name(&self) -> &str {
        "memory-cache"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 4, 0)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Cache
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        self.entries.clear();
        Ok(())
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StrataError> {
        // The read guard must drop before the expired-entry removal below;
        // removing under a held shard guard would deadlock.
        let expired = match self.entries.get(key) {
            Some(entry) if entry.live() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StrataError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        self.maybe_sweep();
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StrataError> {
        // The DashMap entry API holds the shard lock across the whole
        // check-then-insert, which gives the required atomicity.
        let inserted = match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().live() {
                    false
                } else {
                    occupied.insert(Entry {
                        value: value.to_vec(),
                        expires_at: Instant::now() + ttl,
                    });
                    true
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value: value.to_vec(),
                    expires_at: Instant::now() + ttl,
                });
                true
            }
        };
        self.maybe_sweep();
        Ok(inserted)
    }

    async fn delete(&self, key: &str) -> Result<(), StrataError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StrataError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - self.entries.len())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StrataError> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && entry.value().live())
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn touch(&self, key: &str, ttl: Duration) -> Result<(), StrataError> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.live() {
                entry.expires_at = Instant::now() + ttl;
            }
        }
        Ok(())
    }
}
