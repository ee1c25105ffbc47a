// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait that all pluggable backends implement.

use async_trait::async_trait;

use crate::error::StrataError;
use crate::types::{BackendKind, HealthStatus};

/// The base trait for all Strata backends.
///
/// Every backend (store, cache, embedding, classifier, etc.) implements this
/// trait, which provides identity, lifecycle, and health check capabilities.
#[async_trait]
pub trait BackendAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this backend instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this backend.
    fn version(&self) -> semver::Version;

    /// Returns the kind of backend (store, cache, embedding, etc.).
    fn kind(&self) -> BackendKind;

    /// Performs a health check and returns the backend's current status.
    async fn health_check(&self) -> Result<HealthStatus, StrataError>;

    /// Gracefully shuts down the backend, releasing any held resources.
    async fn shutdown(&self) -> Result<(), StrataError>;
}
