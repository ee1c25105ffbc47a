// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observability sink trait.

use async_trait::async_trait;

use crate::error::StrataError;
use crate::traits::adapter::BackendAdapter;
use crate::types::MetricEvent;

/// Sink for metric and telemetry events.
///
/// The engine emits events; exporting them (Prometheus, OTLP, logs) is the
/// host process's concern. Sinks are injected at construction, never global.
#[async_trait]
pub trait ObservabilitySink: BackendAdapter {
    /// Record a single metric event.
    async fn record(&self, event: MetricEvent) -> Result<(), StrataError>;
}
