// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric recording helpers over the `metrics` facade.
//!
//! The engine only emits; installing a recorder/exporter is the host
//! process's concern. Names are stable and documented here.

/// Record one retrieval with its latency and cache outcome.
pub fn record_retrieval(latency_ms: f64, cache_kind: &str, degraded: bool) {
    metrics::counter!("strata_retrievals_total", "cache" => cache_kind.to_string())
        .increment(1);
    metrics::histogram!("strata_retrieval_latency_ms").record(latency_ms);
    if degraded {
        metrics::counter!("strata_retrievals_degraded_total").increment(1);
    }
}

/// Record one ingest by target layer.
pub fn record_ingest(layer: &str) {
    metrics::counter!("strata_ingests_total", "layer" => layer.to_string()).increment(1);
}

/// Record cache invalidations issued by a write.
pub fn record_invalidation(entries: usize) {
    metrics::counter!("strata_cache_invalidations_total").increment(entries as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_an_installed_recorder_is_a_noop() {
        // The metrics facade drops events when no recorder is installed;
        // these must never panic in that configuration.
        record_retrieval(12.5, "miss", false);
        record_retrieval(3.0, "exact", true);
        record_ingest("knowledge");
        record_invalidation(4);
    }
}
