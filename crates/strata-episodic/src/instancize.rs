// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instancization job: archive episodes past retention into instances.
//!
//! Each eligible episode is copied into an instance row and deleted inside
//! one store transaction, so an episode and its instance never coexist. A
//! second sweep flags instances past the compression window as candidates;
//! the compression transformation itself is pluggable and not performed
//! here. Orphaned episodes (source conversation gone) are logged and
//! audited but never deleted.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use strata_config::model::EpisodicConfig;
use strata_core::error::StrataError;
use strata_store::{AuditAction, AuditEvent, InstanceRecord, VectorStore};

/// Outcome of one instancization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstancizationReport {
    pub instancized: usize,
    pub compression_candidates: usize,
    pub orphans_detected: usize,
}

/// The instancization job.
pub struct InstancizationJob {
    store: Arc<dyn VectorStore>,
    config: EpisodicConfig,
}

impl InstancizationJob {
    pub fn new(store: Arc<dyn VectorStore>, config: EpisodicConfig) -> Self {
        Self { store, config }
    }

    /// Run one pass. Idempotent: archived episodes are gone, so a second
    /// run finds nothing to do.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<InstancizationReport, StrataError> {
        let mut report = InstancizationReport::default();

        // 1. Episodes past retention become instances.
        let cutoff = now - Duration::days(self.config.retention_days);
        for episode in self.store.list_episodes_before(cutoff).await? {
            let instance = InstanceRecord::from_episode(&episode, now);
            match self.store.instancize_episode(&instance).await {
                Ok(()) => {
                    report.instancized += 1;
                    self.store
                        .append_audit(&AuditEvent::new(
                            AuditAction::Instancized,
                            episode.id.clone(),
                            episode.user_id.clone(),
                            now,
                            json!({ "instance_id": instance.id }),
                        ))
                        .await?;
                }
                // Another run already archived it.
                Err(StrataError::NotFound { .. }) => continue,
                Err(e) => {
                    warn!(episode_id = %episode.id, error = %e,
                          "instancize failed; retried on next run");
                    metrics::counter!("strata_instancize_failures_total").increment(1);
                }
            }
        }

        // 2. Instances past the compression window become candidates.
        let compress_cutoff = now - Duration::days(self.config.compress_after_days);
        for instance in self.store.list_compression_due(compress_cutoff).await? {
            self.store.mark_compression_candidate(&instance.id).await?;
            report.compression_candidates += 1;
            self.store
                .append_audit(&AuditEvent::new(
                    AuditAction::CompressionCandidate,
                    instance.id.clone(),
                    instance.user_id.clone(),
                    now,
                    json!({ "original_episode_id": instance.original_episode_id }),
                ))
                .await?;
        }

        // 3. Orphan detection: episodes whose source conversation no longer
        //    exists are flagged for operator action, never deleted.
        for episode in self.store.list_episodes().await? {
            if self.store.get_conversation(&episode.source_id).await?.is_none() {
                report.orphans_detected += 1;
                warn!(
                    episode_id = %episode.id,
                    source_id = %episode.source_id,
                    "episode references a missing conversation"
                );
                self.store
                    .append_audit(&AuditEvent::new(
                        AuditAction::OrphanDetected,
                        episode.id.clone(),
                        episode.user_id.clone(),
                        now,
                        json!({ "source_id": episode.source_id }),
                    ))
                    .await?;
            }
        }

        info!(
            instancized = report.instancized,
            compression_candidates = report.compression_candidates,
            orphans = report.orphans_detected,
            "instancization run complete"
        );
        metrics::counter!("strata_instances_created_total").increment(report.instancized as u64);
        Ok(report)
    }
}
