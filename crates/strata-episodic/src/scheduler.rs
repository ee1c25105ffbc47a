// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background scheduling for the episodic pipeline.
//!
//! Plain loops on a timer: episodization on a fixed interval, and a daily
//! instancization run at a configured UTC hour. Jobs share no memory with
//! request handlers except through the store. When a run is signalled while
//! the previous one is still going, it is skipped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use strata_config::model::EpisodicConfig;
use strata_core::error::StrataError;

use crate::episodize::{EpisodizationJob, EpisodizationReport};
use crate::instancize::{InstancizationJob, InstancizationReport};

/// Owns the two background jobs and their timers.
pub struct JobScheduler {
    episodization: Arc<EpisodizationJob>,
    instancization: Arc<InstancizationJob>,
    config: EpisodicConfig,
    episodize_running: AtomicBool,
    instancize_running: AtomicBool,
}

impl JobScheduler {
    pub fn new(
        episodization: Arc<EpisodizationJob>,
        instancization: Arc<InstancizationJob>,
        config: EpisodicConfig,
    ) -> Self {
        Self {
            episodization,
            instancization,
            config,
            episodize_running: AtomicBool::new(false),
            instancize_running: AtomicBool::new(false),
        }
    }

    /// Manually trigger an episodization run. Returns `None` when a run is
    /// already in flight (the trigger is skipped, not queued).
    pub async fn trigger_episodization(
        &self,
    ) -> Result<Option<EpisodizationReport>, StrataError> {
        if self.episodize_running.swap(true, Ordering::SeqCst) {
            debug!("episodization already running; trigger skipped");
            return Ok(None);
        }
        let result = self.episodization.run(Utc::now()).await;
        self.episodize_running.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    /// Manually trigger an instancization run. Skips when already running.
    pub async fn trigger_instancization(
        &self,
    ) -> Result<Option<InstancizationReport>, StrataError> {
        if self.instancize_running.swap(true, Ordering::SeqCst) {
            debug!("instancization already running; trigger skipped");
            return Ok(None);
        }
        let result = self.instancization.run(Utc::now()).await;
        self.instancize_running.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    /// Spawn both timer loops. They run until `shutdown` is cancelled.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(StdDuration::from_secs(
                scheduler.config.interval_seconds,
            ));
            // The first tick fires immediately; episodize at startup the way
            // the cron-style deployment does.
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = scheduler.trigger_episodization().await {
                            warn!(error = %e, "scheduled episodization failed; next run will retry");
                        }
                    }
                    _ = token.cancelled() => {
                        info!("episodization loop stopped");
                        break;
                    }
                }
            }
        }));

        let scheduler = self;
        handles.push(tokio::spawn(async move {
            loop {
                let sleep = seconds_until_hour(u32::from(
                    scheduler.config.instancize_hour_utc,
                ));
                tokio::select! {
                    _ = tokio::time::sleep(StdDuration::from_secs(sleep)) => {
                        if let Err(e) = scheduler.trigger_instancization().await {
                            warn!(error = %e, "scheduled instancization failed; next run will retry");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        info!("instancization loop stopped");
                        break;
                    }
                }
            }
        }));

        handles
    }
}

/// Seconds from now until the next occurrence of `hour`:00 UTC.
fn seconds_until_hour(hour: u32) -> u64 {
    let now = Utc::now();
    let today_target = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("valid configured hour")
        .and_utc();
    let target = if today_target > now {
        today_target
    } else {
        today_target + Duration::days(1)
    };
    (target - now).num_seconds().max(1) as u64
}
