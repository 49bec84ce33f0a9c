//! Timer-driven background work.
//!
//! Two loops share one cancellation token:
//!
//! - the correction pass runs a scheduled backfill over every channel,
//!   resuming the previous run if it never completed;
//! - the view refresher rebuilds `video_rolling_baselines` so reporting
//!   queries stay close to the stored values.
//!
//! Both tick immediately on start, so an interrupted run resumes as soon as
//! the worker comes back up.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use viewline_db::models::baseline_run::RunStatus;
use viewline_db::repositories::ReportingRepo;

use crate::backfill::BackfillOptions;
use crate::engine::BaselineEngine;

/// Runs the correction pass and the view refresh on their intervals.
pub struct BaselineScheduler {
    engine: BaselineEngine,
    batch_size: usize,
    baseline_interval: Duration,
    view_refresh_interval: Duration,
}

impl BaselineScheduler {
    pub fn new(
        engine: BaselineEngine,
        batch_size: usize,
        baseline_interval: Duration,
        view_refresh_interval: Duration,
    ) -> Self {
        Self {
            engine,
            batch_size,
            baseline_interval,
            view_refresh_interval,
        }
    }

    /// Run both loops until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            baseline_interval_secs = self.baseline_interval.as_secs(),
            view_refresh_interval_secs = self.view_refresh_interval.as_secs(),
            batch_size = self.batch_size,
            "Baseline scheduler started"
        );

        tokio::join!(self.correction_loop(&cancel), self.refresh_loop(&cancel));

        tracing::info!("Baseline scheduler stopped");
    }

    async fn correction_loop(&self, cancel: &CancellationToken) {
        let mut interval = tokio::time::interval(self.baseline_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let options = BackfillOptions::scheduled(self.batch_size);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    match self.engine.run_backfill(&options, cancel).await {
                        Ok(run) if run.status == RunStatus::Completed.as_str() => {
                            // Publish the fresh values without waiting for the next refresh tick.
                            if let Err(e) = ReportingRepo::refresh_baseline_view(self.engine.pool()).await {
                                tracing::error!(error = %e, "View refresh after correction pass failed");
                            }
                        }
                        Ok(run) => {
                            tracing::info!(run_id = run.id, status = %run.status, "Correction pass interrupted");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Correction pass failed, will resume next tick");
                        }
                    }
                }
            }
        }
    }

    async fn refresh_loop(&self, cancel: &CancellationToken) {
        let mut interval = tokio::time::interval(self.view_refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    match ReportingRepo::refresh_baseline_view(self.engine.pool()).await {
                        Ok(()) => tracing::debug!("Refreshed baseline view"),
                        Err(e) => tracing::error!(error = %e, "Baseline view refresh failed"),
                    }
                }
            }
        }
    }
}
