//! Consumer for `baseline_ingest_queue`.
//!
//! Newly inserted videos are queued by a database trigger. The consumer
//! claims them in small batches and recomputes each one from its trailing
//! window, so a fresh video gets a baseline within one poll interval
//! instead of waiting for the nightly correction pass.

use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use viewline_core::error::CoreError;
use viewline_db::repositories::IngestQueueRepo;

use crate::engine::BaselineEngine;
use crate::error::{WorkerError, WorkerResult};

/// Counts from one [`IngestConsumer::drain_once`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub claimed: usize,
    pub recomputed: usize,
    /// Claimed ids whose video no longer exists.
    pub missing: usize,
}

/// Polls the ingest queue and recomputes claimed videos.
pub struct IngestConsumer {
    engine: BaselineEngine,
    poll_interval: Duration,
    claim_limit: i64,
}

impl IngestConsumer {
    pub fn new(engine: BaselineEngine, poll_interval: Duration, claim_limit: i64) -> Self {
        Self {
            engine,
            poll_interval,
            claim_limit,
        }
    }

    /// Claim one batch and recompute it.
    ///
    /// On a storage error the failing video and every claimed video not yet
    /// processed go back on the queue before the error is returned. Each
    /// re-queue is attempted even if an earlier one failed. Ids that cannot
    /// be re-queued are logged and wait for the next scheduled pass.
    pub async fn drain_once(&self) -> WorkerResult<DrainReport> {
        let pool = self.engine.pool();
        let claimed = IngestQueueRepo::claim(pool, self.claim_limit).await?;
        let mut report = DrainReport {
            claimed: claimed.len(),
            ..DrainReport::default()
        };

        for (idx, video_id) in claimed.iter().enumerate() {
            match self.engine.recompute_video(video_id).await {
                Ok(_) => report.recomputed += 1,
                Err(WorkerError::Core(CoreError::NotFound { .. })) => {
                    tracing::warn!(video_id = %video_id, "Queued video no longer exists, dropping");
                    report.missing += 1;
                }
                Err(e) => {
                    let mut lost = 0usize;
                    for pending in &claimed[idx..] {
                        if let Err(enqueue_err) = IngestQueueRepo::enqueue(pool, pending).await {
                            tracing::error!(
                                video_id = %pending,
                                error = %enqueue_err,
                                "Failed to re-queue video, left for the next correction pass"
                            );
                            lost += 1;
                        }
                    }
                    tracing::warn!(
                        requeued = claimed.len() - idx - lost,
                        lost,
                        "Returned unprocessed videos to the ingest queue"
                    );
                    return Err(e);
                }
            }
        }

        Ok(report)
    }

    /// Poll until `cancel` is triggered.
    ///
    /// A full claim means more work is waiting, so the next batch is taken
    /// without waiting for the next tick.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            claim_limit = self.claim_limit,
            "Ingest consumer started"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Ingest consumer stopping");
                    break;
                }
                _ = interval.tick() => {
                    loop {
                        match self.drain_once().await {
                            Ok(report) => {
                                if report.claimed > 0 {
                                    tracing::info!(
                                        claimed = report.claimed,
                                        recomputed = report.recomputed,
                                        missing = report.missing,
                                        "Processed ingested videos"
                                    );
                                }
                                let full = report.claimed as i64 >= self.claim_limit;
                                if !full || cancel.is_cancelled() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Ingest drain failed, retrying next tick");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}
