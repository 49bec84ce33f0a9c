//! Checkpointed runs: drive [`BaselineEngine::recompute_batch`] to completion.
//!
//! Each run is a row in `baseline_runs`. After every batch the cursor and
//! counters are committed, so a run interrupted by a crash, a storage error
//! or a shutdown picks up at the last committed channel the next time it is
//! resumed.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use viewline_core::error::CoreError;
use viewline_core::types::{ChannelId, Timestamp};
use viewline_db::models::baseline_run::{BaselineRun, CreateBaselineRun, RunStatus, RunTrigger};
use viewline_db::repositories::{BaselineRunRepo, VideoRepo};

use crate::engine::{BaselineEngine, BatchRequest};
use crate::error::WorkerResult;

/// Parameters for [`BaselineEngine::run_backfill`].
#[derive(Debug, Clone, Serialize)]
pub struct BackfillOptions {
    pub trigger: RunTrigger,
    pub batch_size: usize,
    pub channel_id: Option<ChannelId>,
    pub published_since: Option<Timestamp>,
    /// Continue the latest unfinished run for `trigger` instead of starting
    /// a new one. The resumed run keeps its original parameters.
    pub resume: bool,
}

impl BackfillOptions {
    /// Full recompute of every channel, resuming any interrupted run.
    pub fn scheduled(batch_size: usize) -> Self {
        Self {
            trigger: RunTrigger::Scheduled,
            batch_size,
            channel_id: None,
            published_since: None,
            resume: true,
        }
    }
}

impl BaselineEngine {
    /// Run batches until every channel is done or `cancel` fires.
    ///
    /// Returns the final run record. A cancelled run ends `cancelled`, a
    /// failed one ends `failed` with the error stored and returned. Both keep
    /// their cursor for the next resume. If the final status cannot be
    /// recorded the run is not reported as finished: that error is returned
    /// and the run stays resumable.
    #[tracing::instrument(skip(self, options, cancel), fields(trigger = options.trigger.as_str()))]
    pub async fn run_backfill(
        &self,
        options: &BackfillOptions,
        cancel: &CancellationToken,
    ) -> WorkerResult<BaselineRun> {
        let run = self.start_run(options).await?;

        let outcome = self.drive_run(&run, cancel).await;
        let (status, error) = match &outcome {
            Ok(true) => (RunStatus::Completed, None),
            Ok(false) => (RunStatus::Cancelled, None),
            Err(e) => (RunStatus::Failed, Some(e.to_string())),
        };

        let recorded = BaselineRunRepo::finish(self.pool(), run.id, status, error.as_deref()).await;
        match (outcome, recorded) {
            (Err(e), Err(finish_err)) => {
                tracing::error!(run_id = run.id, error = %finish_err, "Failed to record run outcome");
                return Err(e);
            }
            (Err(e), Ok(())) => return Err(e),
            (Ok(_), Err(finish_err)) => return Err(finish_err.into()),
            (Ok(_), Ok(())) => {}
        }

        let finished = BaselineRunRepo::find_by_id(self.pool(), run.id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "baseline run",
                id: run.id.to_string(),
            })?;

        tracing::info!(
            run_id = finished.id,
            status = %finished.status,
            channels = finished.channels_processed,
            videos = finished.videos_written,
            "Baseline run finished"
        );
        Ok(finished)
    }

    /// Resume an unfinished run or record a new one.
    async fn start_run(&self, options: &BackfillOptions) -> WorkerResult<BaselineRun> {
        if options.resume {
            if let Some(run) = BaselineRunRepo::find_resumable(self.pool(), options.trigger).await? {
                BaselineRunRepo::mark_running(self.pool(), run.id).await?;
                tracing::info!(
                    run_id = run.id,
                    previous_status = %run.status,
                    cursor = ?run.cursor,
                    "Resuming baseline run"
                );
                return Ok(run);
            }
        }

        let batch_size = i32::try_from(options.batch_size).map_err(|_| {
            CoreError::Validation(format!("batch size {} is too large", options.batch_size))
        })?;
        let run = BaselineRunRepo::create(
            self.pool(),
            &CreateBaselineRun {
                trigger: options.trigger,
                strategy: self.settings().strategy.as_str().to_string(),
                batch_size,
                channel_filter: options.channel_id.clone(),
                published_since: options.published_since,
            },
        )
        .await?;
        tracing::info!(run_id = run.id, batch_size, "Started baseline run");
        Ok(run)
    }

    /// Returns `Ok(true)` when every channel was processed, `Ok(false)` when
    /// cancelled first.
    async fn drive_run(&self, run: &BaselineRun, cancel: &CancellationToken) -> WorkerResult<bool> {
        let mut cursor = run.cursor.clone();
        let batch_size = usize::try_from(run.batch_size).unwrap_or(1).max(1);

        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }

            let request = BatchRequest {
                batch_size,
                cursor: cursor.clone(),
                offset: 0,
                channel_id: run.channel_filter.clone(),
                published_since: run.published_since,
            };
            let report = self.recompute_batch(&request, cancel).await?;

            BaselineRunRepo::advance(
                self.pool(),
                run.id,
                report.last_channel.as_deref(),
                report.channels_processed as i64,
                report.videos_written as i64,
            )
            .await?;
            cursor = report.next_cursor;

            if report.cancelled {
                return Ok(false);
            }
            if !report.has_more {
                if run.channel_filter.is_none() && run.published_since.is_none() {
                    let cleared = VideoRepo::clear_unplaced_baselines(self.pool()).await?;
                    if cleared > 0 {
                        tracing::info!(run_id = run.id, cleared, "Cleared values of unplaced videos");
                    }
                }
                return Ok(true);
            }
        }
    }
}
