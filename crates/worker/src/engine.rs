//! Baseline engine: loads videos, runs the calculator, writes results back.
//!
//! Two entry points:
//!
//! - [`BaselineEngine::recompute_video`] recomputes one video from its
//!   trailing window. Used by the ingest consumer.
//! - [`BaselineEngine::recompute_batch`] recomputes a page of whole
//!   channels and reports the cursor of the next page. Used by backfills
//!   and the nightly correction pass.
//!
//! Every write is an independent overwrite, so re-running any entry point
//! over the same data is harmless.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use viewline_core::baseline::{compute_for_video, BaselineKind, BaselineRow, BaselineStrategy};
use viewline_core::error::CoreError;
use viewline_core::shorts::ShortPolicy;
use viewline_core::types::{ChannelId, Timestamp};
use viewline_core::window::window_start;
use viewline_db::models::video::{BaselineUpdate, Video};
use viewline_db::repositories::VideoRepo;

use crate::config::{WorkerConfig, MAX_BATCH_SIZE};
use crate::error::WorkerResult;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Tunables for the engine, usually taken from [`WorkerConfig`].
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub strategy: BaselineStrategy,
    pub short_policy: ShortPolicy,
    /// Channels computed concurrently within a batch.
    pub concurrency: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            strategy: BaselineStrategy::default(),
            short_policy: ShortPolicy::default(),
            concurrency: 4,
        }
    }
}

impl From<&WorkerConfig> for EngineSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            strategy: config.strategy,
            short_policy: config.short_policy,
            concurrency: config.concurrency,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and reports
// ---------------------------------------------------------------------------

/// One page of channels to recompute.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    /// Channels per batch, `1..=MAX_BATCH_SIZE`.
    pub batch_size: usize,
    /// Resume after this channel id (exclusive).
    pub cursor: Option<ChannelId>,
    /// Channels to skip past the cursor. Only meaningful for the first page;
    /// follow-up pages should pass the returned cursor with offset 0.
    pub offset: i64,
    /// Restrict the batch to a single channel.
    pub channel_id: Option<ChannelId>,
    /// Only write videos published at or after this instant. Older videos
    /// are still read as window peers.
    pub published_since: Option<Timestamp>,
}

impl BatchRequest {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(CoreError::Validation(format!(
                "batch size must be in 1..={MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.offset < 0 {
            return Err(CoreError::Validation(format!(
                "offset must be >= 0, got {}",
                self.offset
            )));
        }
        Ok(())
    }
}

/// Outcome of recomputing one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub channel_id: ChannelId,
    pub videos_written: u64,
    pub shorts: usize,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Channels fully processed, in cursor order.
    pub channels_processed: usize,
    pub videos_written: u64,
    pub shorts: usize,
    /// Last channel of the completed prefix.
    pub last_channel: Option<ChannelId>,
    /// Another page exists after this one.
    pub has_more: bool,
    /// Cancellation stopped the batch before every channel ran.
    pub cancelled: bool,
    /// Cursor to pass to the next batch.
    pub next_cursor: Option<ChannelId>,
}

impl BatchReport {
    /// Whether the run this batch belongs to has nothing left to do.
    pub fn is_final(&self) -> bool {
        !self.has_more && !self.cancelled
    }

    fn absorb(&mut self, channel: ChannelReport) {
        self.channels_processed += 1;
        self.videos_written += channel.videos_written;
        self.shorts += channel.shorts;
        self.last_channel = Some(channel.channel_id);
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Computes and persists rolling baselines.
#[derive(Debug, Clone)]
pub struct BaselineEngine {
    pool: PgPool,
    settings: EngineSettings,
}

impl BaselineEngine {
    pub fn new(pool: PgPool, settings: EngineSettings) -> Self {
        Self { pool, settings }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Recompute and persist one video's baseline and score.
    ///
    /// Only the video's own trailing window is read. A video without a channel
    /// or publish date has no window, so its stored values are cleared.
    /// Long-form videos in that state are reported as
    /// [`BaselineKind::Ineligible`].
    #[tracing::instrument(skip(self))]
    pub async fn recompute_video(&self, video_id: &str) -> WorkerResult<BaselineRow> {
        let video = VideoRepo::find_by_id(&self.pool, video_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "video",
                id: video_id.to_string(),
            })?;

        let policy = &self.settings.short_policy;
        let subject = video.to_observation(policy);

        let peers = match (video.channel_id.as_deref(), video.published_at) {
            (Some(channel_id), Some(published_at)) => {
                VideoRepo::list_in_range(
                    &self.pool,
                    channel_id,
                    window_start(published_at),
                    published_at,
                )
                .await?
                .iter()
                .map(|v| v.to_observation(policy))
                .collect()
            }
            _ => Vec::new(),
        };

        let row = compute_for_video(&subject, &peers);
        VideoRepo::write_baseline(&self.pool, &BaselineUpdate::from(&row)).await?;

        tracing::debug!(
            peers = peers.len(),
            kind = ?row.kind,
            baseline = ?row.rolling_baseline_views,
            score = ?row.temporal_performance_score,
            "Recomputed video baseline"
        );
        Ok(row)
    }

    /// Recompute one whole channel.
    ///
    /// With `published_since`, history back to that instant's window start is
    /// loaded so the written videos still see their full window.
    #[tracing::instrument(skip(self))]
    pub async fn recompute_channel(
        &self,
        channel_id: &str,
        published_since: Option<Timestamp>,
    ) -> WorkerResult<ChannelReport> {
        let videos =
            VideoRepo::list_for_channel(&self.pool, channel_id, published_since.map(window_start))
                .await?;

        let policy = &self.settings.short_policy;
        let observations: Vec<_> = videos.iter().map(|v| v.to_observation(policy)).collect();
        let rows = self.settings.strategy.compute(&observations);

        let mut report = ChannelReport {
            channel_id: channel_id.to_string(),
            ..ChannelReport::default()
        };

        let updates: Vec<BaselineUpdate> = rows
            .iter()
            .zip(&videos)
            .filter(|(_, video)| is_due(video, published_since))
            .map(|(row, _)| {
                if row.kind == BaselineKind::Short {
                    report.shorts += 1;
                }
                BaselineUpdate::from(row)
            })
            .collect();

        report.videos_written = VideoRepo::write_baselines(&self.pool, &updates).await?;

        tracing::debug!(
            videos = videos.len(),
            written = report.videos_written,
            shorts = report.shorts,
            "Recomputed channel"
        );
        Ok(report)
    }

    /// Recompute one page of channels.
    ///
    /// Channels run concurrently (up to `concurrency` at a time) but results
    /// are consumed in cursor order, so `last_channel` always marks a
    /// contiguous prefix of completed channels. Cancellation is checked
    /// before each channel starts; a cancelled batch reports the prefix it
    /// finished. A storage error fails the whole batch; channels written
    /// before the error keep their new values and are simply redone on retry.
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(
            strategy = %self.settings.strategy,
            batch_size = request.batch_size,
            cursor = ?request.cursor,
            channel = ?request.channel_id,
        )
    )]
    pub async fn recompute_batch(
        &self,
        request: &BatchRequest,
        cancel: &CancellationToken,
    ) -> WorkerResult<BatchReport> {
        request.validate()?;

        let (channels, has_more) = self.next_channels(request).await?;
        let mut report = BatchReport {
            has_more,
            ..BatchReport::default()
        };

        let since = request.published_since;
        let mut results = stream::iter(channels)
            .map(|channel_id| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(self.recompute_channel(&channel_id, since).await)
            })
            .buffered(self.settings.concurrency.max(1));

        while let Some(result) = results.next().await {
            match result {
                Some(channel) => report.absorb(channel?),
                None => {
                    report.cancelled = true;
                    break;
                }
            }
        }

        report.next_cursor = report
            .last_channel
            .clone()
            .or_else(|| request.cursor.clone());

        tracing::info!(
            channels = report.channels_processed,
            videos = report.videos_written,
            shorts = report.shorts,
            has_more = report.has_more,
            cancelled = report.cancelled,
            next_cursor = ?report.next_cursor,
            "Baseline batch finished"
        );
        Ok(report)
    }

    /// Channel ids for this page, and whether another page follows.
    async fn next_channels(&self, request: &BatchRequest) -> WorkerResult<(Vec<ChannelId>, bool)> {
        if let Some(channel_id) = &request.channel_id {
            let already_done = request.offset > 0
                || request
                    .cursor
                    .as_deref()
                    .is_some_and(|cursor| cursor >= channel_id.as_str());
            let channels = if already_done {
                Vec::new()
            } else {
                vec![channel_id.clone()]
            };
            return Ok((channels, false));
        }

        // One extra row tells us whether another page exists.
        let limit = request.batch_size as i64 + 1;
        let mut channels = VideoRepo::list_channel_ids(
            &self.pool,
            request.cursor.as_deref(),
            request.offset,
            limit,
        )
        .await?;
        let has_more = channels.len() > request.batch_size;
        channels.truncate(request.batch_size);
        Ok((channels, has_more))
    }
}

/// Whether a video falls inside the `published_since` write range.
fn is_due(video: &Video, published_since: Option<Timestamp>) -> bool {
    match (published_since, video.published_at) {
        (None, _) => true,
        (Some(since), Some(published_at)) => published_at >= since,
        (Some(_), None) => false,
    }
}
