//! Command line interface of the `viewline-worker` binary.
//!
//! Without a subcommand the worker runs as a daemon. The other subcommands
//! are one-shot operator tools that print JSON to stdout.

use std::future::Future;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use viewline_core::baseline::BaselineStrategy;
use viewline_core::error::CoreError;
use viewline_core::types::{ChannelId, Timestamp, VideoId};
use viewline_db::models::baseline_run::RunTrigger;
use viewline_db::repositories::{ReportingRepo, VideoRepo};
use viewline_db::DbPool;

use crate::backfill::BackfillOptions;
use crate::config::WorkerConfig;
use crate::engine::{BaselineEngine, BatchRequest, EngineSettings};
use crate::error::WorkerResult;
use crate::ingest::IngestConsumer;
use crate::scheduler::BaselineScheduler;

#[derive(Debug, Parser)]
#[command(
    name = "viewline-worker",
    version,
    about = "Rolling baseline engine for channel video performance"
)]
pub struct Cli {
    /// Override BASELINE_STRATEGY for this invocation.
    #[arg(long, global = true)]
    pub strategy: Option<BaselineStrategy>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Migrate, then run the scheduler and ingest consumer (default)
    Run,
    /// Apply pending database migrations and exit
    Migrate,
    /// Recompute one video's baseline and score
    RecomputeVideo {
        video_id: VideoId,
    },
    /// Recompute a single page of channels
    RecomputeBatch {
        #[arg(long)]
        batch_size: Option<usize>,
        /// Start after this channel id
        #[arg(long)]
        cursor: Option<ChannelId>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// Only this channel
        #[arg(long)]
        channel: Option<ChannelId>,
        /// Only write videos published at or after this RFC 3339 instant
        #[arg(long)]
        since: Option<Timestamp>,
    },
    /// Recompute every channel in checkpointed batches
    Backfill {
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        channel: Option<ChannelId>,
        #[arg(long)]
        since: Option<Timestamp>,
        /// Continue the latest unfinished manual backfill
        #[arg(long)]
        resume: bool,
    },
    /// Refresh the reporting materialized view
    RefreshView,
    /// List the best performing videos from the reporting view
    Outliers {
        #[arg(long, default_value_t = 2.0)]
        min_score: f64,
        #[arg(long)]
        channel: Option<ChannelId>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Force or clear a video's short classification
    OverrideShort {
        video_id: VideoId,
        #[arg(value_enum)]
        value: ShortOverride,
    },
}

/// Operator choice for [`Command::OverrideShort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShortOverride {
    Short,
    Long,
    /// Go back to duration and hashtag detection
    Auto,
}

impl ShortOverride {
    fn as_override(self) -> Option<bool> {
        match self {
            Self::Short => Some(true),
            Self::Long => Some(false),
            Self::Auto => None,
        }
    }
}

impl Cli {
    /// The subcommand to run, defaulting to [`Command::Run`].
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Run)
    }

    /// Execute the parsed command.
    ///
    /// `shutdown` resolves when the daemon should stop; one-shot commands
    /// also stop between batches when it fires.
    pub async fn execute(
        &self,
        mut config: WorkerConfig,
        pool: DbPool,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> WorkerResult<()> {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        let engine = BaselineEngine::new(pool.clone(), EngineSettings::from(&config));

        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                shutdown.await;
                cancel.cancel();
            })
        };

        let result = self.dispatch(&config, &pool, engine, &cancel).await;
        watcher.abort();
        result
    }

    async fn dispatch(
        &self,
        config: &WorkerConfig,
        pool: &DbPool,
        engine: BaselineEngine,
        cancel: &CancellationToken,
    ) -> WorkerResult<()> {
        match self.command() {
            Command::Run => run_daemon(config, engine, cancel.clone()).await,
            Command::Migrate => {
                viewline_db::run_migrations(pool).await?;
                tracing::info!("Migrations applied");
                Ok(())
            }
            Command::RecomputeVideo { video_id } => {
                print_json(&engine.recompute_video(video_id).await?)
            }
            Command::RecomputeBatch {
                batch_size,
                cursor,
                offset,
                channel,
                since,
            } => {
                let request = BatchRequest {
                    batch_size: batch_size.unwrap_or(config.batch_size),
                    cursor: cursor.clone(),
                    offset: *offset,
                    channel_id: channel.clone(),
                    published_since: *since,
                };
                print_json(&engine.recompute_batch(&request, cancel).await?)
            }
            Command::Backfill {
                batch_size,
                channel,
                since,
                resume,
            } => {
                let options = BackfillOptions {
                    trigger: RunTrigger::Manual,
                    batch_size: batch_size.unwrap_or(config.batch_size),
                    channel_id: channel.clone(),
                    published_since: *since,
                    resume: *resume,
                };
                print_json(&engine.run_backfill(&options, cancel).await?)
            }
            Command::RefreshView => {
                ReportingRepo::refresh_baseline_view(pool).await?;
                tracing::info!("Baseline view refreshed");
                Ok(())
            }
            Command::Outliers {
                min_score,
                channel,
                limit,
            } => {
                let rows =
                    ReportingRepo::list_outliers(pool, *min_score, channel.as_deref(), *limit)
                        .await?;
                let rows: Vec<_> = rows
                    .into_iter()
                    .map(|row| {
                        let tier = row.tier().map(|t| t.as_str());
                        OutlierLine { row, tier }
                    })
                    .collect();
                print_json(&rows)
            }
            Command::OverrideShort { video_id, value } => {
                let found =
                    VideoRepo::set_short_override(pool, video_id, value.as_override()).await?;
                if !found {
                    return Err(CoreError::NotFound {
                        entity: "video",
                        id: video_id.clone(),
                    }
                    .into());
                }
                // Apply the new classification right away.
                print_json(&engine.recompute_video(video_id).await?)
            }
        }
    }
}

#[derive(Serialize)]
struct OutlierLine {
    #[serde(flatten)]
    row: viewline_db::models::reporting::BaselineViewRow,
    tier: Option<&'static str>,
}

fn print_json<T: Serialize>(value: &T) -> WorkerResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Migrate, then run the scheduler and ingest consumer until cancelled.
async fn run_daemon(
    config: &WorkerConfig,
    engine: BaselineEngine,
    cancel: CancellationToken,
) -> WorkerResult<()> {
    viewline_db::run_migrations(engine.pool()).await?;
    tracing::info!("Migrations applied");

    let scheduler = BaselineScheduler::new(
        engine.clone(),
        config.batch_size,
        config.baseline_interval,
        config.view_refresh_interval,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(cancel.clone()));

    let consumer = IngestConsumer::new(
        engine,
        config.ingest_poll_interval,
        config.ingest_claim_limit,
    );
    let consumer_handle = tokio::spawn(consumer.run(cancel.clone()));

    tracing::info!(strategy = %config.strategy, "Worker running");
    cancel.cancelled().await;

    tracing::info!("Shutting down background tasks");
    let grace = std::time::Duration::from_secs(5);
    let _ = tokio::time::timeout(grace, scheduler_handle).await;
    let _ = tokio::time::timeout(grace, consumer_handle).await;
    tracing::info!("Worker stopped");
    Ok(())
}
