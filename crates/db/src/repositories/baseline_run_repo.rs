//! Repository for the `baseline_runs` checkpoint table.

use sqlx::PgPool;
use viewline_core::types::DbId;

use crate::models::baseline_run::{BaselineRun, CreateBaselineRun, RunStatus, RunTrigger};

/// Column list for `baseline_runs` SELECT queries.
const COLUMNS: &str = "\
    id, trigger_kind, strategy, batch_size, channel_filter, published_since, \
    cursor, channels_processed, videos_written, status, error, \
    started_at, updated_at, finished_at";

/// Provides query operations for batch-run checkpoints.
pub struct BaselineRunRepo;

impl BaselineRunRepo {
    /// Record the start of a new run.
    pub async fn create(pool: &PgPool, input: &CreateBaselineRun) -> Result<BaselineRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO baseline_runs \
                (trigger_kind, strategy, batch_size, channel_filter, published_since) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BaselineRun>(&query)
            .bind(input.trigger.as_str())
            .bind(&input.strategy)
            .bind(input.batch_size)
            .bind(&input.channel_filter)
            .bind(input.published_since)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<BaselineRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM baseline_runs WHERE id = $1");
        sqlx::query_as::<_, BaselineRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The most recent unfinished run for `trigger`, if any.
    ///
    /// Runs left `running` by a crashed process, and runs that `failed` or
    /// were `cancelled`, are all resumable from their cursor.
    pub async fn find_resumable(
        pool: &PgPool,
        trigger: RunTrigger,
    ) -> Result<Option<BaselineRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM baseline_runs \
             WHERE trigger_kind = $1 AND status <> $2 \
             ORDER BY id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, BaselineRun>(&query)
            .bind(trigger.as_str())
            .bind(RunStatus::Completed.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Mark a resumed run as running again, clearing any previous error.
    pub async fn mark_running(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE baseline_runs \
             SET status = $2, error = NULL, finished_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(RunStatus::Running.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Commit progress after a batch: move the cursor and bump counters.
    pub async fn advance(
        pool: &PgPool,
        id: DbId,
        cursor: Option<&str>,
        channels: i64,
        videos: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE baseline_runs SET \
                cursor = COALESCE($2, cursor), \
                channels_processed = channels_processed + $3, \
                videos_written = videos_written + $4, \
                updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(cursor)
        .bind(channels)
        .bind(videos)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Move a run to a terminal (or resumable) state.
    pub async fn finish(
        pool: &PgPool,
        id: DbId,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE baseline_runs \
             SET status = $2, error = $3, finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }
}
