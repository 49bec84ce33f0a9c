//! Repository for the `videos` table.
//!
//! Reads feed the baseline calculator; writes only ever touch the derived
//! columns (`rolling_baseline_views`, `temporal_performance_score`,
//! `baseline_computed_at`) plus the operator's `short_override`.

use sqlx::PgPool;
use viewline_core::types::{ChannelId, Timestamp};

use crate::models::video::{BaselineUpdate, CreateVideo, Video};

/// Column list for `videos` SELECT queries.
///
/// The score is `NUMERIC(8,3)` in storage and is read back as `float8`.
const COLUMNS: &str = "\
    video_id, channel_id, published_at, view_count, \
    duration, title, description, short_override, \
    rolling_baseline_views, \
    temporal_performance_score::float8 AS temporal_performance_score, \
    baseline_computed_at";

/// Maximum rows per multi-row UPDATE.
pub const WRITE_CHUNK_SIZE: usize = 500;

/// Provides query operations for videos.
pub struct VideoRepo;

impl VideoRepo {
    /// Insert a video. The ingest trigger queues it for a baseline recompute.
    pub async fn insert(pool: &PgPool, input: &CreateVideo) -> Result<Video, sqlx::Error> {
        let query = format!(
            "INSERT INTO videos \
                (video_id, channel_id, published_at, view_count, duration, title, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Video>(&query)
            .bind(&input.video_id)
            .bind(&input.channel_id)
            .bind(input.published_at)
            .bind(input.view_count)
            .bind(&input.duration)
            .bind(&input.title)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    /// Find a video by id.
    pub async fn find_by_id(pool: &PgPool, video_id: &str) -> Result<Option<Video>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM videos WHERE video_id = $1");
        sqlx::query_as::<_, Video>(&query)
            .bind(video_id)
            .fetch_optional(pool)
            .await
    }

    /// List a channel's dated videos in publish order.
    ///
    /// When `published_since` is given, only videos published at or after
    /// it are returned.
    pub async fn list_for_channel(
        pool: &PgPool,
        channel_id: &str,
        published_since: Option<Timestamp>,
    ) -> Result<Vec<Video>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM videos \
             WHERE channel_id = $1 \
               AND published_at IS NOT NULL \
               AND ($2::timestamptz IS NULL OR published_at >= $2) \
             ORDER BY published_at ASC, video_id ASC"
        );
        sqlx::query_as::<_, Video>(&query)
            .bind(channel_id)
            .bind(published_since)
            .fetch_all(pool)
            .await
    }

    /// List a channel's videos published in `[from, until)`, in publish order.
    pub async fn list_in_range(
        pool: &PgPool,
        channel_id: &str,
        from: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<Video>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM videos \
             WHERE channel_id = $1 \
               AND published_at >= $2 \
               AND published_at < $3 \
             ORDER BY published_at ASC, video_id ASC"
        );
        sqlx::query_as::<_, Video>(&query)
            .bind(channel_id)
            .bind(from)
            .bind(until)
            .fetch_all(pool)
            .await
    }

    /// Page through distinct channel ids in ascending order.
    ///
    /// `after` is a keyset cursor (exclusive); `offset` skips channels past
    /// the cursor. Only channels with at least one dated video are listed.
    pub async fn list_channel_ids(
        pool: &PgPool,
        after: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ChannelId>, sqlx::Error> {
        sqlx::query_scalar::<_, ChannelId>(
            "SELECT DISTINCT channel_id FROM videos \
             WHERE channel_id IS NOT NULL \
               AND published_at IS NOT NULL \
               AND ($1::text IS NULL OR channel_id > $1) \
             ORDER BY channel_id ASC \
             OFFSET $2 LIMIT $3",
        )
        .bind(after)
        .bind(offset)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Persist one video's derived values, overwriting any prior values.
    ///
    /// Returns `true` if the video exists.
    pub async fn write_baseline(pool: &PgPool, update: &BaselineUpdate) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE videos SET \
                rolling_baseline_views = $2, \
                temporal_performance_score = $3::numeric(8,3), \
                baseline_computed_at = NOW() \
             WHERE video_id = $1",
        )
        .bind(&update.video_id)
        .bind(update.rolling_baseline_views)
        .bind(update.temporal_performance_score)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear stored values of videos that have no channel or publish date.
    ///
    /// Channel passes never load these videos, so a value written before the
    /// channel or date was removed would otherwise stay. Returns the number
    /// of rows cleared.
    pub async fn clear_unplaced_baselines(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE videos SET \
                rolling_baseline_views = NULL, \
                temporal_performance_score = NULL, \
                baseline_computed_at = NOW() \
             WHERE (channel_id IS NULL OR published_at IS NULL) \
               AND (rolling_baseline_views IS NOT NULL \
                    OR temporal_performance_score IS NOT NULL)",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Persist derived values for many videos.
    ///
    /// Writes in chunks of [`WRITE_CHUNK_SIZE`] using `UNNEST`. Every row is
    /// an independent overwrite, so a failure part-way leaves earlier chunks
    /// intact and re-running is safe. Returns the number of rows updated.
    pub async fn write_baselines(
        pool: &PgPool,
        updates: &[BaselineUpdate],
    ) -> Result<u64, sqlx::Error> {
        let mut written = 0;

        for chunk in updates.chunks(WRITE_CHUNK_SIZE) {
            let ids: Vec<&str> = chunk.iter().map(|u| u.video_id.as_str()).collect();
            let baselines: Vec<Option<f64>> =
                chunk.iter().map(|u| u.rolling_baseline_views).collect();
            let scores: Vec<Option<f64>> =
                chunk.iter().map(|u| u.temporal_performance_score).collect();

            let result = sqlx::query(
                "UPDATE videos AS v SET \
                    rolling_baseline_views = u.baseline, \
                    temporal_performance_score = u.score::numeric(8,3), \
                    baseline_computed_at = NOW() \
                 FROM UNNEST($1::text[], $2::float8[], $3::float8[]) AS u(video_id, baseline, score) \
                 WHERE v.video_id = u.video_id",
            )
            .bind(&ids)
            .bind(&baselines)
            .bind(&scores)
            .execute(pool)
            .await?;

            written += result.rows_affected();
            tracing::debug!(
                chunk = chunk.len(),
                updated = result.rows_affected(),
                "Wrote baseline chunk"
            );
        }

        Ok(written)
    }

    /// Set or clear the operator's short classification override.
    ///
    /// Returns `true` if the video exists.
    pub async fn set_short_override(
        pool: &PgPool,
        video_id: &str,
        short_override: Option<bool>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE videos SET short_override = $2, updated_at = NOW() WHERE video_id = $1",
        )
        .bind(video_id)
        .bind(short_override)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
