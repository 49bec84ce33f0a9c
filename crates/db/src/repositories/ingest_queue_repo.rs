//! Repository for `baseline_ingest_queue`.
//!
//! Rows are added by the `viewline_video_ingested` trigger on `videos` and
//! removed when a worker claims them.

use sqlx::PgPool;
use viewline_core::types::VideoId;

/// Provides queue operations for freshly ingested videos.
pub struct IngestQueueRepo;

impl IngestQueueRepo {
    /// Atomically claim up to `limit` queued videos, oldest first.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
    /// same row. Claimed rows are deleted; callers re-[`enqueue`](Self::enqueue)
    /// on failure.
    pub async fn claim(pool: &PgPool, limit: i64) -> Result<Vec<VideoId>, sqlx::Error> {
        sqlx::query_scalar::<_, VideoId>(
            "DELETE FROM baseline_ingest_queue \
             WHERE video_id IN ( \
                 SELECT video_id FROM baseline_ingest_queue \
                 ORDER BY enqueued_at ASC, video_id ASC \
                 LIMIT $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING video_id",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Put a video (back) on the queue. No-op if it is already queued.
    pub async fn enqueue(pool: &PgPool, video_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO baseline_ingest_queue (video_id) VALUES ($1) \
             ON CONFLICT (video_id) DO NOTHING",
        )
        .bind(video_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Number of videos waiting.
    pub async fn depth(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM baseline_ingest_queue")
            .fetch_one(pool)
            .await
    }
}
