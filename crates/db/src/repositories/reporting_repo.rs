//! Reporting surface over the `video_rolling_baselines` materialized view.

use sqlx::PgPool;

use crate::models::reporting::BaselineViewRow;

/// Name of the materialized view caching the engine's output.
pub const BASELINE_VIEW: &str = "video_rolling_baselines";

/// Provides refresh and read operations for the reporting view.
pub struct ReportingRepo;

impl ReportingRepo {
    /// Refresh the materialized view without blocking readers.
    pub async fn refresh_baseline_view(pool: &PgPool) -> Result<(), sqlx::Error> {
        let sql = format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {BASELINE_VIEW}");
        sqlx::query(&sql).execute(pool).await?;
        Ok(())
    }

    /// Videos scoring at least `min_score`, best first.
    pub async fn list_outliers(
        pool: &PgPool,
        min_score: f64,
        channel_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<BaselineViewRow>, sqlx::Error> {
        let query = format!(
            "SELECT video_id, channel_id, published_at, view_count, rolling_baseline_views, \
                    temporal_performance_score::float8 AS temporal_performance_score \
             FROM {BASELINE_VIEW} \
             WHERE temporal_performance_score >= $1 \
               AND ($2::text IS NULL OR channel_id = $2) \
             ORDER BY temporal_performance_score DESC, video_id ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, BaselineViewRow>(&query)
            .bind(min_score)
            .bind(channel_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
