//! Rows of the `video_rolling_baselines` materialized view.

use serde::Serialize;
use sqlx::FromRow;
use viewline_core::score::{classify_score, PerformanceTier};
use viewline_core::types::{ChannelId, Timestamp, VideoId};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BaselineViewRow {
    pub video_id: VideoId,
    pub channel_id: ChannelId,
    pub published_at: Timestamp,
    pub view_count: i64,
    pub rolling_baseline_views: Option<f64>,
    pub temporal_performance_score: Option<f64>,
}

impl BaselineViewRow {
    pub fn tier(&self) -> Option<PerformanceTier> {
        self.temporal_performance_score.map(classify_score)
    }
}
