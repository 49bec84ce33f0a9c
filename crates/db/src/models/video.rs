//! Video catalog rows and the engine's write DTO.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use viewline_core::baseline::{BaselineRow, Observation};
use viewline_core::shorts::ShortPolicy;
use viewline_core::types::{ChannelId, Timestamp, VideoId};

/// A row from the `videos` table.
///
/// `temporal_performance_score` is selected as `float8`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Video {
    pub video_id: VideoId,
    pub channel_id: Option<ChannelId>,
    pub published_at: Option<Timestamp>,
    pub view_count: i64,
    pub duration: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub short_override: Option<bool>,
    pub rolling_baseline_views: Option<f64>,
    pub temporal_performance_score: Option<f64>,
    pub baseline_computed_at: Option<Timestamp>,
}

impl Video {
    /// Whether `policy` classifies this video as a short.
    pub fn is_short(&self, policy: &ShortPolicy) -> bool {
        policy.classify(
            self.short_override,
            self.duration.as_deref(),
            Some(self.title.as_str()),
            self.description.as_deref(),
        )
    }

    /// Project the row into the calculator's input.
    pub fn to_observation(&self, policy: &ShortPolicy) -> Observation {
        Observation {
            video_id: self.video_id.clone(),
            channel_id: self.channel_id.clone(),
            published_at: self.published_at,
            view_count: self.view_count,
            is_short: self.is_short(policy),
        }
    }
}

/// DTO for inserting a video (ingest path and tests).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVideo {
    pub video_id: VideoId,
    pub channel_id: Option<ChannelId>,
    pub published_at: Option<Timestamp>,
    pub view_count: i64,
    pub duration: Option<String>,
    pub title: String,
    pub description: Option<String>,
}

/// Derived values written back for one video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineUpdate {
    pub video_id: VideoId,
    pub rolling_baseline_views: Option<f64>,
    pub temporal_performance_score: Option<f64>,
}

impl From<&BaselineRow> for BaselineUpdate {
    fn from(row: &BaselineRow) -> Self {
        Self {
            video_id: row.video_id.clone(),
            rolling_baseline_views: row.rolling_baseline_views,
            temporal_performance_score: row.temporal_performance_score,
        }
    }
}
