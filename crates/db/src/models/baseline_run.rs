//! Checkpoint records for resumable batch runs.

use serde::Serialize;
use sqlx::FromRow;
use viewline_core::types::{ChannelId, DbId, Timestamp};

/// Who started a run. Scheduled runs are resumed automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

impl RunTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A row from the `baseline_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BaselineRun {
    pub id: DbId,
    pub trigger_kind: String,
    pub strategy: String,
    pub batch_size: i32,
    pub channel_filter: Option<ChannelId>,
    pub published_since: Option<Timestamp>,
    pub cursor: Option<ChannelId>,
    pub channels_processed: i64,
    pub videos_written: i64,
    pub status: String,
    pub error: Option<String>,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

/// DTO for starting a run.
#[derive(Debug, Clone)]
pub struct CreateBaselineRun {
    pub trigger: RunTrigger,
    pub strategy: String,
    pub batch_size: i32,
    pub channel_filter: Option<ChannelId>,
    pub published_since: Option<Timestamp>,
}
