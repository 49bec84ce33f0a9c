//! Integration tests for run checkpoints and the reporting view.

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use sqlx::PgPool;
use viewline_db::models::baseline_run::{CreateBaselineRun, RunStatus, RunTrigger};
use viewline_db::models::video::{BaselineUpdate, CreateVideo};
use viewline_db::repositories::{BaselineRunRepo, ReportingRepo, VideoRepo};
use viewline_core::score::PerformanceTier;

fn scheduled_run() -> CreateBaselineRun {
    CreateBaselineRun {
        trigger: RunTrigger::Scheduled,
        strategy: "incremental".to_string(),
        batch_size: 50,
        channel_filter: None,
        published_since: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn run_checkpoints_accumulate_and_resume(pool: PgPool) {
    let run = BaselineRunRepo::create(&pool, &scheduled_run()).await.unwrap();
    assert_eq!(run.status, RunStatus::Running.as_str());
    assert!(run.cursor.is_none());

    BaselineRunRepo::advance(&pool, run.id, Some("c2"), 2, 40).await.unwrap();
    BaselineRunRepo::advance(&pool, run.id, None, 0, 0).await.unwrap();

    let run = BaselineRunRepo::find_by_id(&pool, run.id).await.unwrap().unwrap();
    assert_eq!(run.cursor.as_deref(), Some("c2"));
    assert_eq!(run.channels_processed, 2);
    assert_eq!(run.videos_written, 40);

    BaselineRunRepo::finish(&pool, run.id, RunStatus::Failed, Some("statement timeout"))
        .await
        .unwrap();
    let resumable = BaselineRunRepo::find_resumable(&pool, RunTrigger::Scheduled)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resumable.id, run.id);
    assert_eq!(resumable.error.as_deref(), Some("statement timeout"));

    BaselineRunRepo::mark_running(&pool, run.id).await.unwrap();
    let resumed = BaselineRunRepo::find_by_id(&pool, run.id).await.unwrap().unwrap();
    assert_eq!(resumed.status, RunStatus::Running.as_str());
    assert!(resumed.error.is_none());

    BaselineRunRepo::finish(&pool, run.id, RunStatus::Completed, None)
        .await
        .unwrap();
    assert_matches!(
        BaselineRunRepo::find_resumable(&pool, RunTrigger::Scheduled).await,
        Ok(None)
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn manual_runs_are_not_resumed_as_scheduled(pool: PgPool) {
    let manual = CreateBaselineRun {
        trigger: RunTrigger::Manual,
        ..scheduled_run()
    };
    BaselineRunRepo::create(&pool, &manual).await.unwrap();

    assert_matches!(
        BaselineRunRepo::find_resumable(&pool, RunTrigger::Scheduled).await,
        Ok(None)
    );
    assert_matches!(
        BaselineRunRepo::find_resumable(&pool, RunTrigger::Manual).await,
        Ok(Some(_))
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn refreshed_view_lists_outliers(pool: PgPool) {
    let published_at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    for (id, channel) in [("a", "c1"), ("b", "c1"), ("c", "c2")] {
        VideoRepo::insert(
            &pool,
            &CreateVideo {
                video_id: id.to_string(),
                channel_id: Some(channel.to_string()),
                published_at: Some(published_at),
                view_count: 100,
                duration: None,
                title: String::new(),
                description: None,
            },
        )
        .await
        .unwrap();
    }
    let updates = [("a", 6.0), ("b", 1.0), ("c", 2.5)].map(|(id, score)| BaselineUpdate {
        video_id: id.to_string(),
        rolling_baseline_views: Some(10.0),
        temporal_performance_score: Some(score),
    });
    VideoRepo::write_baselines(&pool, &updates).await.unwrap();

    // The view is a cache: stale until refreshed.
    let stale = ReportingRepo::list_outliers(&pool, 2.0, None, 10).await.unwrap();
    assert!(stale.is_empty());

    ReportingRepo::refresh_baseline_view(&pool).await.unwrap();

    let outliers = ReportingRepo::list_outliers(&pool, 2.0, None, 10).await.unwrap();
    let ids: Vec<_> = outliers.iter().map(|r| r.video_id.as_str()).collect();
    assert_eq!(ids, ["a", "c"]);
    assert_eq!(outliers[0].tier(), Some(PerformanceTier::Breakout));
    assert_eq!(outliers[1].tier(), Some(PerformanceTier::Outperforming));

    let c1_only = ReportingRepo::list_outliers(&pool, 2.0, Some("c1"), 10).await.unwrap();
    assert_eq!(c1_only.len(), 1);
}
