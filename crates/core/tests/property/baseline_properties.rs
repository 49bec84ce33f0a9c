use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use viewline_core::baseline::{
    compute_for_video, compute_incremental, compute_self_join, BaselineKind, BaselineRow,
    Observation,
};
use viewline_core::score::MAX_PERFORMANCE_SCORE;
use viewline_core::types::Timestamp;
use viewline_core::window::window_start;

fn epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

/// Videos spread over ~4 years (two leap days) across three channels. Day
/// granularity with a few fixed hours makes same-instant ties and exact
/// window-boundary hits likely.
fn arb_observation() -> impl Strategy<Value = Observation> {
    (
        prop::option::weighted(0.95, prop::sample::select(vec!["c1", "c2", "c3"])),
        prop::option::weighted(0.95, (0i64..1_500, prop::sample::select(vec![0i64, 9, 21]))),
        prop_oneof![Just(0i64), 1i64..1_000_000, Just(10_000_000_000i64)],
        prop::bool::weighted(0.2),
    )
        .prop_map(|(channel, at, views, is_short)| Observation {
            video_id: String::new(),
            channel_id: channel.map(str::to_string),
            published_at: at.map(|(d, h)| epoch() + Duration::days(d) + Duration::hours(h)),
            view_count: views,
            is_short,
        })
}

fn arb_dataset() -> impl Strategy<Value = Vec<Observation>> {
    prop::collection::vec(arb_observation(), 0..60).prop_map(|mut obs| {
        for (i, o) in obs.iter_mut().enumerate() {
            o.video_id = format!("v{i:03}");
        }
        obs
    })
}

fn row<'a>(rows: &'a [BaselineRow], id: &str) -> &'a BaselineRow {
    rows.iter().find(|r| r.video_id == id).unwrap()
}

proptest! {
    #[test]
    fn strategies_agree(obs in arb_dataset()) {
        prop_assert_eq!(compute_incremental(&obs), compute_self_join(&obs));
    }

    #[test]
    fn recomputation_is_idempotent(obs in arb_dataset()) {
        prop_assert_eq!(compute_incremental(&obs), compute_incremental(&obs));
        prop_assert_eq!(compute_self_join(&obs), compute_self_join(&obs));
    }

    #[test]
    fn input_order_does_not_matter(obs in arb_dataset()) {
        let mut reversed = obs.clone();
        reversed.reverse();
        let forward = compute_incremental(&obs);
        let backward = compute_incremental(&reversed);
        for r in &forward {
            prop_assert_eq!(r, row(&backward, &r.video_id));
        }
    }

    #[test]
    fn shorts_never_hold_values(obs in arb_dataset()) {
        for (o, r) in obs.iter().zip(compute_incremental(&obs)) {
            if o.is_short {
                prop_assert_eq!(r.kind, BaselineKind::Short);
                prop_assert_eq!(r.rolling_baseline_views, None);
                prop_assert_eq!(r.temporal_performance_score, None);
            }
        }
    }

    #[test]
    fn scores_stay_within_storage_range(obs in arb_dataset()) {
        for r in compute_incremental(&obs) {
            if let Some(score) = r.temporal_performance_score {
                prop_assert!((0.0..=MAX_PERFORMANCE_SCORE).contains(&score));
            }
        }
    }

    /// Changing anything at or after a video's publish instant, or before
    /// its window, must not change its baseline.
    #[test]
    fn baseline_ignores_videos_outside_window(obs in arb_dataset(), bump in 1i64..1_000) {
        let expected = compute_incremental(&obs);

        for (idx, subject) in obs.iter().enumerate() {
            let (Some(channel), Some(at)) = (&subject.channel_id, subject.published_at) else {
                continue;
            };
            let lower = window_start(at);

            let mut mutated = obs.clone();
            for (j, o) in mutated.iter_mut().enumerate() {
                let outside = o.published_at.is_some_and(|t| t >= at || t < lower);
                if j != idx && o.channel_id.as_ref() == Some(channel) && outside {
                    o.view_count += bump;
                    o.is_short = !o.is_short;
                }
            }

            let recomputed = compute_for_video(&mutated[idx], &mutated);
            prop_assert_eq!(
                recomputed.rolling_baseline_views,
                expected[idx].rolling_baseline_views
            );
        }
    }

    #[test]
    fn shorts_never_contribute(obs in arb_dataset(), extra in 1i64..10_000_000) {
        let expected = compute_self_join(&obs);
        let mut mutated = obs.clone();
        for o in mutated.iter_mut().filter(|o| o.is_short) {
            o.view_count += extra;
        }
        let recomputed = compute_self_join(&mutated);
        for (a, b) in expected.iter().zip(&recomputed) {
            prop_assert_eq!(a.rolling_baseline_views, b.rolling_baseline_views);
        }
    }
}
