//! Rolling baseline calculation.
//!
//! For every long-form video the baseline is the mean view count of the
//! same channel's long-form, positive-view videos published inside the
//! trailing window `[published_at - 1 year, published_at)`.
//!
//! Two strategies are provided and must agree exactly:
//!
//! - [`BaselineStrategy::Incremental`] walks each channel in publish order
//!   with a [`TrailingWindow`], evicting entries as the window slides.
//! - [`BaselineStrategy::SelfJoin`] aggregates every peer directly for each
//!   video. Quadratic per channel; fine for small channels and for
//!   single-video recomputes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::score::{clamp_baseline, performance_score};
use crate::types::{ChannelId, Timestamp, VideoId};
use crate::window::{in_window, mean, window_start, TrailingWindow};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// A video as seen by the baseline calculator, already classified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub video_id: VideoId,
    pub channel_id: Option<ChannelId>,
    pub published_at: Option<Timestamp>,
    pub view_count: i64,
    pub is_short: bool,
}

impl Observation {
    /// Channel and publish date, if the video can take part in baselines at all.
    fn placement(&self) -> Option<(&str, Timestamp)> {
        Some((self.channel_id.as_deref()?, self.published_at?))
    }

    /// Whether this video may count towards other videos' baselines.
    fn contributes(&self) -> bool {
        !self.is_short && self.view_count > 0 && self.placement().is_some()
    }
}

/// How a video was treated by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineKind {
    /// Long-form video; baseline may still be `None` for an empty window.
    LongForm,
    /// Short video; baseline and score are always `None`.
    Short,
    /// Long-form video missing its channel or publish date. Takes no part in
    /// any window; its stored values are cleared.
    Ineligible,
}

/// Computed baseline and score for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRow {
    pub video_id: VideoId,
    pub kind: BaselineKind,
    pub rolling_baseline_views: Option<f64>,
    pub temporal_performance_score: Option<f64>,
}

impl BaselineRow {
    fn long_form(subject: &Observation, baseline: Option<f64>) -> Self {
        let baseline = baseline.map(clamp_baseline);
        Self {
            video_id: subject.video_id.clone(),
            kind: BaselineKind::LongForm,
            rolling_baseline_views: baseline,
            temporal_performance_score: performance_score(subject.view_count, baseline),
        }
    }

    fn empty(subject: &Observation, kind: BaselineKind) -> Self {
        Self {
            video_id: subject.video_id.clone(),
            kind,
            rolling_baseline_views: None,
            temporal_performance_score: None,
        }
    }

    /// Row for a video that cannot be placed in any window.
    fn unplaced(subject: &Observation) -> Self {
        let kind = if subject.is_short {
            BaselineKind::Short
        } else {
            BaselineKind::Ineligible
        };
        Self::empty(subject, kind)
    }
}

// ---------------------------------------------------------------------------
// Strategy selection
// ---------------------------------------------------------------------------

/// Algorithm used for bulk computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineStrategy {
    #[default]
    Incremental,
    SelfJoin,
}

impl BaselineStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::SelfJoin => "self_join",
        }
    }

    /// Compute baselines for every observation, returned in input order.
    pub fn compute(self, observations: &[Observation]) -> Vec<BaselineRow> {
        match self {
            Self::Incremental => compute_incremental(observations),
            Self::SelfJoin => compute_self_join(observations),
        }
    }
}

impl fmt::Display for BaselineStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaselineStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" | "windowed" => Ok(Self::Incremental),
            "self_join" | "self-join" | "batch" => Ok(Self::SelfJoin),
            other => Err(CoreError::Validation(format!(
                "unknown baseline strategy '{other}' (expected 'incremental' or 'self_join')"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Single video
// ---------------------------------------------------------------------------

/// Compute the baseline of `subject` from `peers`.
///
/// `peers` may contain anything (other channels, the subject itself, future
/// videos); only valid contributors inside the subject's window are used.
pub fn compute_for_video(subject: &Observation, peers: &[Observation]) -> BaselineRow {
    let Some((channel_id, published_at)) = subject.placement() else {
        return BaselineRow::unplaced(subject);
    };
    if subject.is_short {
        return BaselineRow::empty(subject, BaselineKind::Short);
    }

    let (sum, count) = peers
        .iter()
        .filter(|p| p.contributes())
        .filter_map(|p| p.placement().map(|(c, t)| (c, t, p.view_count)))
        .filter(|(c, t, _)| *c == channel_id && in_window(published_at, *t))
        .fold((0i128, 0u64), |(sum, count), (_, _, views)| {
            (sum + i128::from(views), count + 1)
        });

    BaselineRow::long_form(subject, mean(sum, count))
}

// ---------------------------------------------------------------------------
// Self-join strategy
// ---------------------------------------------------------------------------

/// Direct aggregation over every same-channel peer, per video.
pub fn compute_self_join(observations: &[Observation]) -> Vec<BaselineRow> {
    let mut by_channel: HashMap<&str, Vec<Observation>> = HashMap::new();
    for obs in observations.iter().filter(|o| o.contributes()) {
        if let Some((channel_id, _)) = obs.placement() {
            by_channel.entry(channel_id).or_default().push(obs.clone());
        }
    }

    observations
        .iter()
        .map(|subject| {
            let peers = subject
                .channel_id
                .as_deref()
                .and_then(|c| by_channel.get(c))
                .map(Vec::as_slice)
                .unwrap_or_default();
            compute_for_video(subject, peers)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Incremental strategy
// ---------------------------------------------------------------------------

/// Sliding-window computation, one pass per channel in publish order.
pub fn compute_incremental(observations: &[Observation]) -> Vec<BaselineRow> {
    let mut rows: Vec<Option<BaselineRow>> = vec![None; observations.len()];

    // channel -> indices into `observations`
    let mut by_channel: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, obs) in observations.iter().enumerate() {
        match obs.placement() {
            Some((channel_id, _)) => by_channel.entry(channel_id).or_default().push(idx),
            None => rows[idx] = Some(BaselineRow::unplaced(obs)),
        }
    }

    for indices in by_channel.values_mut() {
        indices.sort_by(|&a, &b| {
            let (a, b) = (&observations[a], &observations[b]);
            a.published_at
                .cmp(&b.published_at)
                .then_with(|| a.video_id.cmp(&b.video_id))
        });
        walk_channel(observations, indices, &mut rows);
    }

    rows.into_iter()
        .zip(observations)
        .map(|(row, obs)| row.unwrap_or_else(|| BaselineRow::unplaced(obs)))
        .collect()
}

/// Walk one channel's videos (sorted by publish date) through the window.
///
/// Videos sharing a timestamp are evaluated together before any of them
/// enters the window, so none sees its same-instant siblings.
fn walk_channel(observations: &[Observation], sorted: &[usize], rows: &mut [Option<BaselineRow>]) {
    let mut window = TrailingWindow::new();
    let mut start = 0;

    while start < sorted.len() {
        let published_at = observations[sorted[start]].published_at;
        let end = sorted[start..]
            .iter()
            .position(|&i| observations[i].published_at != published_at)
            .map_or(sorted.len(), |offset| start + offset);
        let group = &sorted[start..end];

        if let Some(published_at) = published_at {
            window.evict_before(window_start(published_at));
        }
        let baseline = window.mean();

        for &idx in group {
            let subject = &observations[idx];
            rows[idx] = Some(if subject.is_short {
                BaselineRow::empty(subject, BaselineKind::Short)
            } else {
                BaselineRow::long_form(subject, baseline)
            });
        }

        for &idx in group {
            let obs = &observations[idx];
            if let (true, Some(published_at)) = (obs.contributes(), obs.published_at) {
                window.push(published_at, obs.view_count);
            }
        }

        start = end;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Months, TimeZone, Utc};

    use super::*;
    use crate::score::MAX_PERFORMANCE_SCORE;

    fn month(n: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2022, 1, 10, 9, 0, 0).unwrap() + Months::new(n)
    }

    fn video(id: &str, channel: &str, published_at: Timestamp, views: i64) -> Observation {
        Observation {
            video_id: id.to_string(),
            channel_id: Some(channel.to_string()),
            published_at: Some(published_at),
            view_count: views,
            is_short: false,
        }
    }

    fn short(id: &str, channel: &str, published_at: Timestamp, views: i64) -> Observation {
        Observation {
            is_short: true,
            ..video(id, channel, published_at, views)
        }
    }

    fn both(observations: &[Observation]) -> Vec<BaselineRow> {
        let incremental = compute_incremental(observations);
        let self_join = compute_self_join(observations);
        assert_eq!(incremental, self_join, "strategies disagree");
        incremental
    }

    fn baseline_of<'a>(rows: &'a [BaselineRow], id: &str) -> &'a BaselineRow {
        rows.iter().find(|r| r.video_id == id).expect("row present")
    }

    // -- pinned scenarios -----------------------------------------------------

    #[test]
    fn month_zero_falls_outside_month_thirteen_window() {
        let obs = [
            video("a", "c", month(0), 100),
            video("b", "c", month(6), 200),
            video("d", "c", month(13), 400),
        ];
        let rows = both(&obs);

        assert_eq!(baseline_of(&rows, "a").rolling_baseline_views, None);
        assert_eq!(baseline_of(&rows, "b").rolling_baseline_views, Some(100.0));
        assert_eq!(baseline_of(&rows, "d").rolling_baseline_views, Some(200.0));
        assert_eq!(baseline_of(&rows, "d").temporal_performance_score, Some(2.0));
    }

    #[test]
    fn video_exactly_one_year_earlier_is_included() {
        let obs = [
            video("a", "c", month(0), 100),
            video("b", "c", month(6), 200),
            video("d", "c", month(12), 400),
        ];
        let rows = both(&obs);
        assert_eq!(baseline_of(&rows, "d").rolling_baseline_views, Some(150.0));
    }

    #[test]
    fn big_short_inside_window_does_not_move_baseline() {
        let obs = [
            video("a", "c", month(0), 100),
            short("s", "c", month(1), 5_000_000),
            video("b", "c", month(2), 300),
            video("d", "c", month(3), 50),
        ];
        let rows = both(&obs);
        assert_eq!(baseline_of(&rows, "d").rolling_baseline_views, Some(200.0));
    }

    // -- invariants -----------------------------------------------------------

    #[test]
    fn first_video_has_no_baseline() {
        let rows = both(&[video("a", "c", month(0), 100)]);
        assert_eq!(rows[0].kind, BaselineKind::LongForm);
        assert_eq!(rows[0].rolling_baseline_views, None);
        assert_eq!(rows[0].temporal_performance_score, None);
    }

    #[test]
    fn shorts_never_receive_a_baseline() {
        let obs = [
            video("a", "c", month(0), 100),
            short("s", "c", month(1), 10),
        ];
        let rows = both(&obs);
        let s = baseline_of(&rows, "s");
        assert_eq!(s.kind, BaselineKind::Short);
        assert_eq!(s.rolling_baseline_views, None);
        assert_eq!(s.temporal_performance_score, None);
    }

    #[test]
    fn zero_view_videos_do_not_contribute() {
        let obs = [
            video("a", "c", month(0), 0),
            video("b", "c", month(1), 100),
            video("d", "c", month(2), 10),
        ];
        let rows = both(&obs);
        assert_eq!(baseline_of(&rows, "b").rolling_baseline_views, None);
        assert_eq!(baseline_of(&rows, "d").rolling_baseline_views, Some(100.0));
    }

    #[test]
    fn same_instant_videos_do_not_see_each_other() {
        let obs = [
            video("a", "c", month(0), 100),
            video("b", "c", month(1), 300),
            video("x", "c", month(1), 500),
            video("d", "c", month(2), 1),
        ];
        let rows = both(&obs);
        assert_eq!(baseline_of(&rows, "b").rolling_baseline_views, Some(100.0));
        assert_eq!(baseline_of(&rows, "x").rolling_baseline_views, Some(100.0));
        assert_eq!(baseline_of(&rows, "d").rolling_baseline_views, Some(300.0));
    }

    #[test]
    fn channels_are_independent() {
        let obs = [
            video("a1", "a", month(0), 1_000),
            video("b1", "b", month(0), 10),
            video("a2", "a", month(1), 1),
            video("b2", "b", month(1), 1),
        ];
        let rows = both(&obs);
        assert_eq!(baseline_of(&rows, "a2").rolling_baseline_views, Some(1_000.0));
        assert_eq!(baseline_of(&rows, "b2").rolling_baseline_views, Some(10.0));
    }

    #[test]
    fn missing_channel_or_date_is_ineligible_and_invisible() {
        let mut orphan = video("o", "c", month(1), 9_999);
        orphan.channel_id = None;
        let mut undated = video("u", "c", month(1), 9_999);
        undated.published_at = None;

        let obs = [
            video("a", "c", month(0), 100),
            orphan,
            undated,
            video("d", "c", month(2), 100),
        ];
        let rows = both(&obs);

        assert_matches!(baseline_of(&rows, "o").kind, BaselineKind::Ineligible);
        assert_matches!(baseline_of(&rows, "u").kind, BaselineKind::Ineligible);
        assert_eq!(baseline_of(&rows, "o").rolling_baseline_views, None);
        assert_eq!(baseline_of(&rows, "d").rolling_baseline_views, Some(100.0));
    }

    #[test]
    fn undated_short_is_still_a_short() {
        let mut undated = short("s", "c", month(1), 500);
        undated.published_at = None;
        let mut orphan = short("o", "c", month(1), 500);
        orphan.channel_id = None;

        let rows = both(&[video("a", "c", month(0), 100), undated.clone(), orphan]);
        for id in ["s", "o"] {
            let row = baseline_of(&rows, id);
            assert_eq!(row.kind, BaselineKind::Short);
            assert_eq!(row.rolling_baseline_views, None);
            assert_eq!(row.temporal_performance_score, None);
        }
        assert_eq!(compute_for_video(&undated, &[]).kind, BaselineKind::Short);
    }

    #[test]
    fn rows_come_back_in_input_order() {
        let obs = [
            video("late", "c", month(5), 10),
            video("early", "c", month(0), 10),
        ];
        let ids: Vec<_> = both(&obs).into_iter().map(|r| r.video_id).collect();
        assert_eq!(ids, ["late", "early"]);
    }

    #[test]
    fn huge_ratio_is_clamped() {
        let obs = [
            video("a", "c", month(0), 1),
            video("b", "c", month(1), 10_000_000_000),
        ];
        let rows = both(&obs);
        assert_eq!(
            baseline_of(&rows, "b").temporal_performance_score,
            Some(MAX_PERFORMANCE_SCORE)
        );
    }

    // -- single video ---------------------------------------------------------

    #[test]
    fn single_video_ignores_itself_future_and_other_channels() {
        let subject = video("s", "c", month(6), 500);
        let peers = [
            subject.clone(),
            video("p", "c", month(3), 100),
            video("f", "c", month(7), 1_000_000),
            video("o", "other", month(4), 1_000_000),
        ];
        let row = compute_for_video(&subject, &peers);
        assert_eq!(row.rolling_baseline_views, Some(100.0));
        assert_eq!(row.temporal_performance_score, Some(5.0));
    }

    // -- strategy parsing -----------------------------------------------------

    #[test]
    fn strategy_from_str() {
        assert_eq!("incremental".parse::<BaselineStrategy>().unwrap(), BaselineStrategy::Incremental);
        assert_eq!("SELF_JOIN".parse::<BaselineStrategy>().unwrap(), BaselineStrategy::SelfJoin);
        assert_matches!("fastest".parse::<BaselineStrategy>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn strategy_round_trips_through_display() {
        for s in [BaselineStrategy::Incremental, BaselineStrategy::SelfJoin] {
            assert_eq!(s.to_string().parse::<BaselineStrategy>().unwrap(), s);
        }
    }
}
