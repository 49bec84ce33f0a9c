//! Performance score (outlier factor) and storage clamping.
//!
//! The score is stored in a `NUMERIC(8,3)` column, so it is rounded to
//! three decimals and clamped to `99999.999` instead of overflowing.

use serde::{Deserialize, Serialize};

/// Largest value a `NUMERIC(8,3)` column can hold.
pub const MAX_PERFORMANCE_SCORE: f64 = 99_999.999;

/// Decimal places kept by the score column.
pub const SCORE_SCALE: i32 = 3;

/// Largest finite value a `DOUBLE PRECISION` baseline column can hold.
pub const MAX_BASELINE_VIEWS: f64 = f64::MAX;

/// Score at or above which a video counts as outperforming its channel.
pub const OUTPERFORMING_THRESHOLD: f64 = 2.0;

/// Score at or above which a video counts as a breakout.
pub const BREAKOUT_THRESHOLD: f64 = 5.0;

/// Score below which a video counts as underperforming its channel.
pub const UNDERPERFORMING_THRESHOLD: f64 = 0.5;

/// Ratio of actual views to the baseline.
///
/// Returns `None` when the baseline is missing, zero, negative or not
/// finite. The ratio is rounded to [`SCORE_SCALE`] decimals first and then
/// clamped to [`MAX_PERFORMANCE_SCORE`], so rounding can never push a value
/// past the column's capacity.
pub fn performance_score(view_count: i64, baseline: Option<f64>) -> Option<f64> {
    let baseline = baseline.filter(|b| b.is_finite() && *b > 0.0)?;
    let ratio = view_count.max(0) as f64 / baseline;
    Some(round_to_scale(ratio, SCORE_SCALE).min(MAX_PERFORMANCE_SCORE))
}

/// Clamp a baseline mean to what the baseline column can hold.
pub fn clamp_baseline(mean: f64) -> f64 {
    if mean.is_nan() {
        return 0.0;
    }
    mean.clamp(0.0, MAX_BASELINE_VIEWS)
}

fn round_to_scale(value: f64, scale: i32) -> f64 {
    let factor = 10f64.powi(scale);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// Coarse classification of a performance score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Underperforming,
    Typical,
    Outperforming,
    Breakout,
}

impl PerformanceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Underperforming => "underperforming",
            Self::Typical => "typical",
            Self::Outperforming => "outperforming",
            Self::Breakout => "breakout",
        }
    }
}

/// Classify a score.
///
/// - `Underperforming`: score < 0.5
/// - `Typical`: score < 2.0
/// - `Outperforming`: score < 5.0
/// - `Breakout`: score >= 5.0
pub fn classify_score(score: f64) -> PerformanceTier {
    if score < UNDERPERFORMING_THRESHOLD {
        PerformanceTier::Underperforming
    } else if score < OUTPERFORMING_THRESHOLD {
        PerformanceTier::Typical
    } else if score < BREAKOUT_THRESHOLD {
        PerformanceTier::Outperforming
    } else {
        PerformanceTier::Breakout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ratio() {
        assert_eq!(performance_score(400, Some(200.0)), Some(2.0));
    }

    #[test]
    fn rounds_to_three_decimals() {
        assert_eq!(performance_score(1, Some(3.0)), Some(0.333));
        assert_eq!(performance_score(2, Some(3.0)), Some(0.667));
    }

    #[test]
    fn null_or_zero_baseline_gives_none() {
        assert_eq!(performance_score(100, None), None);
        assert_eq!(performance_score(100, Some(0.0)), None);
        assert_eq!(performance_score(100, Some(-4.0)), None);
        assert_eq!(performance_score(100, Some(f64::NAN)), None);
    }

    #[test]
    fn ten_billion_over_one_is_clamped() {
        assert_eq!(
            performance_score(10_000_000_000, Some(1.0)),
            Some(MAX_PERFORMANCE_SCORE)
        );
    }

    #[test]
    fn max_views_over_tiny_baseline_is_clamped() {
        let score = performance_score(i64::MAX, Some(f64::MIN_POSITIVE)).unwrap();
        assert_eq!(score, MAX_PERFORMANCE_SCORE);
        assert!(score > 0.0);
    }

    #[test]
    fn rounding_cannot_exceed_cap() {
        assert_eq!(
            performance_score(999_999_999_996, Some(10_000_000.0)),
            Some(MAX_PERFORMANCE_SCORE)
        );
    }

    #[test]
    fn zero_views_score_zero() {
        assert_eq!(performance_score(0, Some(50.0)), Some(0.0));
    }

    #[test]
    fn baseline_clamp() {
        assert_eq!(clamp_baseline(150.5), 150.5);
        assert_eq!(clamp_baseline(f64::INFINITY), MAX_BASELINE_VIEWS);
        assert_eq!(clamp_baseline(f64::NAN), 0.0);
    }

    #[test]
    fn tiers() {
        assert_eq!(classify_score(0.1), PerformanceTier::Underperforming);
        assert_eq!(classify_score(0.5), PerformanceTier::Typical);
        assert_eq!(classify_score(1.99), PerformanceTier::Typical);
        assert_eq!(classify_score(2.0), PerformanceTier::Outperforming);
        assert_eq!(classify_score(5.0), PerformanceTier::Breakout);
        assert_eq!(classify_score(MAX_PERFORMANCE_SCORE), PerformanceTier::Breakout);
    }

    #[test]
    fn tier_names() {
        assert_eq!(PerformanceTier::Breakout.as_str(), "breakout");
    }
}
