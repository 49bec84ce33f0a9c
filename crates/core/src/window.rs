//! The one-year trailing window used to select comparison videos.
//!
//! The window for a video published at `t` is `[t - 12 months, t)`: the
//! lower bound is inclusive, the upper bound exclusive. A video published on
//! 29 February has no same-day anniversary; its window starts at midnight on
//! 1 March of the previous year. Window starts therefore never decrease as
//! `t` increases, which the sliding window relies on.

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, Months, Utc};

use crate::types::Timestamp;

/// Length of the trailing window in calendar months.
pub const WINDOW_MONTHS: u32 = 12;

/// Inclusive lower bound of the trailing window for a video published at `published_at`.
pub fn window_start(published_at: Timestamp) -> Timestamp {
    let Some(start) = published_at.checked_sub_months(Months::new(WINDOW_MONTHS)) else {
        return DateTime::<Utc>::MIN_UTC;
    };
    if start.day() == published_at.day() {
        return start;
    }
    // chrono clamped 29 February back to the 28th; move to the next midnight.
    start
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(start)
}

/// Whether a video published at `candidate` falls inside the window of a
/// video published at `subject`.
pub fn in_window(subject: Timestamp, candidate: Timestamp) -> bool {
    candidate >= window_start(subject) && candidate < subject
}

/// Exact arithmetic mean of `count` values summing to `sum`.
///
/// Both baseline strategies funnel through this function so they agree
/// bit-for-bit on the same contributor set.
pub fn mean(sum: i128, count: u64) -> Option<f64> {
    (count > 0).then(|| sum as f64 / count as f64)
}

/// Sliding collection of `(published_at, view_count)` pairs with a running sum.
///
/// Entries must be pushed in non-decreasing `published_at` order.
#[derive(Debug, Default)]
pub struct TrailingWindow {
    entries: VecDeque<(Timestamp, i64)>,
    sum: i128,
}

impl TrailingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, published_at: Timestamp, view_count: i64) {
        debug_assert!(
            self.entries
                .back()
                .is_none_or(|(last, _)| *last <= published_at),
            "entries must be pushed in chronological order"
        );
        self.entries.push_back((published_at, view_count));
        self.sum += i128::from(view_count);
    }

    /// Drop every entry published strictly before `lower`.
    pub fn evict_before(&mut self, lower: Timestamp) {
        while let Some(&(published_at, views)) = self.entries.front() {
            if published_at >= lower {
                break;
            }
            self.entries.pop_front();
            self.sum -= i128::from(views);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        mean(self.sum, self.entries.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn window_start_is_one_calendar_year_back() {
        assert_eq!(window_start(ts(2024, 6, 15)), ts(2023, 6, 15));
    }

    #[test]
    fn leap_day_window_starts_on_first_of_march() {
        let midnight = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(window_start(ts(2024, 2, 29)), midnight);
        assert!(!in_window(ts(2024, 2, 29), ts(2023, 2, 28)));
    }

    #[test]
    fn window_start_never_moves_backwards() {
        let hours: Vec<Timestamp> = (0..24 * 4)
            .map(|h| Utc.with_ymd_and_hms(2024, 2, 27, 0, 0, 0).unwrap() + chrono::Duration::hours(h))
            .collect();
        for pair in hours.windows(2) {
            assert!(window_start(pair[0]) <= window_start(pair[1]), "{pair:?}");
        }
    }

    #[test]
    fn lower_bound_inclusive_upper_exclusive() {
        let subject = ts(2024, 6, 15);
        assert!(in_window(subject, ts(2023, 6, 15)));
        assert!(!in_window(subject, ts(2023, 6, 14)));
        assert!(in_window(subject, ts(2024, 6, 14)));
        assert!(!in_window(subject, subject));
        assert!(!in_window(subject, ts(2024, 6, 16)));
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(0, 0), None);
    }

    #[test]
    fn sliding_window_evicts_and_averages() {
        let mut w = TrailingWindow::new();
        w.push(ts(2023, 1, 1), 100);
        w.push(ts(2023, 6, 1), 200);
        w.push(ts(2023, 9, 1), 600);
        assert_eq!(w.mean(), Some(300.0));

        w.evict_before(ts(2023, 6, 1));
        assert_eq!(w.len(), 2);
        assert_eq!(w.mean(), Some(400.0));

        w.evict_before(ts(2024, 1, 1));
        assert!(w.is_empty());
        assert_eq!(w.mean(), None);
    }

    #[test]
    fn wide_view_counts_do_not_overflow_sum() {
        let mut w = TrailingWindow::new();
        w.push(ts(2023, 1, 1), i64::MAX);
        w.push(ts(2023, 1, 2), i64::MAX);
        assert_eq!(w.mean(), Some(i64::MAX as f64));
    }
}
