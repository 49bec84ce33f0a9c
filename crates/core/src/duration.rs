//! ISO-8601 duration parsing for video lengths.
//!
//! Video hosts report lengths as `PT#H#M#S` strings (with an optional day
//! component for very long live streams). Parsing never fails: anything
//! that is missing, empty or malformed resolves to `0`, which callers
//! treat as "duration unknown".

use std::sync::LazyLock;

use regex::Regex;

/// Sentinel the host emits for videos without a known length.
pub const ZERO_DURATION_SENTINEL: &str = "P0D";

const DURATION_PATTERN: &str =
    r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.\d+)?S)?)?$";

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DURATION_PATTERN).expect("valid regex"));

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Convert an ISO-8601 duration string into whole seconds.
///
/// Returns `0` for `None`, empty input, [`ZERO_DURATION_SENTINEL`],
/// malformed strings and values that would overflow `i64`. Fractional
/// seconds are truncated.
pub fn parse_duration_secs(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return 0;
    };
    if raw == ZERO_DURATION_SENTINEL {
        return 0;
    }

    let Some(caps) = DURATION_RE.captures(raw) else {
        return 0;
    };

    let units = [
        (1, SECS_PER_DAY),
        (2, SECS_PER_HOUR),
        (3, SECS_PER_MINUTE),
        (4, 1),
    ];

    let mut total: i64 = 0;
    for (group, multiplier) in units {
        let Some(m) = caps.get(group) else {
            continue;
        };
        let component = m
            .as_str()
            .parse::<i64>()
            .ok()
            .and_then(|v| v.checked_mul(multiplier))
            .and_then(|v| total.checked_add(v));
        match component {
            Some(v) => total = v,
            None => return 0,
        }
    }
    total
}
