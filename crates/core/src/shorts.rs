//! Short-form video classification.
//!
//! Shorts are excluded from baseline arithmetic in both directions: they
//! never contribute to another video's baseline and never receive one.
//! Duration is the primary signal; the `#shorts` hashtag convention is
//! only consulted when the duration is unknown.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration_secs;
use crate::error::CoreError;

/// Default upper bound (inclusive) for a video to count as a short.
pub const DEFAULT_SHORT_MAX_DURATION_SECS: i64 = 60;

/// Matches `#short` / `#shorts` as a whole hashtag, case-insensitively.
static SHORTS_HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\w#])#shorts?\b").expect("valid regex")
});

/// Thresholds used to decide whether a video is a short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortPolicy {
    pub max_duration_secs: i64,
}

impl Default for ShortPolicy {
    fn default() -> Self {
        Self {
            max_duration_secs: DEFAULT_SHORT_MAX_DURATION_SECS,
        }
    }
}

impl ShortPolicy {
    /// Build a policy, rejecting non-positive thresholds.
    pub fn new(max_duration_secs: i64) -> Result<Self, CoreError> {
        if max_duration_secs <= 0 {
            return Err(CoreError::Validation(format!(
                "short max duration must be > 0 seconds, got {max_duration_secs}"
            )));
        }
        Ok(Self { max_duration_secs })
    }

    /// Classify a video from its raw duration and text.
    ///
    /// - Known duration (> 0 s): short iff it is at most `max_duration_secs`.
    /// - Unknown duration: short iff the title or description carries a
    ///   `#short`/`#shorts` hashtag.
    pub fn is_short(
        &self,
        duration: Option<&str>,
        title: Option<&str>,
        description: Option<&str>,
    ) -> bool {
        let secs = parse_duration_secs(duration);
        if secs > 0 {
            return secs <= self.max_duration_secs;
        }
        [title, description]
            .into_iter()
            .flatten()
            .any(has_shorts_hashtag)
    }

    /// Like [`is_short`](Self::is_short), but an operator override wins.
    pub fn classify(
        &self,
        short_override: Option<bool>,
        duration: Option<&str>,
        title: Option<&str>,
        description: Option<&str>,
    ) -> bool {
        short_override.unwrap_or_else(|| self.is_short(duration, title, description))
    }
}

/// Whether `text` contains a `#short` or `#shorts` hashtag.
pub fn has_shorts_hashtag(text: &str) -> bool {
    SHORTS_HASHTAG_RE.is_match(text)
}
