//! Timing and grouping policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How a trigger is rate limited
///
/// Chosen once when an element is created and never changed afterwards.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum TimingPolicy {
    /// Every trigger runs synchronously
    NoLimit,
    /// Leading and trailing edge, at most one run per interval
    Throttle(Duration),
    /// One run after the interval has passed without a new trigger
    Debounce(Duration),
}

impl TimingPolicy {
    /// Build from the `throttle` (ms) and `debounce` options
    ///
    /// Non-positive intervals disable rate limiting.
    pub fn from_options(throttle_ms: i64, debounce: bool) -> Self {
        if throttle_ms <= 0 {
            return TimingPolicy::NoLimit;
        }

        let interval = Duration::from_millis(throttle_ms as u64);
        if debounce {
            TimingPolicy::Debounce(interval)
        } else {
            TimingPolicy::Throttle(interval)
        }
    }

    /// Rate-limiting interval, if any
    pub fn interval(&self) -> Option<Duration> {
        match self {
            TimingPolicy::NoLimit => None,
            TimingPolicy::Throttle(interval) | TimingPolicy::Debounce(interval) => Some(*interval),
        }
    }
}

impl Default for TimingPolicy {
    fn default() -> Self {
        TimingPolicy::Debounce(Duration::from_millis(250))
    }
}

impl fmt::Display for TimingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingPolicy::NoLimit => write!(f, "no-limit"),
            TimingPolicy::Throttle(i) => write!(f, "throttle({}ms)", i.as_millis()),
            TimingPolicy::Debounce(i) => write!(f, "debounce({}ms)", i.as_millis()),
        }
    }
}

/// How watched elements are grouped behind shared listeners
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingPolicy {
    /// One listener set per (container, timing policy)
    #[default]
    ByContainerAndPolicy,
    /// One listener set per container; each element keeps its own limiter
    ByContainer,
}
