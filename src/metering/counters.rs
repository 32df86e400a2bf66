//! Windowed per-user feature counters.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::quota::Period;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    user_id: String,
    feature: String,
    period: Period,
}

#[derive(Debug)]
struct WindowedCount {
    window: String,
    count: u64,
}

/// Completed-request counts per (user, feature, period) window.
///
/// Each increment holds the entry's shard lock for the whole
/// compare-window / reset / bump sequence, so updates to one counter are
/// linearizable. Counts are derived state: losing them on restart only
/// under-counts for the remainder of the current window.
#[derive(Debug, Default)]
pub struct UsageCounters {
    counters: DashMap<CounterKey, WindowedCount>,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count in the window containing `now`; a stale or missing entry reads
    /// as zero.
    pub fn current(&self, user_id: &str, feature: &str, period: Period, now: DateTime<Utc>) -> u64 {
        let key = CounterKey {
            user_id: user_id.to_string(),
            feature: feature.to_string(),
            period,
        };
        self.counters
            .get(&key)
            .filter(|entry| entry.window == period.window_key(now))
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    /// Bump the counter for the window containing `now`, returning the new
    /// count. A stale window is reset before the bump.
    pub fn increment(&self, user_id: &str, feature: &str, period: Period, now: DateTime<Utc>) -> u64 {
        let key = CounterKey {
            user_id: user_id.to_string(),
            feature: feature.to_string(),
            period,
        };
        let window = period.window_key(now);
        let mut entry = self.counters.entry(key).or_insert_with(|| WindowedCount {
            window: window.clone(),
            count: 0,
        });
        if entry.window != window {
            entry.window = window;
            entry.count = 0;
        }
        entry.count += 1;
        entry.count
    }

    /// Drop counters whose window no longer contains `now`.
    pub fn prune(&self, now: DateTime<Utc>) {
        self.counters
            .retain(|key, entry| entry.window == key.period.window_key(now));
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }
}
