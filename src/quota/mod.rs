//! Tier-based usage quotas.
//!
//! [`QuotaTable`] holds the tier × period × feature limits loaded at startup;
//! [`evaluate`] is the pure admission predicate. Counting completed requests
//! is the governor's job, which keeps this module side-effect free.

mod evaluator;

pub use evaluator::{QuotaDecision, QuotaRemaining, evaluate};

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Calendar accounting window, anchored to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Monthly,
}

impl Period {
    pub const ALL: [Period; 2] = [Period::Daily, Period::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Monthly => "monthly",
        }
    }

    /// Key identifying the window containing `at`: the date for daily
    /// periods, the year-month for monthly ones.
    pub fn window_key(&self, at: DateTime<Utc>) -> String {
        match self {
            Period::Daily => at.format("%Y-%m-%d").to_string(),
            Period::Monthly => format!("{:04}-{:02}", at.year(), at.month()),
        }
    }

    /// UTC midnight opening the window containing `at`.
    pub fn window_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let date = at.date_naive();
        let start = match self {
            Period::Daily => date,
            Period::Monthly => date.with_day(1).unwrap_or(date),
        };
        start.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-feature limit. Config files use `-1` as the unlimited sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLimit {
    Unlimited,
    Limit(u64),
}

impl From<i64> for QuotaLimit {
    fn from(raw: i64) -> Self {
        if raw < 0 {
            QuotaLimit::Unlimited
        } else {
            QuotaLimit::Limit(raw as u64)
        }
    }
}

impl Serialize for QuotaLimit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QuotaLimit::Unlimited => serializer.serialize_i64(-1),
            QuotaLimit::Limit(n) => serializer.serialize_u64(*n),
        }
    }
}

impl<'de> Deserialize<'de> for QuotaLimit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(QuotaLimit::from(i64::deserialize(deserializer)?))
    }
}

/// Tier × period × feature limits. Features without an entry fall back to the
/// table's default limit. Read-only after startup.
#[derive(Debug, Clone)]
pub struct QuotaTable {
    limits: HashMap<(String, Period, String), QuotaLimit>,
    default: QuotaLimit,
}

impl QuotaTable {
    pub fn builder() -> QuotaTableBuilder {
        QuotaTableBuilder::new()
    }

    pub fn lookup(&self, tier: &str, period: Period, feature: &str) -> QuotaLimit {
        self.limits
            .get(&(tier.to_string(), period, feature.to_string()))
            .copied()
            .unwrap_or(self.default)
    }
}

impl Default for QuotaTable {
    fn default() -> Self {
        QuotaTableBuilder::new().with_defaults().build()
    }
}

#[derive(Debug)]
pub struct QuotaTableBuilder {
    limits: HashMap<(String, Period, String), QuotaLimit>,
    default: QuotaLimit,
}

impl Default for QuotaTableBuilder {
    fn default() -> Self {
        Self {
            limits: HashMap::new(),
            default: QuotaLimit::Unlimited,
        }
    }
}

impl QuotaTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shipped limits for the free and pro plans.
    pub fn with_defaults(self) -> Self {
        self.limit("free", Period::Daily, "generate", 10)
            .limit("free", Period::Monthly, "generate", 100)
            .limit("free", Period::Daily, "text_to_speech", 3)
            .limit("free", Period::Monthly, "text_to_speech", 20)
            .limit("free", Period::Daily, "generate_clip", 1)
            .limit("free", Period::Monthly, "generate_clip", 5)
            .limit("pro", Period::Daily, "generate", 200)
            .limit("pro", Period::Monthly, "generate", 3000)
            .limit("pro", Period::Daily, "text_to_speech", 50)
            .limit("pro", Period::Monthly, "text_to_speech", 500)
            .limit("pro", Period::Daily, "generate_clip", -1)
            .limit("pro", Period::Monthly, "generate_clip", 100)
    }

    pub fn limit(
        mut self,
        tier: impl Into<String>,
        period: Period,
        feature: impl Into<String>,
        limit: impl Into<QuotaLimit>,
    ) -> Self {
        self.limits
            .insert((tier.into(), period, feature.into()), limit.into());
        self
    }

    /// Limit applied to features with no explicit entry.
    pub fn default_limit(mut self, limit: impl Into<QuotaLimit>) -> Self {
        self.default = limit.into();
        self
    }

    pub fn build(self) -> QuotaTable {
        QuotaTable {
            limits: self.limits,
            default: self.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_keys() {
        let at = Utc.with_ymd_and_hms(2026, 8, 25, 23, 59, 59).unwrap();
        assert_eq!(Period::Daily.window_key(at), "2026-08-25");
        assert_eq!(Period::Monthly.window_key(at), "2026-08");

        let next = Utc.with_ymd_and_hms(2026, 8, 26, 0, 0, 1).unwrap();
        assert_ne!(Period::Daily.window_key(at), Period::Daily.window_key(next));
        assert_eq!(
            Period::Monthly.window_key(at),
            Period::Monthly.window_key(next)
        );
    }

    #[test]
    fn test_window_start() {
        let at = Utc.with_ymd_and_hms(2026, 8, 25, 17, 30, 0).unwrap();
        assert_eq!(
            Period::Daily.window_start(at),
            Utc.with_ymd_and_hms(2026, 8, 25, 0, 0, 0).unwrap()
        );
        assert_eq!(
            Period::Monthly.window_start(at),
            Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_negative_sentinel_is_unlimited() {
        assert_eq!(QuotaLimit::from(-1), QuotaLimit::Unlimited);
        assert_eq!(QuotaLimit::from(0), QuotaLimit::Limit(0));
        assert_eq!(QuotaLimit::from(10), QuotaLimit::Limit(10));
    }

    #[test]
    fn test_limit_serde_round_trip() {
        let unlimited: QuotaLimit = serde_json::from_str("-1").unwrap();
        assert_eq!(unlimited, QuotaLimit::Unlimited);
        assert_eq!(serde_json::to_string(&unlimited).unwrap(), "-1");

        let bounded: QuotaLimit = serde_json::from_str("25").unwrap();
        assert_eq!(bounded, QuotaLimit::Limit(25));
    }

    #[test]
    fn test_lookup_falls_back_to_default() {
        let table = QuotaTable::builder()
            .limit("free", Period::Daily, "prompts", 10)
            .default_limit(QuotaLimit::Unlimited)
            .build();

        assert_eq!(
            table.lookup("free", Period::Daily, "prompts"),
            QuotaLimit::Limit(10)
        );
        assert_eq!(
            table.lookup("free", Period::Daily, "something_else"),
            QuotaLimit::Unlimited
        );
        assert_eq!(
            table.lookup("enterprise", Period::Daily, "prompts"),
            QuotaLimit::Unlimited
        );
    }
}
