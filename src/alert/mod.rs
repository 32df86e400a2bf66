//! Spend threshold alerts.
//!
//! Threshold tables decide *whether* a spend level warrants an alert and at
//! which severity; the [`AlertDispatcher`] decides whether one may actually
//! go out, deduplicating through a per-key cooldown window.

mod dispatcher;
mod payload;

pub use dispatcher::{AlertContext, AlertDispatcher, DEFAULT_ALERT_COOLDOWN};
pub use payload::AlertPayload;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::quota::Period;

/// Alert severity, ordered from least to most severe. `Shutdown` doubles as
/// the emergency gate: once breached, admission denies all requests for the
/// rest of the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
    Shutdown,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
            AlertLevel::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// USD thresholds for one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodThresholds {
    pub warning: Decimal,
    pub critical: Decimal,
    pub shutdown: Decimal,
}

impl PeriodThresholds {
    pub const fn new(warning: Decimal, critical: Decimal, shutdown: Decimal) -> Self {
        Self {
            warning,
            critical,
            shutdown,
        }
    }

    /// Highest breached severity, or `None` below the warning line. A spend
    /// past several lines reports only the most severe one.
    pub fn breached(&self, spend: Decimal) -> Option<AlertLevel> {
        if spend >= self.shutdown {
            Some(AlertLevel::Shutdown)
        } else if spend >= self.critical {
            Some(AlertLevel::Critical)
        } else if spend >= self.warning {
            Some(AlertLevel::Warning)
        } else {
            None
        }
    }

    pub fn for_level(&self, level: AlertLevel) -> Decimal {
        match level {
            AlertLevel::Warning => self.warning,
            AlertLevel::Critical => self.critical,
            AlertLevel::Shutdown => self.shutdown,
        }
    }
}

/// Daily and monthly thresholds for one scope (global or per-user).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub daily: PeriodThresholds,
    pub monthly: PeriodThresholds,
}

impl ThresholdTable {
    pub fn for_period(&self, period: Period) -> &PeriodThresholds {
        match period {
            Period::Daily => &self.daily,
            Period::Monthly => &self.monthly,
        }
    }

    /// Platform-wide defaults.
    pub fn global_defaults() -> Self {
        Self {
            daily: PeriodThresholds::new(dec!(100), dec!(500), dec!(1000)),
            monthly: PeriodThresholds::new(dec!(2000), dec!(5000), dec!(10000)),
        }
    }

    /// Defaults for a single account's spend.
    pub fn per_user_defaults() -> Self {
        Self {
            daily: PeriodThresholds::new(dec!(50), dec!(100), dec!(200)),
            monthly: PeriodThresholds::new(dec!(300), dec!(600), dec!(1200)),
        }
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::global_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breached_picks_highest_level_only() {
        let thresholds = PeriodThresholds::new(dec!(100), dec!(500), dec!(1000));

        assert_eq!(thresholds.breached(dec!(99.99)), None);
        assert_eq!(thresholds.breached(dec!(100)), Some(AlertLevel::Warning));
        assert_eq!(thresholds.breached(dec!(600)), Some(AlertLevel::Critical));
        assert_eq!(thresholds.breached(dec!(1000)), Some(AlertLevel::Shutdown));
        assert_eq!(thresholds.breached(dec!(5000)), Some(AlertLevel::Shutdown));
    }

    #[test]
    fn test_level_ordering() {
        assert!(AlertLevel::Warning < AlertLevel::Critical);
        assert!(AlertLevel::Critical < AlertLevel::Shutdown);
    }

    #[test]
    fn test_table_period_selection() {
        let table = ThresholdTable::global_defaults();
        assert_eq!(table.for_period(Period::Daily).warning, dec!(100));
        assert_eq!(table.for_period(Period::Monthly).warning, dec!(2000));
    }
}
