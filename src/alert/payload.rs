//! Structured alert payload.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::AlertLevel;
use crate::external::TopSpender;
use crate::quota::Period;

/// What a notifier receives: the breach, its context, and who caused it.
/// Rendering (email, chat message) is the notifier's concern.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub level: AlertLevel,
    pub period: Period,
    pub current_cost: Decimal,
    pub threshold: Decimal,
    pub percent_used: Decimal,
    /// Set for user-scoped alerts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_spenders: Vec<TopSpender>,
    pub timestamp: DateTime<Utc>,
}

impl AlertPayload {
    pub fn new(
        level: AlertLevel,
        period: Period,
        current_cost: Decimal,
        threshold: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let percent_used = if threshold.is_zero() {
            dec!(100)
        } else {
            (current_cost / threshold * dec!(100)).round_dp(1)
        };
        Self {
            level,
            period,
            current_cost,
            threshold,
            percent_used,
            user_id: None,
            top_spenders: Vec::new(),
            timestamp,
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_top_spenders(mut self, top_spenders: Vec<TopSpender>) -> Self {
        self.top_spenders = top_spenders;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_used() {
        let payload = AlertPayload::new(
            AlertLevel::Warning,
            Period::Daily,
            dec!(125),
            dec!(100),
            Utc::now(),
        );
        assert_eq!(payload.percent_used, dec!(125.0));
    }

    #[test]
    fn test_zero_threshold_caps_at_hundred() {
        let payload = AlertPayload::new(
            AlertLevel::Shutdown,
            Period::Daily,
            dec!(10),
            Decimal::ZERO,
            Utc::now(),
        );
        assert_eq!(payload.percent_used, dec!(100));
    }

    #[test]
    fn test_serializes_without_empty_fields() {
        let payload = AlertPayload::new(
            AlertLevel::Critical,
            Period::Monthly,
            dec!(5500),
            dec!(5000),
            Utc::now(),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["level"], "critical");
        assert_eq!(json["period"], "monthly");
        assert!(json.get("user_id").is_none());
        assert!(json.get("top_spenders").is_none());
    }
}
