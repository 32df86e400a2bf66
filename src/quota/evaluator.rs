//! Pure quota admission predicate.

use serde::Serialize;

use super::QuotaLimit;

/// Remaining headroom within a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaRemaining {
    Unlimited,
    Count(u64),
}

/// Outcome of a quota check for one (tier, feature, period).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub limit: QuotaLimit,
    pub remaining: QuotaRemaining,
}

/// Decide whether one more request fits under `limit` given the count of
/// requests already completed in the current window. No side effects.
pub fn evaluate(limit: QuotaLimit, current_count: u64) -> QuotaDecision {
    match limit {
        QuotaLimit::Unlimited => QuotaDecision {
            allowed: true,
            limit,
            remaining: QuotaRemaining::Unlimited,
        },
        QuotaLimit::Limit(max) => QuotaDecision {
            allowed: current_count < max,
            limit,
            remaining: QuotaRemaining::Count(max.saturating_sub(current_count)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_always_allows() {
        for count in [0, 1, u64::MAX] {
            let decision = evaluate(QuotaLimit::Unlimited, count);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, QuotaRemaining::Unlimited);
        }
    }

    #[test]
    fn test_under_limit_allows() {
        let decision = evaluate(QuotaLimit::Limit(10), 9);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, QuotaRemaining::Count(1));
    }

    #[test]
    fn test_at_limit_denies_with_zero_remaining() {
        let decision = evaluate(QuotaLimit::Limit(10), 10);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, QuotaRemaining::Count(0));
    }

    #[test]
    fn test_over_limit_clamps_remaining() {
        let decision = evaluate(QuotaLimit::Limit(10), 15);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, QuotaRemaining::Count(0));
    }

    #[test]
    fn test_zero_limit_denies_everything() {
        let decision = evaluate(QuotaLimit::Limit(0), 0);
        assert!(!decision.allowed);
    }
}
