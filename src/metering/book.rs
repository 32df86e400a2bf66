//! Per-user spend tracking.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::CostAccumulator;
use crate::quota::Period;

#[derive(Debug)]
struct UserSpend {
    daily: CostAccumulator,
    monthly: CostAccumulator,
}

/// Daily and monthly spend per user, keyed on demand.
///
/// Entries self-reset on window rollover like the global accumulators.
/// [`UserCostBook::prune`] drops entries whose daily and monthly windows are
/// both stale, which bounds the map by users active this month.
#[derive(Debug, Default)]
pub struct UserCostBook {
    books: DashMap<String, UserSpend>,
}

impl UserCostBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record spend for `user_id`, returning the new (daily, monthly) totals.
    pub fn add(&self, user_id: &str, amount: Decimal, now: DateTime<Utc>) -> (Decimal, Decimal) {
        let entry = self
            .books
            .entry(user_id.to_string())
            .or_insert_with(|| UserSpend {
                daily: CostAccumulator::new(Period::Daily, now),
                monthly: CostAccumulator::new(Period::Monthly, now),
            });
        (entry.daily.add(amount, now), entry.monthly.add(amount, now))
    }

    /// Spend in the window containing `now`; absent or stale entries read as
    /// zero (derived state, rebuildable from the ledger).
    pub fn spend(&self, user_id: &str, period: Period, now: DateTime<Utc>) -> Decimal {
        self.books
            .get(user_id)
            .map(|entry| match period {
                Period::Daily => entry.daily.snapshot(now),
                Period::Monthly => entry.monthly.snapshot(now),
            })
            .unwrap_or(Decimal::ZERO)
    }

    /// Drop users with no spend in the current day or month.
    pub fn prune(&self, now: DateTime<Utc>) {
        self.books
            .retain(|_, spend| !(spend.daily.is_stale(now) && spend.monthly.is_stale(now)));
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_add_returns_both_totals() {
        let book = UserCostBook::new();
        book.add("u1", dec!(1.00), noon());
        let (daily, monthly) = book.add("u1", dec!(2.00), noon());
        assert_eq!(daily, dec!(3.00));
        assert_eq!(monthly, dec!(3.00));
    }

    #[test]
    fn test_users_are_isolated() {
        let book = UserCostBook::new();
        book.add("u1", dec!(5), noon());
        assert_eq!(book.spend("u2", Period::Daily, noon()), Decimal::ZERO);
    }

    #[test]
    fn test_daily_resets_monthly_carries() {
        let book = UserCostBook::new();
        book.add("u1", dec!(10), noon());

        let next_day = Utc.with_ymd_and_hms(2026, 8, 26, 0, 0, 1).unwrap();
        let (daily, monthly) = book.add("u1", dec!(1), next_day);
        assert_eq!(daily, dec!(1));
        assert_eq!(monthly, dec!(11));
    }

    #[test]
    fn test_prune_drops_only_fully_stale_users() {
        let book = UserCostBook::new();
        book.add("old", dec!(1), noon());

        let next_day = Utc.with_ymd_and_hms(2026, 8, 26, 12, 0, 0).unwrap();
        book.add("fresh", dec!(1), next_day);

        // Same month: "old" still has a live monthly window.
        book.prune(next_day);
        assert_eq!(book.len(), 2);

        let next_month = Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap();
        book.prune(next_month);
        assert!(book.is_empty());
    }
}
