//! Windowed cost accumulator.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::quota::Period;

#[derive(Debug)]
struct WindowedTotal {
    total: Decimal,
    window: String,
}

/// Running spend total for one calendar window (day or month).
///
/// The total and its window key live under one mutex: `add` compares the
/// window, resets a stale one, and applies the increment without releasing
/// the lock in between. Two requests racing across a boundary therefore
/// produce exactly one reset and no carried-over total.
#[derive(Debug)]
pub struct CostAccumulator {
    period: Period,
    state: Mutex<WindowedTotal>,
}

impl CostAccumulator {
    pub fn new(period: Period, now: DateTime<Utc>) -> Self {
        Self {
            period,
            state: Mutex::new(WindowedTotal {
                total: Decimal::ZERO,
                window: period.window_key(now),
            }),
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowedTotal> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `amount` to the window containing `now`, returning the new total.
    pub fn add(&self, amount: Decimal, now: DateTime<Utc>) -> Decimal {
        let key = self.period.window_key(now);
        let mut state = self.lock();
        if state.window != key {
            state.total = Decimal::ZERO;
            state.window = key;
        }
        state.total += amount;
        state.total
    }

    /// Total for the window containing `now`; a stale window reads as zero
    /// and is reset in place.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Decimal {
        let key = self.period.window_key(now);
        let mut state = self.lock();
        if state.window != key {
            state.total = Decimal::ZERO;
            state.window = key;
        }
        state.total
    }

    pub fn rollover_if_needed(&self, now: DateTime<Utc>) {
        let _ = self.snapshot(now);
    }

    /// True when the stored window does not contain `now`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.lock().window != self.period.window_key(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 25, h, m, s).unwrap()
    }

    #[test]
    fn test_add_accumulates_within_window() {
        let acc = CostAccumulator::new(Period::Daily, at(10, 0, 0));
        assert_eq!(acc.add(dec!(1.25), at(10, 0, 0)), dec!(1.25));
        assert_eq!(acc.add(dec!(0.75), at(18, 30, 0)), dec!(2.00));
        assert_eq!(acc.snapshot(at(23, 0, 0)), dec!(2.00));
    }

    #[test]
    fn test_day_boundary_resets_before_applying() {
        let acc = CostAccumulator::new(Period::Daily, at(12, 0, 0));
        acc.add(dec!(87.30), at(23, 59, 59));

        let next_day = Utc.with_ymd_and_hms(2026, 8, 26, 0, 0, 1).unwrap();
        assert_eq!(acc.add(dec!(0.50), next_day), dec!(0.50));
        assert_eq!(acc.snapshot(next_day), dec!(0.50));
    }

    #[test]
    fn test_snapshot_of_stale_window_reads_zero() {
        let acc = CostAccumulator::new(Period::Monthly, at(12, 0, 0));
        acc.add(dec!(500), at(12, 0, 0));

        let next_month = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        assert!(acc.is_stale(next_month));
        assert_eq!(acc.snapshot(next_month), Decimal::ZERO);
        assert!(!acc.is_stale(next_month));
    }

    #[test]
    fn test_monthly_window_survives_day_boundary() {
        let acc = CostAccumulator::new(Period::Monthly, at(12, 0, 0));
        acc.add(dec!(10), at(23, 59, 59));

        let next_day = Utc.with_ymd_and_hms(2026, 8, 26, 0, 0, 1).unwrap();
        assert_eq!(acc.add(dec!(5), next_day), dec!(15));
    }

    #[test]
    fn test_concurrent_adds_lose_nothing() {
        use std::sync::Arc;
        use std::thread;

        let acc = Arc::new(CostAccumulator::new(Period::Daily, at(10, 0, 0)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let acc = Arc::clone(&acc);
                thread::spawn(move || {
                    for _ in 0..250 {
                        acc.add(dec!(0.01), at(11, 0, 0));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(acc.snapshot(at(12, 0, 0)), dec!(20.00));
    }
}
