//! Rolling spend totals and windowed usage counters.
//!
//! All state here is derived and rebuildable from the ledger; it exists so
//! the hot path never needs an aggregate query. Every increment goes through
//! a single critical section that compares the window key, resets on
//! rollover, and applies the delta in one step, so concurrent callers can
//! neither lose updates nor double-reset across a day or month boundary.

mod accumulator;
mod book;
mod counters;

pub use accumulator::CostAccumulator;
pub use book::UserCostBook;
pub use counters::UsageCounters;
