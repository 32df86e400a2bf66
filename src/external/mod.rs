//! External collaborators the governor depends on.
//!
//! Durable storage, recipient directory, notification delivery, and feature
//! flags are all consumed through traits so embedders can plug in their own
//! backends. [`MemoryLedger`] and [`InMemoryFlags`] are complete in-process
//! implementations used by the test suite and by embedders without a durable
//! store yet.

mod flags;
mod ledger;
mod memory;
mod notify;

pub use flags::{FeatureFlags, InMemoryFlags};
pub use ledger::{Account, Ledger, LedgerError, TopSpender, UsageRecord};
pub use memory::MemoryLedger;
pub use notify::{Directory, Notifier, NotifyError};
