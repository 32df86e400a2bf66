//! # tollgate
//!
//! Usage metering and cost governance for platforms that resell expensive
//! provider APIs. Every billable request passes through one [`Governor`]:
//! admission is checked against the account's token balance, its plan's
//! daily and monthly quotas, feature kill switches, and a global emergency
//! spend gate; after the downstream handler responds, a detached task
//! settles the request: deducting tokens, appending the usage record, and
//! rolling the spend totals that drive deduplicated threshold alerts.
//!
//! Durable storage, recipient lookup, and notification delivery stay behind
//! the traits in [`external`]; the crate owns only the decisions and the
//! in-process counters, which are derived state and safe to lose on
//! restart.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tollgate::{CompletionReport, Governor, MemoryLedger, ProviderUsage};
//! # use tollgate::external::{Directory, Notifier};
//!
//! # async fn example(directory: Arc<dyn Directory>, notifier: Arc<dyn Notifier>) -> Result<(), tollgate::Error> {
//! let governor = Governor::builder()
//!     .ledger(Arc::new(MemoryLedger::new()))
//!     .directory(directory)
//!     .notifier(notifier)
//!     .build();
//!
//! match governor.check_and_admit("user-1", "prompts", "generate").await? {
//!     decision if decision.is_allowed() => {
//!         // ... call the provider, then settle in the background:
//!         governor.record_completion(
//!             CompletionReport::new("user-1", "prompts", "generate")
//!                 .provider_call("openai", "gpt-4", ProviderUsage::tokens(900, 150))
//!                 .response_time_ms(840),
//!         );
//!     }
//!     denied => eprintln!("rejected: {:?}", denied.deny_reason()),
//! }
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod alert;
pub mod config;
pub mod external;
pub mod governor;
pub mod metering;
pub mod quota;
pub mod tariff;

// Re-exports for convenience
pub use alert::{
    AlertContext, AlertDispatcher, AlertLevel, AlertPayload, DEFAULT_ALERT_COOLDOWN,
    PeriodThresholds, ThresholdTable,
};
pub use config::GovernorConfig;
pub use external::{
    Account, Directory, FeatureFlags, InMemoryFlags, Ledger, LedgerError, MemoryLedger, Notifier,
    NotifyError, TopSpender, UsageRecord,
};
pub use governor::{AdmitDecision, CompletionReport, DenyReason, Governor, GovernorBuilder};
pub use metering::{CostAccumulator, UsageCounters, UserCostBook};
pub use quota::{Period, QuotaDecision, QuotaLimit, QuotaRemaining, QuotaTable, evaluate};
pub use tariff::{PricingUnit, ProviderUsage, TariffEntry, TariffTable, TokenCostTable};

use thiserror::Error;

/// Admission-path failures. Post-processing never produces these; its
/// errors are logged and swallowed because the response is already gone.
#[derive(Debug, Error)]
pub enum Error {
    #[error("account not found: {user_id}")]
    AccountNotFound { user_id: String },

    /// Ledger backend failing; admission fails closed.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Admission-path ledger read exceeded its deadline; fail closed rather
    /// than admit unmetered traffic.
    #[error("ledger read timed out after {0:?}")]
    LedgerTimeout(std::time::Duration),
}

impl Error {
    /// Whether the caller should retry later, as opposed to fixing the
    /// request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::LedgerUnavailable(_) | Error::LedgerTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
