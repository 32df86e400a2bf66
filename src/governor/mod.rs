//! Request governor: admission control and post-completion accounting.
//!
//! The governor wraps every billable request in a fixed lifecycle:
//! precheck (balance → quotas → feature flag → shutdown gate), then the
//! downstream handler runs outside this crate, then a detached
//! post-processing task deducts tokens, appends the usage record, bumps
//! counters and spend totals, and evaluates alert thresholds. Precheck
//! denials are synchronous and typed; post-processing never touches the
//! response path and logs its failures instead of surfacing them.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tollgate::{CompletionReport, Governor, MemoryLedger};
//! # use tollgate::external::{Directory, Notifier};
//! # async fn example(directory: Arc<dyn Directory>, notifier: Arc<dyn Notifier>) -> Result<(), tollgate::Error> {
//! let ledger = Arc::new(MemoryLedger::new());
//! let governor = Governor::builder()
//!     .ledger(Arc::clone(&ledger) as _)
//!     .directory(directory)
//!     .notifier(notifier)
//!     .build();
//!
//! let decision = governor.check_and_admit("user-1", "prompts", "generate").await?;
//! if decision.is_allowed() {
//!     // ... run the provider call, then:
//!     governor.record_completion(
//!         CompletionReport::new("user-1", "prompts", "generate")
//!             .provider_call("openai", "gpt-4", tollgate::ProviderUsage::tokens(900, 150)),
//!     );
//! }
//! # Ok(())
//! # }
//! ```

mod admission;
mod postprocess;

pub use admission::{AdmitDecision, DenyReason, flag_key};
pub use postprocess::CompletionReport;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::Error;
use crate::alert::AlertDispatcher;
use crate::config::GovernorConfig;
use crate::external::{Directory, FeatureFlags, InMemoryFlags, Ledger, LedgerError, Notifier};
use crate::metering::{CostAccumulator, UsageCounters, UserCostBook};
use crate::quota::{Period, QuotaLimit, QuotaTable, evaluate};
use crate::tariff::{TariffTable, TokenCostTable};

pub(crate) struct GovernorInner {
    pub(crate) config: GovernorConfig,
    pub(crate) tariffs: TariffTable,
    pub(crate) token_costs: TokenCostTable,
    pub(crate) quotas: QuotaTable,
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) flags: Arc<dyn FeatureFlags>,
    pub(crate) counters: UsageCounters,
    pub(crate) global_daily: CostAccumulator,
    pub(crate) global_monthly: CostAccumulator,
    pub(crate) user_costs: UserCostBook,
    pub(crate) alerts: AlertDispatcher,
    pub(crate) postprocess_permits: Arc<Semaphore>,
}

impl GovernorInner {
    pub(crate) fn global_spend(&self, period: Period) -> &CostAccumulator {
        match period {
            Period::Daily => &self.global_daily,
            Period::Monthly => &self.global_monthly,
        }
    }
}

/// Cheaply cloneable handle to the metering state; clones share counters,
/// cooldowns, and the post-processing concurrency budget.
#[derive(Clone)]
pub struct Governor {
    pub(crate) inner: Arc<GovernorInner>,
}

impl Governor {
    pub fn builder() -> GovernorBuilder {
        GovernorBuilder::default()
    }

    /// Admission check for one request. Evaluation order: token balance
    /// (unless waived), daily quota, monthly quota, feature flag, global
    /// shutdown gate. The ledger read runs under the precheck timeout and
    /// fails closed.
    pub async fn check_and_admit(
        &self,
        user_id: &str,
        category: &str,
        feature: &str,
    ) -> Result<AdmitDecision, Error> {
        self.check_and_admit_at(user_id, category, feature, Utc::now())
            .await
    }

    /// [`check_and_admit`](Self::check_and_admit) with an explicit clock,
    /// for deterministic window handling in tests and replays.
    pub async fn check_and_admit_at(
        &self,
        user_id: &str,
        category: &str,
        feature: &str,
        now: DateTime<Utc>,
    ) -> Result<AdmitDecision, Error> {
        let inner = &self.inner;
        let token_cost = inner.token_costs.token_price(category, feature);

        let account = match timeout(
            inner.config.precheck_timeout,
            inner.ledger.get_account(user_id),
        )
        .await
        {
            Ok(Ok(account)) => account,
            Ok(Err(LedgerError::NotFound { user_id })) => {
                return Err(Error::AccountNotFound { user_id });
            }
            Ok(Err(LedgerError::Unavailable(message))) => {
                return Err(Error::LedgerUnavailable(message));
            }
            Err(_) => return Err(Error::LedgerTimeout(inner.config.precheck_timeout)),
        };

        let waived = inner.config.is_deduction_waived(category, feature);
        if !waived && account.token_balance < token_cost {
            return Ok(AdmitDecision::Denied {
                token_cost,
                reason: DenyReason::InsufficientTokens {
                    required: token_cost,
                    balance: account.token_balance,
                },
            });
        }

        for period in Period::ALL {
            let used = inner.counters.current(user_id, feature, period, now);
            let limit = inner
                .quotas
                .lookup(&account.subscription_tier, period, feature);
            if !evaluate(limit, used).allowed {
                // Unlimited never denies, so the limit here is always finite.
                let limit = match limit {
                    QuotaLimit::Limit(max) => max,
                    QuotaLimit::Unlimited => u64::MAX,
                };
                return Ok(AdmitDecision::Denied {
                    token_cost,
                    reason: DenyReason::QuotaExceeded {
                        period,
                        limit,
                        used,
                    },
                });
            }
        }

        let flag = flag_key(category, feature);
        if !inner.flags.is_enabled(&flag) {
            return Ok(AdmitDecision::Denied {
                token_cost,
                reason: DenyReason::FeatureDisabled { flag },
            });
        }

        for period in Period::ALL {
            let spend = inner.global_spend(period).snapshot(now);
            if spend >= inner.config.global_thresholds.for_period(period).shutdown {
                return Ok(AdmitDecision::Denied {
                    token_cost,
                    reason: DenyReason::GlobalShutdown { period },
                });
            }
        }

        let deducted = if waived { 0 } else { token_cost };
        Ok(AdmitDecision::Allowed {
            token_cost,
            remaining_balance: account.token_balance - deducted,
        })
    }

    /// Platform-wide spend in the window containing `now`.
    pub fn global_spend(&self, period: Period, now: DateTime<Utc>) -> rust_decimal::Decimal {
        self.inner.global_spend(period).snapshot(now)
    }

    /// One user's spend in the window containing `now`.
    pub fn user_spend(
        &self,
        user_id: &str,
        period: Period,
        now: DateTime<Utc>,
    ) -> rust_decimal::Decimal {
        self.inner.user_costs.spend(user_id, period, now)
    }

    /// Completed requests for (user, feature) in the window containing `now`.
    pub fn usage_count(
        &self,
        user_id: &str,
        feature: &str,
        period: Period,
        now: DateTime<Utc>,
    ) -> u64 {
        self.inner.counters.current(user_id, feature, period, now)
    }

    /// Drop metering entries whose windows no longer contain `now`. Cheap;
    /// intended for a periodic maintenance sweep.
    pub fn prune_stale(&self, now: DateTime<Utc>) {
        self.inner.counters.prune(now);
        self.inner.user_costs.prune(now);
    }
}

/// Assembles a [`Governor`]. Ledger, directory, and notifier are required;
/// everything else has shipped defaults.
#[derive(Default)]
pub struct GovernorBuilder {
    config: Option<GovernorConfig>,
    tariffs: Option<TariffTable>,
    token_costs: Option<TokenCostTable>,
    quotas: Option<QuotaTable>,
    ledger: Option<Arc<dyn Ledger>>,
    directory: Option<Arc<dyn Directory>>,
    notifier: Option<Arc<dyn Notifier>>,
    flags: Option<Arc<dyn FeatureFlags>>,
}

impl GovernorBuilder {
    pub fn config(mut self, config: GovernorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn tariffs(mut self, tariffs: TariffTable) -> Self {
        self.tariffs = Some(tariffs);
        self
    }

    pub fn token_costs(mut self, token_costs: TokenCostTable) -> Self {
        self.token_costs = Some(token_costs);
        self
    }

    pub fn quotas(mut self, quotas: QuotaTable) -> Self {
        self.quotas = Some(quotas);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn flags(mut self, flags: Arc<dyn FeatureFlags>) -> Self {
        self.flags = Some(flags);
        self
    }

    /// # Panics
    ///
    /// Panics if the ledger, directory, or notifier was not provided; these
    /// are wiring mistakes caught at startup, not runtime conditions.
    pub fn build(self) -> Governor {
        let config = self.config.unwrap_or_default();
        let ledger = self.ledger.expect("GovernorBuilder requires a ledger");
        let directory = self.directory.expect("GovernorBuilder requires a directory");
        let notifier = self.notifier.expect("GovernorBuilder requires a notifier");
        let flags = self
            .flags
            .unwrap_or_else(|| Arc::new(InMemoryFlags::new()));

        let mut alerts =
            AlertDispatcher::new(directory, notifier).cooldown(config.alert_cooldown);
        if let Some(fallback) = &config.fallback_recipient {
            alerts = alerts.fallback_recipient(fallback.clone());
        }

        let now = Utc::now();
        let permits = Arc::new(Semaphore::new(config.postprocess_concurrency));
        Governor {
            inner: Arc::new(GovernorInner {
                tariffs: self.tariffs.unwrap_or_default(),
                token_costs: self.token_costs.unwrap_or_default(),
                quotas: self.quotas.unwrap_or_default(),
                ledger,
                flags,
                counters: UsageCounters::new(),
                global_daily: CostAccumulator::new(Period::Daily, now),
                global_monthly: CostAccumulator::new(Period::Monthly, now),
                user_costs: UserCostBook::new(),
                alerts,
                postprocess_permits: permits,
                config,
            }),
        }
    }
}
