//! Governor configuration.

use std::collections::HashSet;
use std::time::Duration;

use crate::alert::{DEFAULT_ALERT_COOLDOWN, ThresholdTable};

/// Default timeout for the admission-path ledger read. Admission fails
/// closed when it elapses.
pub const DEFAULT_PRECHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Default timeout for each post-processing I/O call; an elapsed attempt is
/// logged and abandoned, never retried inline.
pub const DEFAULT_POSTPROCESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on concurrently running post-processing tasks.
pub const DEFAULT_POSTPROCESS_CONCURRENCY: usize = 32;

/// Tunables for the request governor. Built once at startup.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    pub alert_cooldown: chrono::Duration,
    pub precheck_timeout: Duration,
    pub postprocess_timeout: Duration,
    pub postprocess_concurrency: usize,
    /// Alerts go here when the directory yields no admins.
    pub fallback_recipient: Option<String>,
    pub global_thresholds: ThresholdTable,
    pub user_thresholds: ThresholdTable,
    /// Number of top spenders attached to critical and shutdown alerts.
    pub top_spender_count: usize,
    /// `category.feature` keys whose balance check and deduction are skipped
    /// (flows billed upstream).
    pub deduction_waived: HashSet<String>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            alert_cooldown: DEFAULT_ALERT_COOLDOWN,
            precheck_timeout: DEFAULT_PRECHECK_TIMEOUT,
            postprocess_timeout: DEFAULT_POSTPROCESS_TIMEOUT,
            postprocess_concurrency: DEFAULT_POSTPROCESS_CONCURRENCY,
            fallback_recipient: None,
            global_thresholds: ThresholdTable::global_defaults(),
            user_thresholds: ThresholdTable::per_user_defaults(),
            top_spender_count: 5,
            deduction_waived: HashSet::new(),
        }
    }
}

impl GovernorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alert_cooldown(mut self, cooldown: chrono::Duration) -> Self {
        self.alert_cooldown = cooldown;
        self
    }

    pub fn precheck_timeout(mut self, timeout: Duration) -> Self {
        self.precheck_timeout = timeout;
        self
    }

    pub fn postprocess_timeout(mut self, timeout: Duration) -> Self {
        self.postprocess_timeout = timeout;
        self
    }

    pub fn postprocess_concurrency(mut self, limit: usize) -> Self {
        self.postprocess_concurrency = limit.max(1);
        self
    }

    pub fn fallback_recipient(mut self, address: impl Into<String>) -> Self {
        self.fallback_recipient = Some(address.into());
        self
    }

    pub fn global_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.global_thresholds = thresholds;
        self
    }

    pub fn user_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.user_thresholds = thresholds;
        self
    }

    pub fn top_spender_count(mut self, count: usize) -> Self {
        self.top_spender_count = count;
        self
    }

    pub fn waive_deduction(mut self, category: &str, feature: &str) -> Self {
        self.deduction_waived.insert(format!("{category}.{feature}"));
        self
    }

    pub fn is_deduction_waived(&self, category: &str, feature: &str) -> bool {
        self.deduction_waived
            .contains(&format!("{category}.{feature}"))
    }
}
