//! Admission decision types.

use serde::Serialize;
use thiserror::Error;

use crate::quota::Period;

/// Feature-flag key for a billable feature.
pub fn flag_key(category: &str, feature: &str) -> String {
    format!("{category}.{feature}")
}

/// Why a request was turned away at admission. Each variant carries the
/// limiting numbers so callers can render an actionable message instead of a
/// generic failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DenyReason {
    #[error("insufficient tokens: feature costs {required}, balance is {balance}")]
    InsufficientTokens { required: u64, balance: u64 },

    #[error("{period} quota exceeded: {used} of {limit} used")]
    QuotaExceeded { period: Period, limit: u64, used: u64 },

    #[error("feature disabled: {flag}")]
    FeatureDisabled { flag: String },

    #[error("global {period} spend limit breached, feature access suspended")]
    GlobalShutdown { period: Period },
}

impl DenyReason {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::InsufficientTokens { .. } => "insufficient_tokens",
            DenyReason::QuotaExceeded { .. } => "quota_exceeded",
            DenyReason::FeatureDisabled { .. } => "feature_disabled",
            DenyReason::GlobalShutdown { .. } => "global_shutdown",
        }
    }
}

/// Outcome of [`Governor::check_and_admit`](crate::Governor::check_and_admit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmitDecision {
    Allowed {
        /// Tokens that will be deducted after completion.
        token_cost: u64,
        /// Balance after the pending deduction.
        remaining_balance: u64,
    },
    Denied {
        token_cost: u64,
        reason: DenyReason,
    },
}

impl AdmitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmitDecision::Allowed { .. })
    }

    pub fn token_cost(&self) -> u64 {
        match self {
            AdmitDecision::Allowed { token_cost, .. }
            | AdmitDecision::Denied { token_cost, .. } => *token_cost,
        }
    }

    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            AdmitDecision::Allowed { .. } => None,
            AdmitDecision::Denied { reason, .. } => Some(reason),
        }
    }
}
