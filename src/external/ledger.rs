//! Durable usage ledger interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by ledger backends.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account not found: {user_id}")]
    NotFound { user_id: String },

    /// Backend unreachable or failing; admission fails closed on this.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// A billable account. Owned and mutated exclusively by the ledger; the
/// governor requests deductions and never writes the balance directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: String,
    pub token_balance: u64,
    pub subscription_tier: String,
}

/// One completed billable request. Append-only, immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: String,
    pub category: String,
    pub feature: String,
    pub tokens_used: u64,
    pub api_cost: Decimal,
    pub provider: String,
    pub model: String,
    pub response_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSpender {
    pub user_id: String,
    pub cost: Decimal,
}

/// Durable store of balances and usage history.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_account(&self, user_id: &str) -> Result<Account, LedgerError>;

    /// Deduct `amount` tokens iff the balance covers it. Returns whether the
    /// deduction was applied; the balance never goes negative.
    async fn deduct_tokens(&self, user_id: &str, amount: u64) -> Result<bool, LedgerError>;

    async fn append_usage_record(&self, record: UsageRecord) -> Result<(), LedgerError>;

    /// Total API cost over `[from, to]`, for one user or platform-wide.
    /// Both ends are inclusive so a query ending at "now" sees records
    /// written in the same instant.
    async fn aggregate_cost(
        &self,
        user_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, LedgerError>;

    async fn top_spenders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TopSpender>, LedgerError>;
}
