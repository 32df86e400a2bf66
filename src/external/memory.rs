//! In-process ledger backend.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::{Account, Ledger, LedgerError, TopSpender, UsageRecord};

/// In-memory [`Ledger`] with the same guarantees as a durable backend:
/// conditional deductions are atomic per account and the balance never goes
/// negative. Used by the test suite and by embedders without a store yet.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    accounts: DashMap<String, Account>,
    records: Mutex<Vec<UsageRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_account(&self, account: Account) {
        self.accounts.insert(account.user_id.clone(), account);
    }

    pub fn credit_tokens(&self, user_id: &str, amount: u64) {
        if let Some(mut account) = self.accounts.get_mut(user_id) {
            account.token_balance += amount;
        }
    }

    pub fn record_count(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_account(&self, user_id: &str) -> Result<Account, LedgerError> {
        self.accounts
            .get(user_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| LedgerError::NotFound {
                user_id: user_id.to_string(),
            })
    }

    async fn deduct_tokens(&self, user_id: &str, amount: u64) -> Result<bool, LedgerError> {
        // The entry guard serializes all mutations of one account, so the
        // balance check and the decrement are a single step.
        let mut account = self
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::NotFound {
                user_id: user_id.to_string(),
            })?;
        if account.token_balance < amount {
            return Ok(false);
        }
        account.token_balance -= amount;
        Ok(true)
    }

    async fn append_usage_record(&self, record: UsageRecord) -> Result<(), LedgerError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    async fn aggregate_cost(
        &self,
        user_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, LedgerError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|r| r.created_at >= from && r.created_at <= to)
            .filter(|r| user_id.is_none_or(|id| r.user_id == id))
            .map(|r| r.api_cost)
            .sum())
    }

    async fn top_spenders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TopSpender>, LedgerError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut by_user: HashMap<&str, Decimal> = HashMap::new();
        for record in records
            .iter()
            .filter(|r| r.created_at >= from && r.created_at <= to)
        {
            *by_user.entry(record.user_id.as_str()).or_default() += record.api_cost;
        }

        let mut spenders: Vec<TopSpender> = by_user
            .into_iter()
            .map(|(user_id, cost)| TopSpender {
                user_id: user_id.to_string(),
                cost,
            })
            .collect();
        spenders.sort_by(|a, b| b.cost.cmp(&a.cost));
        spenders.truncate(limit);
        Ok(spenders)
    }
}
