//! Post-completion accounting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::Governor;
use crate::alert::{AlertContext, AlertLevel};
use crate::external::{TopSpender, UsageRecord};
use crate::quota::Period;
use crate::tariff::ProviderUsage;

/// Response metadata for one completed request, reported by the caller once
/// the downstream handler has finished.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub user_id: String,
    pub category: String,
    pub feature: String,
    pub provider: String,
    pub model: String,
    pub usage: ProviderUsage,
    /// Provider-reported cost when known; priced from the tariff table
    /// otherwise.
    pub actual_cost: Option<Decimal>,
    pub response_time_ms: u64,
}

impl CompletionReport {
    pub fn new(
        user_id: impl Into<String>,
        category: impl Into<String>,
        feature: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category: category.into(),
            feature: feature.into(),
            provider: String::new(),
            model: String::new(),
            usage: ProviderUsage::default(),
            actual_cost: None,
            response_time_ms: 0,
        }
    }

    pub fn provider_call(
        mut self,
        provider: impl Into<String>,
        model: impl Into<String>,
        usage: ProviderUsage,
    ) -> Self {
        self.provider = provider.into();
        self.model = model.into();
        self.usage = usage;
        self
    }

    pub fn actual_cost(mut self, cost: Decimal) -> Self {
        self.actual_cost = Some(cost);
        self
    }

    pub fn response_time_ms(mut self, millis: u64) -> Self {
        self.response_time_ms = millis;
        self
    }
}

impl Governor {
    /// Schedule post-processing for a completed request and return
    /// immediately. The work runs on a detached task under the configured
    /// concurrency bound; its failures are logged, never surfaced, and the
    /// already-sent response is unaffected. The handle is returned so tests
    /// and drain-on-shutdown paths can await it.
    pub fn record_completion(&self, report: CompletionReport) -> JoinHandle<()> {
        let governor = self.clone();
        tokio::spawn(async move {
            let permits = governor.inner.postprocess_permits.clone();
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                // Semaphore closed means the process is shutting down.
                Err(_) => return,
            };
            governor.apply_completion(report, Utc::now()).await;
        })
    }

    /// The post-processing pipeline itself, with an explicit clock. Public
    /// for embedders that manage their own scheduling; [`record_completion`]
    /// is the fire-and-forget entry point.
    ///
    /// [`record_completion`]: Self::record_completion
    pub async fn apply_completion(&self, report: CompletionReport, now: DateTime<Utc>) {
        let inner = &self.inner;
        let token_cost = inner
            .token_costs
            .token_price(&report.category, &report.feature);

        if !inner
            .config
            .is_deduction_waived(&report.category, &report.feature)
        {
            match timeout(
                inner.config.postprocess_timeout,
                inner.ledger.deduct_tokens(&report.user_id, token_cost),
            )
            .await
            {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => warn!(
                    user_id = %report.user_id,
                    token_cost,
                    "balance drained before deduction, tokens not charged"
                ),
                Ok(Err(err)) => error!(user_id = %report.user_id, %err, "token deduction failed"),
                Err(_) => error!(user_id = %report.user_id, "token deduction timed out"),
            }
        }

        let cost = report.actual_cost.unwrap_or_else(|| {
            inner
                .tariffs
                .cost(&report.provider, &report.model, &report.usage)
        });

        let record = UsageRecord {
            id: Uuid::new_v4(),
            user_id: report.user_id.clone(),
            category: report.category.clone(),
            feature: report.feature.clone(),
            tokens_used: token_cost,
            api_cost: cost,
            provider: report.provider.clone(),
            model: report.model.clone(),
            response_time_ms: report.response_time_ms,
            created_at: now,
        };
        match timeout(
            inner.config.postprocess_timeout,
            inner.ledger.append_usage_record(record),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(user_id = %report.user_id, %err, "usage record write failed"),
            Err(_) => error!(user_id = %report.user_id, "usage record write timed out"),
        }

        for period in Period::ALL {
            inner
                .counters
                .increment(&report.user_id, &report.feature, period, now);
        }

        let daily_total = inner.global_daily.add(cost, now);
        let monthly_total = inner.global_monthly.add(cost, now);
        let (user_daily, _) = inner.user_costs.add(&report.user_id, cost, now);
        debug!(
            user_id = %report.user_id,
            feature = %report.feature,
            %cost,
            %daily_total,
            %monthly_total,
            "usage settled"
        );

        // One breach event gets at most one global alert: per period only
        // the highest breached severity is considered, and the sweep stops
        // at the first delivered notification.
        for (period, total) in [
            (Period::Daily, daily_total),
            (Period::Monthly, monthly_total),
        ] {
            let thresholds = inner.config.global_thresholds.for_period(period);
            let Some(level) = thresholds.breached(total) else {
                continue;
            };
            let context =
                AlertContext::global().with_top_spenders(self.top_spenders(level, period, now).await);
            if inner
                .alerts
                .maybe_alert(level, period, total, thresholds.for_level(level), context, now)
                .await
            {
                break;
            }
        }

        let user_thresholds = inner.config.user_thresholds.for_period(Period::Daily);
        if let Some(level) = user_thresholds.breached(user_daily) {
            inner
                .alerts
                .maybe_alert(
                    level,
                    Period::Daily,
                    user_daily,
                    user_thresholds.for_level(level),
                    AlertContext::user(report.user_id.clone()),
                    now,
                )
                .await;
        }
    }

    /// Spender breakdown attached to critical and shutdown alerts. Lookup
    /// failures degrade to an empty list.
    async fn top_spenders(
        &self,
        level: AlertLevel,
        period: Period,
        now: DateTime<Utc>,
    ) -> Vec<TopSpender> {
        if level < AlertLevel::Critical {
            return Vec::new();
        }
        let inner = &self.inner;
        match timeout(
            inner.config.postprocess_timeout,
            inner.ledger.top_spenders(
                period.window_start(now),
                now,
                inner.config.top_spender_count,
            ),
        )
        .await
        {
            Ok(Ok(spenders)) => spenders,
            Ok(Err(err)) => {
                warn!(%err, "top spender lookup failed, alert sent without breakdown");
                Vec::new()
            }
            Err(_) => {
                warn!("top spender lookup timed out, alert sent without breakdown");
                Vec::new()
            }
        }
    }
}
