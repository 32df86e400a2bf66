//! Deduplicated alert delivery.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use super::{AlertLevel, AlertPayload};
use crate::external::{Directory, Notifier, TopSpender};
use crate::quota::Period;

/// Minimum spacing between two alerts sharing a dedup key.
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::hours(4);

/// Non-breach context attached to an alert.
#[derive(Debug, Clone, Default)]
pub struct AlertContext {
    /// Present for user-scoped alerts; also part of the dedup key.
    pub user_id: Option<String>,
    pub top_spenders: Vec<TopSpender>,
}

impl AlertContext {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            top_spenders: Vec::new(),
        }
    }

    pub fn with_top_spenders(mut self, top_spenders: Vec<TopSpender>) -> Self {
        self.top_spenders = top_spenders;
        self
    }
}

/// Sends threshold alerts, at most once per dedup key per cooldown window.
///
/// The cooldown claim happens before delivery, under the key's shard lock,
/// so two concurrent breaches of the same key produce one send. A failed
/// delivery keeps its claim; a flaky mail path must not turn into an alert
/// storm.
pub struct AlertDispatcher {
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    fallback_recipient: Option<String>,
    cooldown: Duration,
    last_sent: DashMap<String, DateTime<Utc>>,
}

impl AlertDispatcher {
    pub fn new(directory: Arc<dyn Directory>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            directory,
            notifier,
            fallback_recipient: None,
            cooldown: DEFAULT_ALERT_COOLDOWN,
            last_sent: DashMap::new(),
        }
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Address used when the directory returns no admins (or fails).
    pub fn fallback_recipient(mut self, address: impl Into<String>) -> Self {
        self.fallback_recipient = Some(address.into());
        self
    }

    fn dedup_key(level: AlertLevel, period: Period, context: &AlertContext) -> String {
        match &context.user_id {
            Some(user_id) => format!("{}:{}:user:{}", level, period, user_id),
            None => format!("{}:{}", level, period),
        }
    }

    /// Claim the key for `now` unless it was claimed within the cooldown.
    /// Holds the entry lock for the whole check-then-set, so exactly one of
    /// two concurrent callers wins.
    fn claim(&self, key: &str, now: DateTime<Utc>) -> bool {
        match self.last_sent.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if now - *entry.get() < self.cooldown {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Dispatch an alert unless its dedup key is within the cooldown window.
    /// Returns whether a notification was delivered.
    pub async fn maybe_alert(
        &self,
        level: AlertLevel,
        period: Period,
        current_cost: Decimal,
        threshold: Decimal,
        context: AlertContext,
        now: DateTime<Utc>,
    ) -> bool {
        let key = Self::dedup_key(level, period, &context);
        if !self.claim(&key, now) {
            debug!(key, "alert suppressed by cooldown");
            return false;
        }

        let mut recipients = match self.directory.list_admin_recipients().await {
            Ok(recipients) => recipients,
            Err(err) => {
                // Claim stays; the breach was acted on even if lookup failed.
                error!(key, %err, "admin recipient lookup failed");
                Vec::new()
            }
        };
        if let Some(fallback) = &self.fallback_recipient
            && !recipients.contains(fallback)
        {
            recipients.push(fallback.clone());
        }
        if recipients.is_empty() {
            error!(key, "no recipients available, alert dropped");
            return false;
        }

        let mut payload = AlertPayload::new(level, period, current_cost, threshold, now)
            .with_top_spenders(context.top_spenders);
        if let Some(user_id) = context.user_id {
            payload = payload.for_user(user_id);
        }

        match self.notifier.send(&recipients, &payload).await {
            Ok(()) => {
                info!(
                    key,
                    %current_cost,
                    %threshold,
                    recipients = recipients.len(),
                    "cost alert sent"
                );
                true
            }
            Err(err) => {
                error!(key, %err, "alert delivery failed, cooldown claim retained");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::NotifyError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDirectory(Vec<String>);

    #[async_trait]
    impl Directory for FixedDirectory {
        async fn list_admin_recipients(&self) -> Result<Vec<String>, NotifyError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, _: &[String], _: &AlertPayload) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Delivery("smtp down".into()));
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn dispatcher(notifier: Arc<CountingNotifier>) -> AlertDispatcher {
        AlertDispatcher::new(
            Arc::new(FixedDirectory(vec!["ops@example.com".into()])),
            notifier,
        )
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_second_send() {
        let notifier = Arc::new(CountingNotifier::default());
        let dispatcher = dispatcher(Arc::clone(&notifier));
        let t0 = Utc::now();

        let sent = dispatcher
            .maybe_alert(
                AlertLevel::Warning,
                Period::Daily,
                dec!(101),
                dec!(100),
                AlertContext::global(),
                t0,
            )
            .await;
        assert!(sent);

        let suppressed = dispatcher
            .maybe_alert(
                AlertLevel::Warning,
                Period::Daily,
                dec!(110),
                dec!(100),
                AlertContext::global(),
                t0 + Duration::hours(1),
            )
            .await;
        assert!(!suppressed);

        let resent = dispatcher
            .maybe_alert(
                AlertLevel::Warning,
                Period::Daily,
                dec!(120),
                dec!(100),
                AlertContext::global(),
                t0 + Duration::hours(5),
            )
            .await;
        assert!(resent);

        assert_eq!(notifier.sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_share_cooldown() {
        let notifier = Arc::new(CountingNotifier::default());
        let dispatcher = dispatcher(Arc::clone(&notifier));
        let t0 = Utc::now();

        for (level, period) in [
            (AlertLevel::Warning, Period::Daily),
            (AlertLevel::Warning, Period::Monthly),
            (AlertLevel::Critical, Period::Daily),
        ] {
            assert!(
                dispatcher
                    .maybe_alert(level, period, dec!(1), dec!(1), AlertContext::global(), t0)
                    .await
            );
        }
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_user_alerts_have_their_own_key() {
        let notifier = Arc::new(CountingNotifier::default());
        let dispatcher = dispatcher(Arc::clone(&notifier));
        let t0 = Utc::now();

        assert!(
            dispatcher
                .maybe_alert(
                    AlertLevel::Warning,
                    Period::Daily,
                    dec!(101),
                    dec!(100),
                    AlertContext::global(),
                    t0,
                )
                .await
        );
        assert!(
            dispatcher
                .maybe_alert(
                    AlertLevel::Warning,
                    Period::Daily,
                    dec!(60),
                    dec!(50),
                    AlertContext::user("u1"),
                    t0,
                )
                .await
        );
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_claim() {
        let notifier = Arc::new(CountingNotifier {
            sent: AtomicUsize::new(0),
            fail: true,
        });
        let dispatcher = dispatcher(Arc::clone(&notifier));
        let t0 = Utc::now();

        let sent = dispatcher
            .maybe_alert(
                AlertLevel::Critical,
                Period::Daily,
                dec!(600),
                dec!(500),
                AlertContext::global(),
                t0,
            )
            .await;
        assert!(!sent);

        // Still inside the cooldown: the failed attempt claimed the key.
        let retried = dispatcher
            .maybe_alert(
                AlertLevel::Critical,
                Period::Daily,
                dec!(600),
                dec!(500),
                AlertContext::global(),
                t0 + Duration::minutes(5),
            )
            .await;
        assert!(!retried);
    }

    #[tokio::test]
    async fn test_concurrent_claims_send_once() {
        let notifier = Arc::new(CountingNotifier::default());
        let dispatcher = Arc::new(dispatcher(Arc::clone(&notifier)));
        let t0 = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let dispatcher = Arc::clone(&dispatcher);
            handles.push(tokio::spawn(async move {
                dispatcher
                    .maybe_alert(
                        AlertLevel::Warning,
                        Period::Daily,
                        dec!(150),
                        dec!(100),
                        AlertContext::global(),
                        t0,
                    )
                    .await
            }));
        }

        let mut sends = 0;
        for handle in handles {
            if handle.await.unwrap() {
                sends += 1;
            }
        }
        assert_eq!(sends, 1);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_recipient_used_when_directory_empty() {
        let notifier = Arc::new(CountingNotifier::default());
        let dispatcher = AlertDispatcher::new(
            Arc::new(FixedDirectory(Vec::new())),
            notifier.clone(),
        )
        .fallback_recipient("root@example.com");

        let sent = dispatcher
            .maybe_alert(
                AlertLevel::Warning,
                Period::Daily,
                dec!(101),
                dec!(100),
                AlertContext::global(),
                Utc::now(),
            )
            .await;
        assert!(sent);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
    }
}
