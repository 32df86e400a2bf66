//! Alert recipient directory and notification delivery.

use async_trait::async_trait;
use thiserror::Error;

use crate::alert::AlertPayload;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("recipient lookup failed: {0}")]
    Directory(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Resolves the operator accounts that receive cost alerts.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn list_admin_recipients(&self) -> Result<Vec<String>, NotifyError>;
}

/// Delivers a rendered alert to a set of recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipients: &[String], payload: &AlertPayload) -> Result<(), NotifyError>;
}
