//! Customer notifications.
//!
//! Delivery is a collaborator behind the [`Notifier`] trait. Notifications
//! are dispatched on a spawned task so a slow or failing notifier never holds
//! up or aborts the order change that triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use bubbling_bath_core::Email;

/// Errors a notifier can report.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// A message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: Email,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "notification"
        );
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct OutboxNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl OutboxNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far.
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

/// Fire-and-forget delivery.
///
/// Must be called from within a Tokio runtime. Failures are logged.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notification).await {
            warn!(
                error = %e,
                recipient = %notification.recipient,
                subject = %notification.subject,
                "notification failed"
            );
        }
    });
}
