//! Operator notifications.
//!
//! Raised when the calendar source is misconfigured or unreachable. Delivery is
//! fire-and-forget: a failing notifier is logged and otherwise ignored.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{NetworkError, ReqwestErrorExt};

/// A single notice for the site operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorNotice {
    pub subject: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
    pub site_url: String,
}

impl OperatorNotice {
    pub fn new(
        subject: impl Into<String>,
        message: impl Into<String>,
        occurred_at: DateTime<Utc>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
            occurred_at,
            site_url: site_url.into(),
        }
    }

    /// Plain-text body with the server time and site footer.
    pub fn body(&self) -> String {
        format!(
            "{}\n------------------\nServer dateTime: {}\nSite URL: {}\n",
            self.message,
            self.occurred_at.format("%d.%m.%Y %H:%M:%S"),
            self.site_url
        )
    }
}

/// Sink for operator notices.
pub trait Notifier: Send + Sync {
    /// Dispatch a notice. Must not block on delivery and must not fail.
    fn notify(&self, message: &str, at: DateTime<Utc>);
}

/// Logs notices at `warn`.
#[derive(Debug, Clone)]
pub struct TracingNotifier {
    subject: String,
    site_url: String,
}

impl TracingNotifier {
    pub fn new(subject: impl Into<String>, site_url: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            site_url: site_url.into(),
        }
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, at: DateTime<Utc>) {
        tracing::warn!(
            subject = %self.subject,
            site_url = %self.site_url,
            occurred_at = %at.to_rfc3339(),
            "Operator notice: {}",
            message
        );
    }
}

/// Posts notices as JSON to a webhook, on a background task.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Arc<reqwest::Client>,
    webhook_url: String,
    subject: String,
    site_url: String,
}

impl WebhookNotifier {
    pub fn new(
        webhook_url: impl Into<String>,
        subject: impl Into<String>,
        site_url: impl Into<String>,
    ) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self {
            client: Arc::new(client),
            webhook_url: webhook_url.into(),
            subject: subject.into(),
            site_url: site_url.into(),
        })
    }

    /// Deliver one notice and wait for the response.
    pub async fn deliver(&self, notice: &OperatorNotice) -> Result<(), NetworkError> {
        let payload = serde_json::json!({
            "subject": notice.subject,
            "text": notice.body(),
            "occurred_at": notice.occurred_at.to_rfc3339(),
            "site_url": notice.site_url,
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.into_network_error())?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NetworkError::ServerError {
                status: status.as_u16(),
                message: format!("webhook rejected notice ({})", status),
            })
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, message: &str, at: DateTime<Utc>) {
        let notice = OperatorNotice::new(&self.subject, message, at, &self.site_url);
        tracing::warn!("Operator notice: {}", notice.message);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!("No async runtime, dropping webhook notice");
            return;
        };

        let notifier = self.clone();
        handle.spawn(async move {
            if let Err(e) = notifier.deliver(&notice).await {
                tracing::error!("Webhook notice delivery failed: {}", e);
            }
        });
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<OperatorNotice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<OperatorNotice> {
        self.notices.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.notices.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, at: DateTime<Utc>) {
        self.notices
            .lock()
            .push(OperatorNotice::new("recorded", message, at, "test"));
    }
}
