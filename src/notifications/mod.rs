//! Outbound notifications
//!
//! The sync and summary passes report to two audiences: the operator (run
//! errors, new subscriber counts) and subscribers (a one-time welcome with
//! the destination link). Delivery is fire-and-forget: failures are logged
//! and never reach the caller.
//!
//! ```text
//!  SyncOrchestrator / SummaryAggregator
//!                 │
//!                 ▼
//!          dyn Notifier
//!          ┌──────┴──────┐
//!          ▼             ▼
//!   WebhookNotifier  LogNotifier
//! ```

pub mod templates;
pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::NotificationConfig;

pub use webhook::WebhookNotifier;

/// Result type for delivery attempts
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Errors raised while delivering a message
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// One outbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            html: html.into(),
            created_at: Utc::now(),
        }
    }
}

/// Notification capability used by the sync and summary passes
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a report to the operator
    async fn notify_operator(&self, subject: &str, body: &str);

    /// Send the welcome message to a newly provisioned subscriber
    async fn notify_subscriber(&self, recipient: &str, first_name: &str, destination: &str);
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_operator(&self, subject: &str, body: &str) {
        tracing::info!(subject, body, "Operator notification");
    }

    async fn notify_subscriber(&self, recipient: &str, first_name: &str, destination: &str) {
        tracing::info!(recipient, first_name, destination, "Subscriber welcome");
    }
}

/// Build the notifier described by the configuration
///
/// A configured webhook that cannot be set up falls back to logging.
pub fn from_config(config: &NotificationConfig, operator_email: &str) -> Arc<dyn Notifier> {
    match &config.webhook_url {
        Some(url) => match WebhookNotifier::new(config, url, operator_email) {
            Ok(notifier) => Arc::new(notifier),
            Err(e) => {
                tracing::warn!(error = %e, "Webhook notifier unavailable, logging notifications");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    }
}
