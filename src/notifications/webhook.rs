//! Webhook mail relay
//!
//! Posts each message as JSON to a relay endpoint that turns it into an
//! email. One attempt per message; failures are logged.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::templates::{operator_html, welcome_html, welcome_text};
use super::{DeliveryError, DeliveryResult, Message, Notifier};
use crate::config::NotificationConfig;

/// Notifier backed by an HTTP mail relay
///
/// # Payload Format
///
/// ```json
/// {
///   "id": "uuid",
///   "to": "ada@example.com",
///   "subject": "Tableau Public Stats Service",
///   "text": "plain body",
///   "html": "<html>...</html>",
///   "created_at": "2024-01-01T12:00:00Z"
/// }
/// ```
pub struct WebhookNotifier {
    client: Client,
    url: String,
    auth_token: Option<String>,
    service_name: String,
    operator_email: String,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::InvalidConfig` for a non-HTTP URL or a zero
    /// timeout, and `DeliveryError::Http` if the client cannot be built
    pub fn new(
        config: &NotificationConfig,
        url: &str,
        operator_email: &str,
    ) -> DeliveryResult<Self> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(DeliveryError::InvalidConfig(
                "Webhook URL must start with http:// or https://".to_string(),
            ));
        }
        if config.timeout_secs == 0 {
            return Err(DeliveryError::InvalidConfig(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            auth_token: config.webhook_token.clone(),
            service_name: config.service_name.clone(),
            operator_email: operator_email.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post one message to the relay
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError` if the request fails or the relay answers
    /// with a non-success status
    pub async fn deliver(&self, message: &Message) -> DeliveryResult<()> {
        let mut request = self.client.post(&self.url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(id = %message.id, to = %message.to, "Notification delivered");
        Ok(())
    }

    async fn send(&self, message: Message) {
        if let Err(e) = self.deliver(&message).await {
            tracing::error!(
                url = %self.url,
                to = %message.to,
                subject = %message.subject,
                error = %e,
                "Failed to deliver notification"
            );
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_operator(&self, subject: &str, body: &str) {
        if self.operator_email.is_empty() {
            tracing::warn!(subject, "No operator address configured, dropping notification");
            return;
        }
        let message = Message::new(&self.operator_email, subject, body, operator_html(body));
        self.send(message).await;
    }

    async fn notify_subscriber(&self, recipient: &str, first_name: &str, destination: &str) {
        let message = Message::new(
            recipient,
            &self.service_name,
            welcome_text(&self.service_name, first_name, destination),
            welcome_html(&self.service_name, first_name, destination),
        );
        self.send(message).await;
    }
}
