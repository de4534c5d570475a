//! Operator notifications
//!
//! Milestones (job start, rotation, terminal outcomes) are pushed to a
//! webhook when one is configured. Delivery is best effort; a dead
//! webhook must never take a transfer down with it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use rotor_core::config::Config;

/// Receiver for human-facing milestone messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one message. Failures are handled internally.
    async fn notify(&self, message: &str);
}

/// Notifier used when no webhook is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _message: &str) {}
}

/// Posts messages to a Discord- or Slack-style webhook.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Picks the notifier for a config: webhook when a URL is set,
    /// otherwise the no-op.
    pub fn from_config(config: &Config) -> Arc<dyn Notifier> {
        let url = config.webhook_url.trim();
        if url.is_empty() {
            Arc::new(NoopNotifier)
        } else {
            Arc::new(Self::new(url))
        }
    }
}

/// Builds the webhook body. Slack endpoints want a `text` field, Discord
/// wants `content`; both get the same bolded prefix.
fn payload(url: &str, message: &str) -> Value {
    let text = format!("**[rotor]** {message}");
    if url.contains("hooks.slack.com") {
        json!({ "text": text })
    } else {
        json!({ "content": text })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) {
        let body = payload(&self.url, message);
        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("delivered webhook notification");
            }
            Ok(response) => {
                warn!("webhook returned status {}", response.status());
            }
            Err(e) => {
                warn!("failed to deliver webhook notification: {e}");
            }
        }
    }
}
