//! Outbound publication hooks.
//!
//! Successful high-significance records are pushed to a webhook so downstream
//! automation (social posting, alerting) can pick them up. Delivery is
//! fire-and-forget: a failed post is logged and never affects job outcome.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Sink for publish-worthy content.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, text: &str);
}

/// Webhook notifier posting `{"value1": text}` to a fixed URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        WebhookNotifier {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(&self, text: &str) {
        let body = json!({ "value1": text });
        match self.client.post(&self.url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Published {} chars to webhook", text.len());
            }
            Ok(resp) => warn!("Webhook rejected publish: HTTP {}", resp.status()),
            Err(e) => warn!("Webhook publish failed: {e}"),
        }
    }
}

/// No-op notifier for tests and runs without a configured webhook.
#[derive(Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn publish(&self, _text: &str) {}
}
