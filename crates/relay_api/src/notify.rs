//! Best-effort notification side channel (Google Chat incoming webhook).
//!
//! Failures here are logged and swallowed; a notification must never fail the
//! operation that triggered it.

use std::time::Duration;

use chrono::{DateTime, Utc};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GChatNotifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl GChatNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }

    pub async fn send(&self, message: &str) {
        let Some(url) = &self.webhook_url else {
            tracing::warn!("chat webhook URL not configured, dropping notification");
            return;
        };

        let text = chat_text(Utc::now(), message);
        let result = self
            .http
            .post(url)
            .timeout(NOTIFY_TIMEOUT)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!(message, "chat notification sent");
            }
            Ok(response) => {
                tracing::error!(status = %response.status(), "chat notification rejected");
            }
            Err(err) => {
                tracing::error!(error = %err, "chat notification failed");
            }
        }
    }
}

/// The chat line carries Kuala Lumpur wall-clock time (GMT+8).
fn chat_text(now: DateTime<Utc>, message: &str) -> String {
    let gmt8 = now + chrono::Duration::hours(8);
    format!("{} {}", gmt8.format("%m/%d/%Y, %H:%M:%S"), message)
}
