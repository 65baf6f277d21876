//! Operator alerting for failures that need a human, like a close job that
//! exhausted its retry budget.

use {reqwest::Client, serde_json::json, url::Url};

#[derive(Clone)]
pub struct Alerter {
    client: Client,
    webhook: Option<Url>,
}

impl Alerter {
    pub fn new(webhook: Option<Url>) -> Self {
        Self {
            client: Client::new(),
            webhook,
        }
    }

    /// Raises an alert. Always logged at error level; additionally posted to
    /// the configured webhook. Webhook delivery is best effort and never
    /// blocks the caller.
    pub fn alert(&self, subject: &str, detail: &str) {
        tracing::error!(subject, detail, "operator alert");
        let Some(webhook) = self.webhook.clone() else {
            return;
        };
        let request = self.client.post(webhook).json(&json!({
            "subject": subject,
            "detail": detail,
        }));
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => (),
                Ok(response) => {
                    tracing::warn!(status = %response.status(), "alert webhook rejected alert")
                }
                Err(err) => tracing::warn!(?err, "failed to deliver alert"),
            }
        });
    }
}
