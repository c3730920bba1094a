use super::types::{NotificationAttempt, SendOutcome};
use crate::config::ApiConfig;
use crate::error::NotifyError;

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace};

/// Outbound notification boundary. One call, one attempt: retry
/// scheduling belongs to the caller, not the sender.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, attempt: &NotificationAttempt) -> Result<SendOutcome, NotifyError>;
}

/// Sender backed by the remote notification service.
pub struct HttpNotificationSender {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotificationSender {
    pub fn new(api: &ApiConfig, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: api.base_url.clone(),
        }
    }
}

#[async_trait]
impl NotificationSender for HttpNotificationSender {
    async fn send(&self, attempt: &NotificationAttempt) -> Result<SendOutcome, NotifyError> {
        let url = format!("{}/api/external-notifications/send", self.base_url);
        debug!("Sending notification '{}' to {}", attempt.title, url);

        let payload = serde_json::json!({
            "user_id": attempt.recipient,
            "title": attempt.title,
            "content": attempt.body,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&attempt.auth_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let raw: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| NotifyError::MalformedResponse {
                    details: e.to_string(),
                })?;

        // "success" is the only status value the service treats as sent
        let service_status = raw
            .get("status")
            .and_then(|s| s.as_str())
            .ok_or_else(|| NotifyError::MalformedResponse {
                details: "response has no status field".to_string(),
            })?;

        if service_status != "success" {
            return Err(NotifyError::Rejected {
                status: service_status.to_string(),
            });
        }

        trace!("Notification service response: {}", raw);
        Ok(SendOutcome {
            status: service_status.to_string(),
            raw,
        })
    }
}
