mod dispatch;
mod gate;
mod retry;
mod types;


pub use dispatch::{HttpNotificationSender, NotificationSender};
pub use gate::NotificationGate;
pub use retry::{PendingRetry, RetryQueue};
pub use types::{EventKey, NotificationAttempt, SendOutcome};

use crate::config::{ApiConfig, NotifyConfig};
use crate::geo::{self, GeoLocator};

use tracing::{info, warn};

/// The notification subsystem: debounce gate, retry queue, sender, and
/// best-effort geolocation, owned together so the detection loop only
/// ever asks two things of it: "raise this alert" and "drain the
/// retries".
pub struct Notifier {
    recipient: String,
    auth_token: String,
    gate: NotificationGate,
    queue: RetryQueue,
    sender: Box<dyn NotificationSender>,
    geo: Box<dyn GeoLocator>,
}

impl Notifier {
    pub fn new(
        notify: &NotifyConfig,
        api: &ApiConfig,
        sender: Box<dyn NotificationSender>,
        geo: Box<dyn GeoLocator>,
    ) -> Self {
        Self {
            recipient: api.recipient.clone(),
            auth_token: api.auth_token.clone(),
            gate: NotificationGate::new(notify.debounce_interval()),
            queue: RetryQueue::new(notify.retry_interval()),
            sender,
            geo,
        }
    }

    /// Raise an alert for `key` if its debounce window permits.
    ///
    /// The gate stamps the key as soon as permission is granted, before
    /// the send outcome is known; a failed send goes to the retry queue
    /// rather than reopening the window. The location lookup only
    /// happens once the gate has granted, so a closed window costs
    /// nothing. Returns whether a send was attempted.
    pub async fn alert(&mut self, key: &EventKey, title: &str, body: &str) -> bool {
        if !self.gate.allow(key) {
            return false;
        }
        let location = self.geo.locate().await;
        let body = geo::enrich_body(body, location.as_deref());
        self.notify(key, title, &body).await;
        true
    }

    /// Send an alert unconditionally, scheduling a retry on failure.
    ///
    /// Failed retries are re-enqueued by the drain pass itself, never
    /// here, so an attempt can only ever occupy one queue slot.
    pub async fn notify(&mut self, key: &EventKey, title: &str, body: &str) {
        let attempt = NotificationAttempt {
            recipient: self.recipient.clone(),
            title: title.to_string(),
            body: body.to_string(),
            auth_token: self.auth_token.clone(),
        };

        match self.sender.send(&attempt).await {
            Ok(outcome) => {
                info!("Notification '{}' sent (status: {})", title, outcome.status);
            }
            Err(e) => {
                warn!("Notification '{}' failed: {}", title, e);
                self.queue.enqueue(attempt, key.clone());
            }
        }
    }

    /// One cooperative sweep of the retry queue. Called once per
    /// detection tick, regardless of what the tick saw.
    pub async fn drain_retries(&mut self) {
        self.queue.drain(self.sender.as_ref(), &self.gate).await;
    }

    /// Number of sends currently awaiting retry.
    pub fn pending_retries(&self) -> usize {
        self.queue.len()
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }
}
