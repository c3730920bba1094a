use super::dispatch::NotificationSender;
use super::gate::NotificationGate;
use super::types::{EventKey, NotificationAttempt};

use std::mem;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// A failed send waiting for its scheduled retry time.
#[derive(Debug, Clone)]
pub struct PendingRetry {
    pub due: Instant,
    pub attempt: NotificationAttempt,
    pub key: EventKey,
}

/// Queue of failed sends, drained cooperatively once per detection tick.
///
/// Retries are unbounded with a flat interval: a send that keeps failing
/// is rescheduled indefinitely, always exactly one entry per attempt,
/// never duplicated and never dropped.
pub struct RetryQueue {
    interval: Duration,
    pending: Vec<PendingRetry>,
}

impl RetryQueue {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedule a retry one interval from now.
    pub fn enqueue(&mut self, attempt: NotificationAttempt, key: EventKey) {
        self.enqueue_at(attempt, key, Instant::now());
    }

    /// Deterministic variant of [`enqueue`](Self::enqueue) taking an
    /// explicit clock reading.
    pub fn enqueue_at(&mut self, attempt: NotificationAttempt, key: EventKey, now: Instant) {
        let due = now + self.interval;
        info!(
            "Retry scheduled for '{}' ({}) in {:?}",
            attempt.title, key, self.interval
        );
        self.pending.push(PendingRetry { due, attempt, key });
    }

    /// Sweep the queue once: re-send every due entry in insertion order.
    ///
    /// A success removes the entry and stamps the gate for its key so the
    /// normal path does not immediately re-fire the category. A failure
    /// removes the entry and appends a fresh one due a full interval from
    /// now; appended entries are not reconsidered within this pass.
    pub async fn drain(&mut self, sender: &dyn NotificationSender, gate: &NotificationGate) {
        self.drain_at(sender, gate, Instant::now()).await;
    }

    pub async fn drain_at(
        &mut self,
        sender: &dyn NotificationSender,
        gate: &NotificationGate,
        now: Instant,
    ) {
        if self.pending.is_empty() {
            return;
        }

        let snapshot = mem::take(&mut self.pending);
        let mut rescheduled = Vec::new();

        for entry in snapshot {
            if now < entry.due {
                self.pending.push(entry);
                continue;
            }

            info!("Retrying notification '{}' ({})", entry.attempt.title, entry.key);
            match sender.send(&entry.attempt).await {
                Ok(outcome) => {
                    info!(
                        "Retry for '{}' succeeded (status: {})",
                        entry.key, outcome.status
                    );
                    gate.stamp_at(&entry.key, now);
                }
                Err(e) => {
                    warn!("Retry for '{}' failed: {}", entry.key, e);
                    rescheduled.push(PendingRetry {
                        due: now + self.interval,
                        attempt: entry.attempt,
                        key: entry.key,
                    });
                }
            }
        }

        self.pending.extend(rescheduled);
    }
}
