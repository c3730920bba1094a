use super::types::EventKey;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Per-event-key debounce for outbound alerts.
///
/// This spaces alerts in time; it does not count them. Granting
/// permission stamps the key immediately, before the send outcome is
/// known, so a failed send still consumes the window and its retry is
/// carried by the retry queue instead of the gate.
pub struct NotificationGate {
    interval: Duration,
    last_sent: Mutex<HashMap<EventKey, Instant>>,
}

impl NotificationGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether an alert for `key` may fire now, stamping the key on
    /// a grant. Keys are independent: granting one never consumes another.
    pub fn allow(&self, key: &EventKey) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// Deterministic variant of [`allow`](Self::allow) taking an explicit
    /// clock reading.
    pub fn allow_at(&self, key: &EventKey, now: Instant) -> bool {
        let mut last_sent = self.last_sent.lock();
        let allowed = match last_sent.get(key) {
            Some(last) => now.saturating_duration_since(*last) > self.interval,
            None => true,
        };
        if allowed {
            last_sent.insert(key.clone(), now);
        } else {
            debug!("Alert for '{}' suppressed by debounce", key);
        }
        allowed
    }

    /// Record a send for `key` without a permission check. Used when a
    /// queued retry finally succeeds, so the normal gate path does not
    /// immediately re-fire the same category.
    pub fn stamp(&self, key: &EventKey) {
        self.stamp_at(key, Instant::now());
    }

    pub fn stamp_at(&self, key: &EventKey, now: Instant) {
        self.last_sent.lock().insert(key.clone(), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(15 * 60);

    #[test]
    fn test_debounce_within_interval() {
        let gate = NotificationGate::new(INTERVAL);
        let key = EventKey::Unknown;
        let t0 = Instant::now();

        assert!(gate.allow_at(&key, t0));
        assert!(!gate.allow_at(&key, t0 + Duration::from_secs(60)));
        assert!(!gate.allow_at(&key, t0 + INTERVAL));

        // Strictly past the interval: permitted again
        assert!(gate.allow_at(&key, t0 + INTERVAL + Duration::from_secs(1)));
    }

    #[test]
    fn test_denied_call_has_no_side_effect() {
        let gate = NotificationGate::new(INTERVAL);
        let key = EventKey::Tamper;
        let t0 = Instant::now();

        assert!(gate.allow_at(&key, t0));
        // A denied call must not refresh the stamp, so the window still
        // measures from t0
        assert!(!gate.allow_at(&key, t0 + INTERVAL - Duration::from_secs(1)));
        assert!(gate.allow_at(&key, t0 + INTERVAL + Duration::from_secs(1)));
    }

    #[test]
    fn test_keys_are_independent() {
        let gate = NotificationGate::new(INTERVAL);
        let t0 = Instant::now();

        assert!(gate.allow_at(&EventKey::Known("alice".to_string()), t0));
        assert!(gate.allow_at(&EventKey::Known("bob".to_string()), t0));
        assert!(gate.allow_at(&EventKey::Unknown, t0));

        // alice's grant did not consume bob's or unknown's quota, and
        // each key is still individually debounced
        assert!(!gate.allow_at(&EventKey::Known("alice".to_string()), t0 + Duration::from_secs(1)));
        assert!(!gate.allow_at(&EventKey::Known("bob".to_string()), t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_stamp_closes_window() {
        let gate = NotificationGate::new(INTERVAL);
        let key = EventKey::CameraOff;
        let t0 = Instant::now();

        gate.stamp_at(&key, t0);
        assert!(!gate.allow_at(&key, t0 + Duration::from_secs(60)));
        assert!(gate.allow_at(&key, t0 + INTERVAL + Duration::from_secs(1)));
    }
}
