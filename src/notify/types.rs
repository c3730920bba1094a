use std::fmt;

/// Category identity for an alert. Used as the sole key for both the
/// debounce gate and retry bookkeeping; two alerts sharing a key are
/// duplicates regardless of their content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// A recognised, authorized face (keyed by name).
    Known(String),
    /// A recognised face whose record is flagged unauthorized.
    Unauthorized(String),
    /// A face that matched nothing in the registry.
    Unknown,
    /// Degenerate frame (covered or blacked-out camera).
    Tamper,
    /// The camera device could not deliver a frame.
    CameraOff,
    /// Motion detected with no face present.
    MovementNoFace,
}

impl EventKey {
    /// Stable string form, shared with the wire/logging representation.
    pub fn as_key(&self) -> String {
        match self {
            EventKey::Known(name) => name.clone(),
            EventKey::Unauthorized(name) => format!("unauthorized_{}", name),
            EventKey::Unknown => "unknown".to_string(),
            EventKey::Tamper => "temper".to_string(),
            EventKey::CameraOff => "camera_off".to_string(),
            EventKey::MovementNoFace => "movement_no_face".to_string(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

/// One outbound notification: everything needed to (re)send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAttempt {
    pub recipient: String,
    pub title: String,
    pub body: String,
    pub auth_token: String,
}

/// Parsed response from a successful send.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// The service's status field; always "success" on this path.
    pub status: String,
    /// Full response body, for diagnostics.
    pub raw: serde_json::Value,
}
