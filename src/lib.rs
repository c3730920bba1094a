pub mod analyzer;
pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod geo;
pub mod notify;
pub mod registry;

pub use config::SentrycamConfig;
pub use error::{Result, SentrycamError};
pub use analyzer::{
    BoundingBox, DarknessCheck, FaceDetector, FaceObservation, FrameDeltaMotion, MockFaceDetector,
    MotionCheck, TamperCheck,
};
pub use camera::{FrameSource, MockFrame, MockFrameSource};
pub use detection::{DetectionLoop, TickReport};
pub use frame::FrameData;
pub use geo::{GeoLocator, HttpGeoLocator, NoGeoLocator};
pub use notify::{
    EventKey, HttpNotificationSender, NotificationAttempt, NotificationGate, NotificationSender,
    Notifier, RetryQueue, SendOutcome,
};
pub use registry::{FaceRecord, FaceRegistry, MatchOutcome, RegistryClient};
