use crate::analyzer::{
    DarknessCheck, FaceDetector, FrameDeltaMotion, MotionCheck, TamperCheck,
};
use crate::camera::FrameSource;
use crate::config::SentrycamConfig;
use crate::notify::{EventKey, Notifier};
use crate::registry::{FaceRegistry, MatchOutcome};

use std::time::Duration;
use tracing::{debug, info, warn};

/// What one tick of the loop saw and did. Returned for observability and
/// test assertions; the loop itself only logs it.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Whether a frame was acquired this tick.
    pub frame_acquired: bool,
    /// Whether the tamper heuristic fired.
    pub tampered: bool,
    /// Number of faces the detector reported.
    pub faces: usize,
    /// Event keys for which a send was actually attempted.
    pub events: Vec<EventKey>,
}

/// The per-frame orchestration loop.
///
/// Each tick pulls one frame, runs the tamper/motion heuristics and face
/// matching, raises gated alerts for what it saw, and finishes with one
/// cooperative sweep of the retry queue. Everything algorithmic (capture,
/// detection, heuristics, geolocation) sits behind replaceable traits.
pub struct DetectionLoop {
    camera: Box<dyn FrameSource>,
    detector: Box<dyn FaceDetector>,
    tamper: Box<dyn TamperCheck>,
    motion: Box<dyn MotionCheck>,
    registry: FaceRegistry,
    notifier: Notifier,
    confidence_threshold: f64,
    open_retry: Duration,
    read_retry: Duration,
}

impl DetectionLoop {
    pub fn new(
        config: &SentrycamConfig,
        camera: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        registry: FaceRegistry,
        notifier: Notifier,
    ) -> Self {
        let detection = &config.detection;
        Self {
            camera,
            detector,
            tamper: Box::new(DarknessCheck::new(detection.darkness_threshold)),
            motion: Box::new(FrameDeltaMotion::new(
                detection.motion_delta_threshold,
                detection.motion_area_fraction,
            )),
            registry,
            notifier,
            confidence_threshold: detection.confidence_threshold,
            open_retry: Duration::from_secs(config.camera.open_retry_seconds),
            read_retry: Duration::from_secs(config.camera.read_retry_seconds),
        }
    }

    /// Replace the tamper heuristic.
    pub fn with_tamper_check(mut self, tamper: Box<dyn TamperCheck>) -> Self {
        self.tamper = tamper;
        self
    }

    /// Replace the motion heuristic.
    pub fn with_motion_check(mut self, motion: Box<dyn MotionCheck>) -> Self {
        self.motion = motion;
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Open the camera, retrying until the device comes up.
    pub async fn connect(&mut self) {
        loop {
            match self.camera.open().await {
                Ok(()) => {
                    info!("Camera ready ({})", self.camera.describe());
                    return;
                }
                Err(e) => {
                    warn!(
                        "Could not open camera: {}. Retrying in {:?}",
                        e, self.open_retry
                    );
                    tokio::time::sleep(self.open_retry).await;
                }
            }
        }
    }

    /// Run ticks until the surrounding task is cancelled.
    pub async fn run(&mut self) {
        self.connect().await;
        info!("Detection loop started ({})", self.camera.describe());
        loop {
            self.tick().await;
        }
    }

    /// One pass of the per-frame contract.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        // 1. Acquire a frame; on failure raise camera_off through the
        //    normal gate path, pause, try to reopen the device, and leave
        //    reacquisition to the next tick. The retry drain at the
        //    bottom still runs.
        let frame = match self.camera.acquire().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame acquisition failed: {}", e);
                self.raise(
                    EventKey::CameraOff,
                    "Camera Unavailable",
                    "The camera failed to deliver a frame and may be disconnected.".to_string(),
                    &mut report,
                )
                .await;
                tokio::time::sleep(self.read_retry).await;
                if let Err(e) = self.camera.open().await {
                    warn!("Camera reopen failed: {}", e);
                }
                self.notifier.drain_retries().await;
                return report;
            }
        };
        report.frame_acquired = true;

        // 2. Degenerate frame: raise tamper and skip detection this tick.
        if self.tamper.is_tampered(&frame) {
            warn!("Tamper suspected: frame {} is near-uniformly dark", frame.id);
            report.tampered = true;
            self.raise(
                EventKey::Tamper,
                "Temper Alert",
                "Camera screen is black (possible tampering).".to_string(),
                &mut report,
            )
            .await;
            self.notifier.drain_retries().await;
            return report;
        }

        // 3. Detect and encode faces.
        let observations = self.detector.detect(&frame);
        report.faces = observations.len();

        // 4. Motion with nobody in view gets its own category. The
        //    heuristic observes every frame to keep its baseline current.
        let motion = self.motion.observe(&frame);
        if motion && observations.is_empty() {
            self.raise(
                EventKey::MovementNoFace,
                "Movement Detected",
                "Movement was detected with no face in view.".to_string(),
                &mut report,
            )
            .await;
        }

        // 5. Classify each face and raise the matching category.
        for observation in &observations {
            match self
                .registry
                .classify(&observation.encoding, self.confidence_threshold)
            {
                MatchOutcome::Known {
                    name,
                    authorized,
                    distance,
                } => {
                    info!("Detected: {}, distance: {:.2}", name, distance);
                    if authorized {
                        self.raise(
                            EventKey::Known(name.clone()),
                            &format!("Known Face Detected: {}", name),
                            format!("Detected {} on camera.", name),
                            &mut report,
                        )
                        .await;
                    } else {
                        self.raise(
                            EventKey::Unauthorized(name.clone()),
                            &format!("Unauthorized Face Detected: {}", name),
                            format!("Unauthorized person {} was detected on camera.", name),
                            &mut report,
                        )
                        .await;
                    }
                }
                MatchOutcome::Unknown => {
                    if self.registry.is_empty() {
                        debug!("No known faces loaded; classifying as unknown");
                    } else {
                        info!("Detected: unknown face");
                    }
                    self.raise(
                        EventKey::Unknown,
                        "Unknown Face Detected",
                        "An unknown person was detected on camera.".to_string(),
                        &mut report,
                    )
                    .await;
                }
            }
        }

        // 6. Exactly one drain pass per tick, no matter what.
        self.notifier.drain_retries().await;

        report
    }

    /// Timestamp the body and hand the alert to the notifier, which owns
    /// the gate check, geolocation enrichment, and retry scheduling.
    async fn raise(&mut self, key: EventKey, title: &str, body: String, report: &mut TickReport) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let body = format!("{} ({})", body, stamp);

        if self.notifier.alert(&key, title, &body).await {
            report.events.push(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{BoundingBox, FaceObservation, MockFaceDetector};
    use crate::camera::{MockFrame, MockFrameSource};
    use crate::config::SentrycamConfig;
    use crate::error::NotifyError;
    use crate::geo::NoGeoLocator;
    use crate::notify::{NotificationAttempt, NotificationSender, SendOutcome};
    use crate::registry::FaceRecord;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Sender that always reports the configured outcome and records
    /// every attempt.
    struct StubSender {
        succeed: bool,
        attempts: Mutex<Vec<NotificationAttempt>>,
    }

    impl StubSender {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                succeed,
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn titles(&self) -> Vec<String> {
            self.attempts.lock().iter().map(|a| a.title.clone()).collect()
        }
    }

    #[async_trait]
    impl NotificationSender for Arc<StubSender> {
        async fn send(&self, attempt: &NotificationAttempt) -> Result<SendOutcome, NotifyError> {
            self.attempts.lock().push(attempt.clone());
            if self.succeed {
                Ok(SendOutcome {
                    status: "success".to_string(),
                    raw: serde_json::json!({"status": "success"}),
                })
            } else {
                Err(NotifyError::Transport {
                    details: "stubbed failure".to_string(),
                })
            }
        }
    }

    fn test_config() -> SentrycamConfig {
        let mut config = SentrycamConfig::default();
        config.api.base_url = "http://localhost:9000".to_string();
        config.api.auth_token = "token".to_string();
        config.api.recipient = "owner@example.com".to_string();
        // No pauses between open/read retries in tests
        config.camera.open_retry_seconds = 0;
        config.camera.read_retry_seconds = 0;
        config
    }

    fn build_loop(
        config: &SentrycamConfig,
        camera: MockFrameSource,
        detector: MockFaceDetector,
        registry: FaceRegistry,
        sender: Arc<StubSender>,
    ) -> DetectionLoop {
        let notifier = Notifier::new(
            &config.notify,
            &config.api,
            Box::new(sender),
            Box::new(NoGeoLocator),
        );
        DetectionLoop::new(config, Box::new(camera), Box::new(detector), registry, notifier)
    }

    fn observation(encoding: Vec<f64>) -> FaceObservation {
        FaceObservation {
            bounds: BoundingBox {
                top: 0,
                right: 32,
                bottom: 32,
                left: 0,
            },
            encoding,
        }
    }

    fn record(name: &str, encoding: Vec<f64>, authorized: bool) -> FaceRecord {
        FaceRecord {
            name: name.to_string(),
            encoding,
            authorized,
        }
    }

    #[tokio::test]
    async fn test_empty_registry_yields_unknown() {
        let config = test_config();
        let sender = StubSender::new(true);
        let camera = MockFrameSource::new(vec![MockFrame::Uniform(128)]);
        let detector = MockFaceDetector::new(vec![vec![observation(vec![0.5, 0.5])]]);
        let mut detection = build_loop(
            &config,
            camera,
            detector,
            FaceRegistry::empty(),
            Arc::clone(&sender),
        );

        let report = detection.tick().await;

        assert!(report.frame_acquired);
        assert_eq!(report.faces, 1);
        assert_eq!(report.events, vec![EventKey::Unknown]);
        assert_eq!(sender.titles(), vec!["Unknown Face Detected"]);
    }

    #[tokio::test]
    async fn test_authorized_and_unauthorized_classification() {
        let config = test_config();
        let sender = StubSender::new(true);
        let camera = MockFrameSource::new(vec![MockFrame::Uniform(128)]);
        let registry = FaceRegistry::new(vec![
            record("alice", vec![0.0, 0.0], true),
            record("mallory", vec![1.0, 1.0], false),
        ]);
        let detector = MockFaceDetector::new(vec![vec![
            observation(vec![0.05, 0.0]),
            observation(vec![0.95, 1.0]),
        ]]);
        let mut detection = build_loop(&config, camera, detector, registry, Arc::clone(&sender));

        let report = detection.tick().await;

        assert_eq!(
            report.events,
            vec![
                EventKey::Known("alice".to_string()),
                EventKey::Unauthorized("mallory".to_string()),
            ]
        );
        assert_eq!(
            sender.titles(),
            vec![
                "Known Face Detected: alice",
                "Unauthorized Face Detected: mallory",
            ]
        );
    }

    #[tokio::test]
    async fn test_camera_failure_is_debounced_within_window() {
        let config = test_config();
        let sender = StubSender::new(true);
        let camera = MockFrameSource::new(vec![
            MockFrame::ReadFailure,
            MockFrame::ReadFailure,
            MockFrame::ReadFailure,
        ]);
        let mut detection = build_loop(
            &config,
            camera,
            MockFaceDetector::empty(),
            FaceRegistry::empty(),
            Arc::clone(&sender),
        );

        // Three consecutive acquisition failures inside the debounce
        // window: exactly one camera_off attempt
        let first = detection.tick().await;
        assert!(!first.frame_acquired);
        assert_eq!(first.events, vec![EventKey::CameraOff]);

        let second = detection.tick().await;
        assert!(second.events.is_empty());
        let third = detection.tick().await;
        assert!(third.events.is_empty());

        assert_eq!(sender.titles(), vec!["Camera Unavailable"]);
    }

    #[tokio::test]
    async fn test_connect_retries_until_device_opens() {
        let config = test_config();
        let sender = StubSender::new(true);
        let camera = MockFrameSource::new(vec![MockFrame::Uniform(128)]).with_open_failures(2);
        let opens = camera.open_call_counter();
        let mut detection = build_loop(
            &config,
            camera,
            MockFaceDetector::empty(),
            FaceRegistry::empty(),
            Arc::clone(&sender),
        );

        detection.connect().await;

        // Two scripted failures, then the device came up
        assert_eq!(opens.load(std::sync::atomic::Ordering::Relaxed), 3);
        let report = detection.tick().await;
        assert!(report.frame_acquired);
    }

    #[tokio::test]
    async fn test_reopen_attempted_after_read_failure() {
        let config = test_config();
        let sender = StubSender::new(true);
        let camera = MockFrameSource::new(vec![MockFrame::ReadFailure, MockFrame::Uniform(128)]);
        let opens = camera.open_call_counter();
        let mut detection = build_loop(
            &config,
            camera,
            MockFaceDetector::empty(),
            FaceRegistry::empty(),
            Arc::clone(&sender),
        );

        let failed = detection.tick().await;
        assert!(!failed.frame_acquired);
        // The failed read triggered one reopen attempt
        assert_eq!(opens.load(std::sync::atomic::Ordering::Relaxed), 1);

        let recovered = detection.tick().await;
        assert!(recovered.frame_acquired);
    }

    #[tokio::test]
    async fn test_dark_frame_raises_tamper_and_skips_detection() {
        let config = test_config();
        let sender = StubSender::new(true);
        let camera = MockFrameSource::new(vec![MockFrame::Uniform(0), MockFrame::Uniform(128)]);
        // The scripted face is only consumed once detection actually runs
        let detector = MockFaceDetector::new(vec![vec![observation(vec![0.5, 0.5])]]);
        let mut detection = build_loop(
            &config,
            camera,
            detector,
            FaceRegistry::empty(),
            Arc::clone(&sender),
        );

        let dark = detection.tick().await;
        assert!(dark.tampered);
        assert_eq!(dark.faces, 0);
        assert_eq!(dark.events, vec![EventKey::Tamper]);

        let bright = detection.tick().await;
        assert!(!bright.tampered);
        assert_eq!(bright.faces, 1);
        assert_eq!(bright.events, vec![EventKey::Unknown]);
    }

    #[tokio::test]
    async fn test_motion_without_face() {
        let config = test_config();
        let sender = StubSender::new(true);
        // Frame two jumps every pixel past the delta threshold
        let camera = MockFrameSource::new(vec![MockFrame::Uniform(100), MockFrame::Uniform(250)]);
        let mut detection = build_loop(
            &config,
            camera,
            MockFaceDetector::empty(),
            FaceRegistry::empty(),
            Arc::clone(&sender),
        );

        // First frame only establishes the motion baseline
        let first = detection.tick().await;
        assert!(first.events.is_empty());

        let second = detection.tick().await;
        assert_eq!(second.events, vec![EventKey::MovementNoFace]);
    }

    #[tokio::test]
    async fn test_motion_with_face_defers_to_classification() {
        let config = test_config();
        let sender = StubSender::new(true);
        let camera = MockFrameSource::new(vec![MockFrame::Uniform(100), MockFrame::Uniform(250)]);
        let detector = MockFaceDetector::new(vec![
            Vec::new(),
            vec![observation(vec![0.5, 0.5])],
        ]);
        let mut detection = build_loop(
            &config,
            camera,
            detector,
            FaceRegistry::empty(),
            Arc::clone(&sender),
        );

        detection.tick().await;
        let report = detection.tick().await;

        // A face in view suppresses movement_no_face; the face itself
        // still classifies
        assert_eq!(report.events, vec![EventKey::Unknown]);
    }

    #[tokio::test]
    async fn test_failed_send_lands_in_retry_queue() {
        let config = test_config();
        let sender = StubSender::new(false);
        let camera = MockFrameSource::new(vec![MockFrame::Uniform(128)]);
        let detector = MockFaceDetector::new(vec![vec![observation(vec![0.5, 0.5])]]);
        let mut detection = build_loop(
            &config,
            camera,
            detector,
            FaceRegistry::empty(),
            Arc::clone(&sender),
        );

        let report = detection.tick().await;

        // The attempt was made, failed, and now waits out its retry
        // interval; the end-of-tick drain does not touch it early
        assert_eq!(report.events, vec![EventKey::Unknown]);
        assert_eq!(detection.notifier().pending_retries(), 1);
        assert_eq!(sender.attempts.lock().len(), 1);
    }
}
