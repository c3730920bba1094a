use crate::frame::FrameData;

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Face bounding box in frame coordinates (top, right, bottom, left).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// One detected face: where it is and its embedding vector.
#[derive(Debug, Clone)]
pub struct FaceObservation {
    pub bounds: BoundingBox,
    pub encoding: Vec<f64>,
}

/// Tamper heuristic boundary. Implementations decide whether a frame is
/// degenerate enough (covered lens, blacked-out feed) to skip detection
/// and raise a tamper alert instead.
pub trait TamperCheck: Send {
    fn is_tampered(&mut self, frame: &FrameData) -> bool;
}

/// Reference tamper heuristic: the frame counts as tampered when its mean
/// luma falls below a darkness threshold.
pub struct DarknessCheck {
    threshold: f64,
}

impl DarknessCheck {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl TamperCheck for DarknessCheck {
    fn is_tampered(&mut self, frame: &FrameData) -> bool {
        let brightness = frame.mean_brightness();
        trace!("Frame {} mean brightness: {:.1}", frame.id, brightness);
        brightness < self.threshold
    }
}

/// Motion heuristic boundary. `observe` is called once per frame and
/// reports whether motion was detected relative to earlier frames.
pub trait MotionCheck: Send {
    fn observe(&mut self, frame: &FrameData) -> bool;
}

/// Reference motion heuristic: per-pixel luma delta against the previous
/// frame, triggering when the changed area exceeds a fraction of the frame.
pub struct FrameDeltaMotion {
    delta_threshold: u8,
    area_fraction: f64,
    previous: Option<Arc<Vec<u8>>>,
}

impl FrameDeltaMotion {
    pub fn new(delta_threshold: u8, area_fraction: f64) -> Self {
        Self {
            delta_threshold,
            area_fraction,
            previous: None,
        }
    }
}

impl MotionCheck for FrameDeltaMotion {
    fn observe(&mut self, frame: &FrameData) -> bool {
        let previous = self.previous.replace(Arc::clone(&frame.data));

        let previous = match previous {
            Some(previous) if previous.len() == frame.data.len() => previous,
            // First frame, or resolution changed mid-stream
            _ => return false,
        };

        let changed = frame
            .data
            .iter()
            .zip(previous.iter())
            .filter(|(a, b)| a.abs_diff(**b) > self.delta_threshold)
            .count();

        let fraction = changed as f64 / frame.data.len() as f64;
        let motion = fraction > self.area_fraction;
        if motion {
            debug!(
                "Motion detected in frame {}: {:.1}% of pixels changed",
                frame.id,
                fraction * 100.0
            );
        }
        motion
    }
}

/// Face detection/encoding boundary. The concrete algorithm (HOG, CNN,
/// whatever the deployment links in) lives behind this trait; the loop
/// only consumes its observations.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &FrameData) -> Vec<FaceObservation>;
}

/// Scripted detector for tests: yields the next scripted observation set
/// per frame, then empty sets once exhausted.
pub struct MockFaceDetector {
    script: VecDeque<Vec<FaceObservation>>,
}

impl MockFaceDetector {
    pub fn new(script: Vec<Vec<FaceObservation>>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Detector that never sees a face.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl FaceDetector for MockFaceDetector {
    fn detect(&mut self, _frame: &FrameData) -> Vec<FaceObservation> {
        self.script.pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn frame(id: u64, data: Vec<u8>) -> FrameData {
        let len = data.len() as u32;
        FrameData::new(id, SystemTime::now(), data, len, 1)
    }

    #[test]
    fn test_darkness_check() {
        let mut check = DarknessCheck::new(10.0);
        assert!(check.is_tampered(&frame(0, vec![2, 3, 2, 1])));
        assert!(!check.is_tampered(&frame(1, vec![120, 130, 125, 128])));
    }

    #[test]
    fn test_motion_requires_previous_frame() {
        let mut motion = FrameDeltaMotion::new(25, 0.05);
        // No baseline yet
        assert!(!motion.observe(&frame(0, vec![0; 16])));
        // Every pixel jumps past the delta threshold
        assert!(motion.observe(&frame(1, vec![200; 16])));
        // Identical consecutive frames are still
        assert!(!motion.observe(&frame(2, vec![200; 16])));
    }

    #[test]
    fn test_motion_small_changes_ignored() {
        let mut motion = FrameDeltaMotion::new(25, 0.5);
        motion.observe(&frame(0, vec![100; 16]));

        // Only 4 of 16 pixels change: below the 50% area fraction
        let mut data = vec![100; 16];
        for p in data.iter_mut().take(4) {
            *p = 255;
        }
        assert!(!motion.observe(&frame(1, data)));
    }

    #[test]
    fn test_motion_resets_on_resolution_change() {
        let mut motion = FrameDeltaMotion::new(25, 0.05);
        motion.observe(&frame(0, vec![100; 16]));
        // Different buffer size: treated as a fresh baseline, no motion
        assert!(!motion.observe(&frame(1, vec![200; 32])));
    }

    #[test]
    fn test_mock_face_detector_script() {
        let observation = FaceObservation {
            bounds: BoundingBox {
                top: 0,
                right: 10,
                bottom: 10,
                left: 0,
            },
            encoding: vec![0.5; 4],
        };
        let mut detector = MockFaceDetector::new(vec![vec![observation]]);

        let f = frame(0, vec![0; 16]);
        assert_eq!(detector.detect(&f).len(), 1);
        assert!(detector.detect(&f).is_empty());
    }
}
