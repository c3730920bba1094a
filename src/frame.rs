use std::sync::Arc;
use std::time::SystemTime;

/// Frame data structure containing raw luma data and metadata.
///
/// The detection loop only needs single-channel brightness values for its
/// tamper and motion heuristics; color handling stays inside the capture
/// backend.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw 8-bit luma data, row-major (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(id: u64, timestamp: SystemTime, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
        }
    }

    /// Expected luma buffer size for this resolution
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Mean pixel brightness across the frame. Empty frames report 0.
    pub fn mean_brightness(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&p| p as u64).sum();
        sum as f64 / self.data.len() as f64
    }
}
