use crate::error::{CameraError, Result};
use crate::frame::FrameData;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Frame acquisition boundary.
///
/// The detection loop pulls exactly one frame per tick through this trait.
/// Acquisition may block (device read, pipeline pull) and may fail
/// transiently; the loop recovers with sleep-and-retry rather than
/// propagating the failure upward.
#[async_trait]
pub trait FrameSource: Send {
    /// Open (or reopen) the underlying device. Called before the first
    /// acquisition and again after a failed read; sources without a
    /// separate open step keep the default no-op.
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Acquire the next frame from the device.
    async fn acquire(&mut self) -> Result<FrameData>;

    /// Human-readable identifier for diagnostics.
    fn describe(&self) -> String {
        "frame source".to_string()
    }
}

/// One scripted acquisition step for [`MockFrameSource`].
#[derive(Debug, Clone)]
pub enum MockFrame {
    /// Deliver a frame filled with the given luma value.
    Uniform(u8),
    /// Deliver a frame with the given raw luma buffer.
    Raw(Vec<u8>),
    /// Fail the acquisition with a read error.
    ReadFailure,
}

/// Scripted frame source for tests and hardware-less development.
///
/// Steps are consumed front to back; once the script is exhausted the
/// source keeps delivering mid-gray frames so a loop driving it does not
/// starve.
pub struct MockFrameSource {
    script: VecDeque<MockFrame>,
    width: u32,
    height: u32,
    frame_counter: AtomicU64,
    open_failures: usize,
    open_calls: Arc<AtomicU64>,
}

impl MockFrameSource {
    pub fn new(script: Vec<MockFrame>) -> Self {
        Self {
            script: script.into(),
            width: 64,
            height: 48,
            frame_counter: AtomicU64::new(0),
            open_failures: 0,
            open_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Fail the first `count` open attempts before the device comes up.
    pub fn with_open_failures(mut self, count: usize) -> Self {
        self.open_failures = count;
        self
    }

    /// Shared counter of open attempts, for asserting reconnect behavior
    /// after the source has been handed off.
    pub fn open_call_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.open_calls)
    }

    fn next_frame(&self, data: Vec<u8>) -> FrameData {
        let id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        FrameData::new(id, SystemTime::now(), data, self.width, self.height)
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn open(&mut self) -> Result<()> {
        let attempt = self.open_calls.fetch_add(1, Ordering::Relaxed);
        if (attempt as usize) < self.open_failures {
            warn!("Mock frame source simulating open failure");
            return Err(CameraError::DeviceOpen {
                details: "scripted open failure".to_string(),
            }
            .into());
        }
        debug!("Mock camera opened");
        Ok(())
    }

    async fn acquire(&mut self) -> Result<FrameData> {
        let step = self.script.pop_front().unwrap_or(MockFrame::Uniform(128));
        match step {
            MockFrame::Uniform(luma) => {
                let size = (self.width * self.height) as usize;
                let frame = self.next_frame(vec![luma; size]);
                debug!("Mock frame {} delivered (uniform luma {})", frame.id, luma);
                Ok(frame)
            }
            MockFrame::Raw(data) => {
                let frame = self.next_frame(data);
                debug!("Mock frame {} delivered (raw)", frame.id);
                Ok(frame)
            }
            MockFrame::ReadFailure => {
                warn!("Mock frame source simulating read failure");
                Err(CameraError::FrameRead {
                    details: "scripted failure".to_string(),
                }
                .into())
            }
        }
    }

    fn describe(&self) -> String {
        format!("mock camera ({}x{})", self.width, self.height)
    }
}
