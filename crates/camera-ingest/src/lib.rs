//! OpenCV-backed camera capture for the tracking pipeline.

mod camera;

pub use camera::{list_cameras, CameraDescriptor, CameraSource};

use thiserror::Error;

/// Raw BGR frame pulled from a camera.
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    /// Capture timestamp in milliseconds; never decreases within one source.
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy)]
pub enum FrameFormat {
    Bgr8,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open camera #{index}")]
    Open { index: i32 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Pull-based source of frames.
///
/// `None` means end of stream: the device reported a failed read, which this
/// pipeline treats as terminal rather than retryable.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Frame>;
}
