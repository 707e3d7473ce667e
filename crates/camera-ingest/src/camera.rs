use chrono::Utc;
use opencv::{
    core::MatTraitConstManual,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{CaptureError, Frame, FrameFormat, FrameSource};

/// Live camera handle opened by device index.
///
/// Frames are returned as captured, at the device's native resolution and
/// cadence; nothing is buffered beyond the frame just produced.
pub struct CameraSource {
    cap: VideoCapture,
    backend: String,
    index: i32,
    last_timestamp_ms: i64,
    frame: Mat,
}

impl CameraSource {
    /// Open a camera by index, trying the V4L backend before the default one.
    pub fn open(index: i32) -> Result<Self, CaptureError> {
        for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
            match VideoCapture::new(index, backend) {
                Ok(mut cap) => {
                    let opened = cap.is_opened().map_err(|e| CaptureError::Other(e.into()))?;
                    if opened {
                        configure_camera(&mut cap);
                        let backend = cap
                            .get_backend_name()
                            .unwrap_or_else(|_| "unknown".to_string());
                        debug!("opened camera #{index} via {backend}");
                        return Ok(Self {
                            cap,
                            backend,
                            index,
                            last_timestamp_ms: 0,
                            frame: Mat::default(),
                        });
                    }
                }
                Err(err) => {
                    warn!("failed to open camera #{index} with backend {backend}: {err}");
                }
            }
        }

        Err(CaptureError::Open { index })
    }

    /// Name of the capture backend, for diagnostics only.
    pub fn backend_name(&self) -> &str {
        &self.backend
    }

    fn stamp(&mut self) -> i64 {
        let position_ms = self.cap.get(videoio::CAP_PROP_POS_MSEC).unwrap_or(0.0);
        let stamped = monotonic_ms(
            position_ms,
            Utc::now().timestamp_millis(),
            self.last_timestamp_ms,
        );
        self.last_timestamp_ms = stamped;
        stamped
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.cap.read(&mut self.frame) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("camera #{} read unsuccessful, stream ended", self.index);
                    return None;
                }
                Err(err) => {
                    warn!("camera #{} read failed: {err}", self.index);
                    return None;
                }
            }

            let size = match self.frame.size() {
                Ok(size) => size,
                Err(err) => {
                    warn!("camera #{} frame query failed: {err}", self.index);
                    return None;
                }
            };

            // Warm-up frames from some devices arrive empty; skip, don't fail.
            if size.width <= 0 || size.height <= 0 {
                continue;
            }

            let data = match self.frame.data_bytes() {
                Ok(bytes) => bytes.to_vec(),
                Err(err) => {
                    warn!("camera #{} frame data unavailable: {err}", self.index);
                    return None;
                }
            };

            let timestamp_ms = self.stamp();
            return Some(Frame {
                data,
                width: size.width,
                height: size.height,
                timestamp_ms,
                format: FrameFormat::Bgr8,
            });
        }
    }
}

/// Best-effort capture settings: MJPG keeps USB cameras at device rate.
fn configure_camera(cap: &mut VideoCapture) {
    if let Ok(fourcc) = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G') {
        let _ = cap.set(videoio::CAP_PROP_FOURCC, fourcc as f64);
    }
    let _ = cap.set(videoio::CAP_PROP_FPS, 30.0);
}

/// Prefer the device-reported stream position; fall back to the wall clock
/// for devices that report zero. The result never decreases.
fn monotonic_ms(device_position_ms: f64, wall_clock_ms: i64, last_ms: i64) -> i64 {
    let now = if device_position_ms > 0.0 {
        device_position_ms as i64
    } else {
        wall_clock_ms
    };
    now.max(last_ms)
}

/// One probed capture device, as reported for `--list-cameras`.
#[derive(Debug, Serialize)]
pub struct CameraDescriptor {
    pub index: i32,
    pub backend: String,
    pub width: i32,
    pub height: i32,
}

/// Probe device indices `0..limit` and describe every camera that opens.
pub fn list_cameras(limit: i32) -> Vec<CameraDescriptor> {
    let mut found = Vec::new();
    for index in 0..limit {
        if let Ok(source) = CameraSource::open(index) {
            let width = source.cap.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as i32;
            let height = source
                .cap
                .get(videoio::CAP_PROP_FRAME_HEIGHT)
                .unwrap_or(0.0) as i32;
            found.push(CameraDescriptor {
                index,
                backend: source.backend.clone(),
                width,
                height,
            });
        }
    }
    found
}
