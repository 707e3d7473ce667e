use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camera_ingest::Frame;
use landmark_core::{LandmarkError, LandmarkOutput, Landmarker, ResultCallback};
use tracing::{debug, warn};

use crate::tracking::data::TrackedPose;
use crate::tracking::slot::ResultSlot;

/// Bridges the synchronous capture loop and the asynchronous landmarker.
///
/// At most one submission is outstanding at a time; while one is pending,
/// further frames are refused (and dropped by the caller) rather than
/// queued, so detector lag can never build a backlog.
pub(crate) struct DetectionAdapter {
    landmarker: Box<dyn Landmarker>,
    in_flight: Arc<AtomicBool>,
}

impl DetectionAdapter {
    /// Wire a landmarker to `slot`. `make` receives the completion callback
    /// and must construct the landmarker with it; landmarker construction
    /// failures (missing model asset, worker launch) propagate as-is.
    pub(crate) fn new<F>(slot: &ResultSlot, make: F) -> Result<Self, LandmarkError>
    where
        F: FnOnce(ResultCallback) -> Result<Box<dyn Landmarker>, LandmarkError>,
    {
        let in_flight = Arc::new(AtomicBool::new(false));
        let callback = completion_callback(slot.clone(), in_flight.clone());
        let landmarker = make(callback)?;
        Ok(Self {
            landmarker,
            in_flight,
        })
    }

    /// Submit `frame` unless a detection is already outstanding.
    ///
    /// Returns `false` when the frame was dropped, either because the
    /// detector is busy or because the submission itself failed.
    pub(crate) fn submit(&mut self, frame: Frame) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let timestamp_ms = frame.timestamp_ms;
        match self.landmarker.detect_async(frame, timestamp_ms) {
            Ok(()) => true,
            Err(err) => {
                self.in_flight.store(false, Ordering::Release);
                warn!("landmark submission failed: {err}");
                false
            }
        }
    }
}

/// Completion path, invoked on the landmarker's thread: clear the in-flight
/// flag, then forward the primary face (if any) into the slot.
fn completion_callback(slot: ResultSlot, in_flight: Arc<AtomicBool>) -> ResultCallback {
    Box::new(move |output: LandmarkOutput, timestamp_ms: i64| {
        in_flight.store(false, Ordering::Release);
        match TrackedPose::primary(output, timestamp_ms) {
            Some(pose) => slot.publish(pose),
            None => debug!("no face in result at {timestamp_ms}ms"),
        }
    })
}
