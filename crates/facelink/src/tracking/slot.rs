use std::sync::{Arc, Mutex};

use crate::tracking::data::TrackedPose;

/// Single-slot, latest-wins hand-off between the detection callback thread
/// and the broadcast loop.
///
/// Results are a live-state stream, not a queue: `publish` overwrites any
/// unconsumed value without blocking the publisher, `take` consumes the
/// freshest value without blocking the reader, and nothing is delivered
/// twice.
#[derive(Clone, Default)]
pub(crate) struct ResultSlot {
    inner: Arc<Mutex<Option<TrackedPose>>>,
}

impl ResultSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn publish(&self, pose: TrackedPose) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(pose);
        }
    }

    pub(crate) fn take(&self) -> Option<TrackedPose> {
        match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        }
    }
}
