//! Face-landmarker collaborator surface.
//!
//! The detection model itself is opaque to the pipeline: it is configured
//! once, accepts frames asynchronously, and reports completions through a
//! callback on its own thread. This crate defines that narrow interface plus
//! the production implementation ([`TaskLandmarker`]) that drives a MediaPipe
//! task worker as a child process.

mod task;

pub use task::TaskLandmarker;

use std::path::PathBuf;

use camera_ingest::Frame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Detector configuration, fixed for the lifetime of a landmarker.
#[derive(Clone, Debug)]
pub struct LandmarkerOptions {
    pub model_asset: PathBuf,
    pub max_faces: u32,
    pub output_blendshapes: bool,
    pub output_transform_matrix: bool,
}

impl Default for LandmarkerOptions {
    fn default() -> Self {
        Self {
            model_asset: PathBuf::from("models/face_landmarker.task"),
            max_faces: 1,
            output_blendshapes: true,
            output_transform_matrix: true,
        }
    }
}

/// One blendshape category with its activation score.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Blendshape {
    pub name: String,
    pub score: f32,
}

/// Raw completion payload for one submitted frame.
///
/// The three sets are index-aligned: index 0 is the primary face when
/// present. Any of them may be empty ("no face this frame", or an output the
/// detector was configured not to produce).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LandmarkOutput {
    #[serde(default)]
    pub landmarks: Vec<Vec<[f32; 3]>>,
    #[serde(default)]
    pub blendshapes: Vec<Vec<Blendshape>>,
    #[serde(default, rename = "matrices")]
    pub transforms: Vec<[[f32; 4]; 4]>,
}

/// Completion callback: invoked exactly once per accepted submission, on a
/// thread distinct from the submitter's, with the output and the original
/// submission timestamp.
pub type ResultCallback = Box<dyn FnMut(LandmarkOutput, i64) + Send>;

#[derive(Debug, Error)]
pub enum LandmarkError {
    #[error("model asset {path:?} is not readable")]
    ModelAsset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to launch landmark worker")]
    WorkerSpawn(#[source] std::io::Error),
    #[error("landmark worker is not accepting frames")]
    WorkerBusy,
    #[error("landmark worker exited")]
    WorkerGone,
}

/// Asynchronous face landmarker.
///
/// `detect_async` must not block on detection: it hands the frame off and
/// returns, and the completion arrives later through the [`ResultCallback`]
/// the implementation was constructed with.
pub trait Landmarker: Send {
    fn detect_async(&mut self, frame: Frame, timestamp_ms: i64) -> Result<(), LandmarkError>;
}
