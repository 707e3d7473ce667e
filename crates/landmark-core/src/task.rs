//! MediaPipe task worker driven as a child process.
//!
//! The worker receives length-prefixed raw frames on stdin and answers with
//! one JSON line per frame on stdout. A feeder thread owns the stdin pipe so
//! a stalled worker can never block the submitting thread; a reader thread
//! parses replies and invokes the completion callback.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;

use camera_ingest::Frame;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{LandmarkError, LandmarkOutput, Landmarker, LandmarkerOptions, ResultCallback};

const WORKER_SCRIPT: &str = "scripts/landmark_worker.py";

/// Reply envelope on the worker's stdout, one JSON object per line.
#[derive(Deserialize)]
struct WorkerReply {
    timestamp_ms: i64,
    #[serde(flatten)]
    output: LandmarkOutput,
}

/// Production [`Landmarker`] backed by the MediaPipe worker process.
pub struct TaskLandmarker {
    child: Child,
    feed_tx: Option<Sender<(Frame, i64)>>,
    feeder: Option<thread::JoinHandle<()>>,
    reader: Option<thread::JoinHandle<()>>,
}

impl TaskLandmarker {
    /// Spawn the worker with the given options, wiring `callback` to its
    /// replies. Fails if the model asset or the worker script is unreadable,
    /// or the interpreter cannot be launched; all of these are fatal before
    /// the pipeline starts.
    pub fn create(
        options: &LandmarkerOptions,
        callback: ResultCallback,
    ) -> Result<Self, LandmarkError> {
        std::fs::metadata(&options.model_asset).map_err(|source| LandmarkError::ModelAsset {
            path: options.model_asset.clone(),
            source,
        })?;

        if !Path::new(WORKER_SCRIPT).exists() {
            return Err(LandmarkError::WorkerSpawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("worker script {WORKER_SCRIPT} not found"),
            )));
        }

        let mut command = Command::new("python3");
        command
            .arg(WORKER_SCRIPT)
            .arg("--model")
            .arg(&options.model_asset)
            .arg("--max-faces")
            .arg(options.max_faces.to_string());
        if options.output_blendshapes {
            command.arg("--blendshapes");
        }
        if options.output_transform_matrix {
            command.arg("--matrix");
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(LandmarkError::WorkerSpawn)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            LandmarkError::WorkerSpawn(std::io::Error::other("worker stdin unavailable"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            LandmarkError::WorkerSpawn(std::io::Error::other("worker stdout unavailable"))
        })?;

        let (feed_tx, feed_rx) = bounded::<(Frame, i64)>(1);
        let feeder = thread::Builder::new()
            .name("landmark-feeder".into())
            .spawn(move || feeder_loop(stdin, feed_rx))
            .expect("failed to spawn landmark feeder thread");
        let reader = thread::Builder::new()
            .name("landmark-reader".into())
            .spawn(move || reader_loop(stdout, callback))
            .expect("failed to spawn landmark reader thread");

        debug!("landmark worker started (pid {})", child.id());

        Ok(Self {
            child,
            feed_tx: Some(feed_tx),
            feeder: Some(feeder),
            reader: Some(reader),
        })
    }
}

impl Landmarker for TaskLandmarker {
    fn detect_async(&mut self, frame: Frame, timestamp_ms: i64) -> Result<(), LandmarkError> {
        let tx = self.feed_tx.as_ref().ok_or(LandmarkError::WorkerGone)?;
        match tx.try_send((frame, timestamp_ms)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LandmarkError::WorkerBusy),
            Err(TrySendError::Disconnected(_)) => Err(LandmarkError::WorkerGone),
        }
    }
}

impl Drop for TaskLandmarker {
    fn drop(&mut self) {
        // Close the feed first so the feeder drains out, then kill the child;
        // any in-flight detection is abandoned, its reply never read.
        self.feed_tx.take();
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(handle) = self.feeder.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        debug!("landmark worker stopped");
    }
}

fn feeder_loop(mut stdin: ChildStdin, feed_rx: Receiver<(Frame, i64)>) {
    for (frame, timestamp_ms) in feed_rx {
        let mut header = Vec::with_capacity(16);
        header.extend_from_slice(&frame.width.to_ne_bytes());
        header.extend_from_slice(&frame.height.to_ne_bytes());
        header.extend_from_slice(&timestamp_ms.to_ne_bytes());

        let written = stdin
            .write_all(&header)
            .and_then(|()| stdin.write_all(&frame.data))
            .and_then(|()| stdin.flush());
        if written.is_err() {
            warn!("landmark worker stdin closed, stopping feeder");
            break;
        }
    }
}

fn reader_loop(stdout: ChildStdout, mut callback: ResultCallback) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("landmark worker stdout error: {err}");
                break;
            }
        };
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<WorkerReply>(&line) {
            Ok(reply) => callback(reply.output, reply.timestamp_ms),
            Err(err) => {
                // A malformed reply still completes its submission, otherwise
                // the in-flight flag upstream would never clear.
                warn!("malformed landmark worker reply: {err}");
                callback(LandmarkOutput::default(), -1);
            }
        }
    }
    debug!("landmark reader finished");
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::path::PathBuf;

    use super::*;

    fn noop_callback() -> ResultCallback {
        Box::new(|_output, _timestamp_ms| {})
    }

    #[test]
    fn create_fails_without_model_asset() {
        let options = LandmarkerOptions {
            model_asset: PathBuf::from("/nonexistent/face_landmarker.task"),
            ..LandmarkerOptions::default()
        };
        match TaskLandmarker::create(&options, noop_callback()) {
            Err(LandmarkError::ModelAsset { path, .. }) => {
                assert_eq!(path, options.model_asset);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("created a landmarker without a model asset"),
        }
    }

    #[test]
    fn create_fails_without_worker_script() {
        // The model asset exists but the script is resolved from the working
        // directory, which for unit tests is the crate root.
        let mut model = tempfile::NamedTempFile::new().unwrap();
        model.write_all(b"not a real model").unwrap();

        let options = LandmarkerOptions {
            model_asset: model.path().to_path_buf(),
            ..LandmarkerOptions::default()
        };
        match TaskLandmarker::create(&options, noop_callback()) {
            Err(LandmarkError::WorkerSpawn(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("created a landmarker without the worker script"),
        }
    }

    #[test]
    fn reply_parses_flattened_output() {
        let json = r#"{
            "timestamp_ms": 42,
            "landmarks": [[[0.0, 0.5, 1.0]]],
            "blendshapes": [[{"name": "jawOpen", "score": 0.5}]],
            "matrices": []
        }"#;
        let reply: WorkerReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.timestamp_ms, 42);
        assert_eq!(reply.output.landmarks[0][0], [0.0, 0.5, 1.0]);
        assert_eq!(reply.output.blendshapes[0][0].name, "jawOpen");
        assert!(reply.output.transforms.is_empty());
    }
}
