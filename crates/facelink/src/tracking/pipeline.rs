//! Pipeline orchestrator: pulls frames, feeds the landmarker, broadcasts
//! whatever detections come back.
//!
//! Startup failures (camera, socket, landmark worker) propagate out of
//! [`run`] and end the process with a non-zero status before the loop ever
//! starts; once running, the loop only ends on end-of-stream or a shutdown
//! request.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Once,
};
use std::time::Instant;

use anyhow::{Context, Result};
use camera_ingest::{CameraSource, FrameSource};
use landmark_core::{Landmarker, LandmarkerOptions, TaskLandmarker};
use tracing::{debug, info, warn};

use crate::tracking::{
    adapter::DetectionAdapter,
    broadcast::Broadcaster,
    config::{PayloadFormat, TrackerConfig},
    slot::ResultSlot,
    telemetry, wire,
};

const HEARTBEAT_INTERVAL_FRAMES: u64 = 120;

/// Counters accumulated by one run of the capture loop.
#[derive(Debug, Default)]
pub(crate) struct LoopStats {
    pub(crate) frames: u64,
    pub(crate) dropped: u64,
    pub(crate) sent: u64,
    pub(crate) send_failures: u64,
}

/// Run the tracker until the camera stream ends or shutdown is requested.
pub fn run(config: TrackerConfig) -> Result<()> {
    let _telemetry_guard = telemetry::init(config.verbose, config.chrome_trace_path.as_deref());
    if let Some(addr) = config.metrics_addr {
        telemetry::install_metrics_exporter(addr)?;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrl_handler(shutdown.clone());

    let mut camera = CameraSource::open(config.camera_index)
        .with_context(|| format!("cannot open camera #{}", config.camera_index))?;
    info!(
        "camera #{} opened via {}",
        config.camera_index,
        camera.backend_name()
    );

    let sink = Broadcaster::bind(config.format, config.port)
        .context("failed to bind broadcast socket")?;
    info!("sending {} payloads to {}", config.format, sink.target());

    let slot = ResultSlot::new();
    let options = LandmarkerOptions {
        model_asset: config.model_path.clone(),
        max_faces: 1,
        output_blendshapes: true,
        output_transform_matrix: config.output_transform_matrix,
    };
    let mut adapter = DetectionAdapter::new(&slot, |callback| {
        TaskLandmarker::create(&options, callback)
            .map(|landmarker| Box::new(landmarker) as Box<dyn Landmarker>)
    })
    .context("failed to start the landmark worker")?;

    let stats = run_loop(
        &mut camera,
        &mut adapter,
        &slot,
        config.format,
        &sink,
        &shutdown,
    );

    // Draining: the camera goes first; the adapter teardown abandons any
    // in-flight detection, and a result still sitting in the slot is never
    // sent.
    drop(camera);
    debug!("camera released");
    drop(adapter);

    info!(
        "pipeline stopped: {} frames, {} dropped, {} sent, {} send failures",
        stats.frames, stats.dropped, stats.sent, stats.send_failures
    );
    Ok(())
}

/// The capture loop proper: pull, submit (drop if the detector is busy),
/// poll the slot once, encode and send. Strictly sequential, no internal
/// suspension.
pub(crate) fn run_loop(
    source: &mut dyn FrameSource,
    adapter: &mut DetectionAdapter,
    slot: &ResultSlot,
    format: PayloadFormat,
    sink: &Broadcaster,
    shutdown: &AtomicBool,
) -> LoopStats {
    let mut stats = LoopStats::default();
    let mut smoothed_fps = 0.0f32;
    let mut last_instant = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        let Some(frame) = source.next_frame() else {
            debug!("frame source ended");
            break;
        };
        stats.frames += 1;

        let now = Instant::now();
        let elapsed = now.duration_since(last_instant).as_secs_f32();
        last_instant = now;
        if elapsed > 0.0 {
            let instant = 1.0 / elapsed;
            smoothed_fps = if smoothed_fps == 0.0 {
                instant
            } else {
                0.9 * smoothed_fps + 0.1 * instant
            };
            metrics::gauge!("facelink_capture_fps").set(smoothed_fps as f64);
        }

        if !adapter.submit(frame) {
            stats.dropped += 1;
            metrics::counter!("facelink_dropped_frames_total").increment(1);
        }

        if let Some(pose) = slot.take() {
            let payload = wire::encode(format, &pose);
            match sink.send(&payload) {
                Ok(_) => {
                    stats.sent += 1;
                    metrics::counter!("facelink_payloads_sent_total").increment(1);
                }
                Err(err) => {
                    stats.send_failures += 1;
                    metrics::counter!("facelink_send_failures_total").increment(1);
                    warn!("broadcast send failed: {err}");
                }
            }
        }

        if stats.frames % HEARTBEAT_INTERVAL_FRAMES == 0 {
            debug!(
                "capture heartbeat: frame #{}, {:.1} fps, {} dropped, {} sent",
                stats.frames, smoothed_fps, stats.dropped, stats.sent
            );
        }
    }

    stats
}

fn install_ctrl_handler(shutdown: Arc<AtomicBool>) {
    static CTRL_HANDLER: Once = Once::new();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("failed to install Ctrl+C handler: {err}");
        }
    });
}
