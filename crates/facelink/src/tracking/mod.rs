//! Capture → detect → broadcast pipeline.
//!
//! The module is split into focused submodules:
//! - `config`: CLI configuration parsing.
//! - `pipeline`: orchestrates the pull → submit → poll → send loop.
//! - `adapter`: in-flight policy around the asynchronous landmarker.
//! - `slot`: single-slot latest-wins hand-off from the detection callback.
//! - `wire`: payload encoding (JSON and compact binary).
//! - `broadcast`: UDP sinks for both transport variants.
//! - `data`: the forwarded pose representation.
//! - `telemetry`: tracing and metrics bootstrap.

pub use config::{PayloadFormat, TrackerConfig};
pub use pipeline::run;

/// Highest device index probed by `--list-cameras`.
pub const CAMERA_PROBE_LIMIT: i32 = 8;

mod adapter;
mod broadcast;
mod config;
mod data;
mod pipeline;
mod slot;
mod telemetry;
mod wire;
