use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

pub const DEFAULT_PORT: u16 = 8787;
const DEFAULT_MODEL: &str = "models/face_landmarker.task";

const USAGE: &str = "Usage: facelink [--port <port>] [--camera <index>] [--model <path>] \
[--format json|binary] [--no-matrix] [--list-cameras] [--verbose] \
[--metrics-addr <ip:port>] [--chrome-trace <path>]";

/// Payload encoding, fixed at startup together with the matching transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Self-describing JSON over a plain datagram socket.
    Json,
    /// Compact native-endian binary over the broadcast transport.
    Binary,
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFormat::Json => write!(f, "json"),
            PayloadFormat::Binary => write!(f, "binary"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub port: u16,
    pub camera_index: i32,
    pub model_path: PathBuf,
    pub format: PayloadFormat,
    pub output_transform_matrix: bool,
    pub list_cameras: bool,
    pub verbose: bool,
    pub metrics_addr: Option<SocketAddr>,
    pub chrome_trace_path: Option<PathBuf>,
}

impl TrackerConfig {
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut port: Option<u16> = None;
        let mut camera_index: Option<i32> = None;
        let mut model_path: Option<PathBuf> = None;
        let mut format: Option<PayloadFormat> = None;
        let mut output_transform_matrix = true;
        let mut list_cameras = false;
        let mut verbose = false;
        let mut metrics_addr: Option<SocketAddr> = None;
        let mut chrome_trace_path: Option<PathBuf> = None;

        let mut idx = 1;
        while idx < args.len() {
            match args[idx].as_str() {
                "--port" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--port requires a value"))?
                        .parse::<u16>()
                        .context("--port must be a port number")?;
                    port = Some(value);
                    idx += 1;
                }
                "--camera" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--camera requires a value"))?
                        .parse::<i32>()
                        .context("--camera must be a device index")?;
                    if value < 0 {
                        bail!("--camera must be a non-negative device index");
                    }
                    camera_index = Some(value);
                    idx += 1;
                }
                "--model" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--model requires a value"))?;
                    model_path = Some(PathBuf::from(value));
                    idx += 1;
                }
                "--format" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--format requires a value"))?;
                    format = Some(match value.as_str() {
                        "json" => PayloadFormat::Json,
                        "binary" => PayloadFormat::Binary,
                        other => bail!("--format must be json or binary, got {other}"),
                    });
                    idx += 1;
                }
                "--no-matrix" => {
                    output_transform_matrix = false;
                    idx += 1;
                }
                "--list-cameras" => {
                    list_cameras = true;
                    idx += 1;
                }
                "--verbose" => {
                    verbose = true;
                    idx += 1;
                }
                "--metrics-addr" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--metrics-addr requires a value"))?
                        .parse::<SocketAddr>()
                        .context("--metrics-addr must be an ip:port address")?;
                    metrics_addr = Some(value);
                    idx += 1;
                }
                "--chrome-trace" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--chrome-trace requires a value"))?;
                    chrome_trace_path = Some(PathBuf::from(value));
                    idx += 1;
                }
                other => {
                    bail!("Unrecognised argument: {other}\n\n{USAGE}");
                }
            }
        }

        let format = format.unwrap_or(PayloadFormat::Json);
        if list_cameras && format == PayloadFormat::Binary {
            bail!("--list-cameras is not available with the binary encoder");
        }

        Ok(Self {
            port: port.unwrap_or(DEFAULT_PORT),
            camera_index: camera_index.unwrap_or(0),
            model_path: model_path.unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL)),
            format,
            output_transform_matrix,
            list_cameras,
            verbose,
            metrics_addr,
            chrome_trace_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<TrackerConfig> {
        let mut full = vec!["facelink".to_string()];
        full.extend(args.iter().map(|s| s.to_string()));
        TrackerConfig::from_args(&full)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.port, 8787);
        assert_eq!(config.camera_index, 0);
        assert_eq!(config.format, PayloadFormat::Json);
        assert!(config.output_transform_matrix);
        assert!(!config.list_cameras);
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL));
    }

    #[test]
    fn parses_flags() {
        let config = parse(&[
            "--port", "9000", "--camera", "2", "--format", "binary", "--no-matrix", "--verbose",
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.camera_index, 2);
        assert_eq!(config.format, PayloadFormat::Binary);
        assert!(!config.output_transform_matrix);
        assert!(config.verbose);
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(parse(&["--frobnicate"]).is_err());
    }

    #[test]
    fn rejects_bad_port() {
        assert!(parse(&["--port", "notaport"]).is_err());
    }

    #[test]
    fn rejects_negative_camera() {
        assert!(parse(&["--camera", "-1"]).is_err());
    }

    #[test]
    fn rejects_listing_under_binary_encoder() {
        assert!(parse(&["--list-cameras", "--format", "binary"]).is_err());
        assert!(parse(&["--list-cameras"]).unwrap().list_cameras);
    }

    #[test]
    fn parses_metrics_addr() {
        let config = parse(&["--metrics-addr", "127.0.0.1:9090"]).unwrap();
        assert_eq!(config.metrics_addr.unwrap().port(), 9090);
    }
}
