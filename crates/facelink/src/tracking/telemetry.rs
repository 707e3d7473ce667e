//! Tracing and metrics bootstrap for the tracker process.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    filter::{filter_fn, EnvFilter},
    fmt,
    layer::SubscriberExt,
    prelude::*,
};

/// Keeps the chrome trace writer flushing for the process lifetime.
pub(crate) struct TelemetryGuard {
    _chrome_guard: Option<tracing_chrome::FlushGuard>,
}

/// Install the global tracing subscriber: env-filtered fmt output, plus an
/// optional Chrome trace layer for span-level latency inspection.
pub(crate) fn init(verbose: bool, chrome_trace_path: Option<&Path>) -> TelemetryGuard {
    let default_level = if verbose { "debug" } else { "info" };
    let make_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (chrome_layer, chrome_guard) = match chrome_trace_path.map(build_chrome_layer) {
        Some(Ok((layer, guard))) => (Some(layer), Some(guard)),
        Some(Err(err)) => {
            eprintln!("failed to initialise chrome trace writer: {err}");
            (None, None)
        }
        None => (None, None),
    };

    // An already-installed subscriber (tests, embedding) is kept as-is.
    match chrome_layer {
        Some(chrome) => {
            let span_only = filter_fn(|metadata| metadata.is_span());
            let _ = tracing::subscriber::set_global_default(
                tracing_subscriber::registry()
                    .with(chrome.with_filter(span_only))
                    .with(
                        fmt::layer()
                            .with_target(false)
                            .with_timer(fmt::time::uptime())
                            .with_filter(make_filter()),
                    ),
            );
        }
        None => {
            let _ = tracing::subscriber::set_global_default(
                tracing_subscriber::registry().with(
                    fmt::layer()
                        .with_target(false)
                        .with_timer(fmt::time::uptime())
                        .with_filter(make_filter()),
                ),
            );
        }
    }

    TelemetryGuard {
        _chrome_guard: chrome_guard,
    }
}

/// Expose the metrics recorder over a Prometheus scrape endpoint.
pub(crate) fn install_metrics_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")
}

fn build_chrome_layer(
    path: &Path,
) -> std::io::Result<(
    tracing_chrome::ChromeLayer<tracing_subscriber::Registry>,
    tracing_chrome::FlushGuard,
)> {
    let file = std::fs::File::create(path)?;
    let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .writer(file)
        .include_args(true)
        .build();
    Ok((layer, guard))
}
