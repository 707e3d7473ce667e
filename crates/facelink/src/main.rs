mod tracking;

use tracking::TrackerConfig;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = TrackerConfig::from_args(&args)?;

    if config.list_cameras {
        // Print before any telemetry is installed so stdout stays clean JSON.
        let cameras = camera_ingest::list_cameras(tracking::CAMERA_PROBE_LIMIT);
        println!("{}", serde_json::to_string(&cameras)?);
        return Ok(());
    }

    tracking::run(config)
}
