//! ORBIS probe
//!
//! Polls a snapshot endpoint with the production scheduler and pipeline, using
//! a headless uploader, and logs every applied snapshot.
//!
//! ```text
//! orbis-probe [config.json] [seconds]
//! ```
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use thiserror::Error;

use orbis_core::codec::WireCodec;
use orbis_core::config::{ConfigError, OrbisConfig};
use orbis_core::ingest::{HeadlessUploader, HttpSnapshotSource, IngestPipeline, SnapshotSource, SourceError};
use orbis_core::scheduler::{DriverError, EpochGate, PollDriver};

const DEFAULT_PROBE_SECS: u64 = 30;

#[derive(Error, Debug)]
enum ProbeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Invalid probe duration '{0}'")]
    InvalidDuration(String),
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("{}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), ProbeError> {
    let mut args = env::args().skip(1);
    let mut config = match args.next() {
        Some(path) => OrbisConfig::from_file(path)?,
        None => OrbisConfig::default(),
    };
    config.apply_env_overrides()?;
    config.validate()?;

    let seconds = match args.next() {
        Some(text) => text.parse::<u64>().map_err(|_| ProbeError::InvalidDuration(text))?,
        None => DEFAULT_PROBE_SECS,
    };

    let timeout = config.poll.request_timeout();
    let primary: Arc<dyn SnapshotSource> =
        Arc::new(HttpSnapshotSource::new("primary", &config.source.snapshot_url, timeout)?);

    let gate = EpochGate::new();
    let mut pipeline = IngestPipeline::new(primary, HeadlessUploader::new(), gate.clone())
        .with_codec(WireCodec::new(config.codec.clone()))
        .with_config(config.ingest.clone());
    if let Some(url) = &config.source.degraded_url {
        pipeline = pipeline.with_degraded(Arc::new(HttpSnapshotSource::new("degraded", url, timeout)?));
    }
    let pipeline = Arc::new(pipeline);

    let driver = PollDriver::spawn(Arc::clone(&pipeline), gate, &config.poll);
    driver.activate()?;
    info!(
        "Probing {} every {} ms for {} s",
        config.source.snapshot_url, config.poll.interval_ms, seconds
    );

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
    driver.shutdown().await;

    let diagnostics = pipeline.diagnostics().snapshot();
    info!(
        "Probe finished: {} snapshots applied, {} consecutive failures, last error {:?}",
        diagnostics.applied, diagnostics.consecutive_failures, diagnostics.last_error
    );
    match pipeline.live().current() {
        Some(state) => info!(
            "Live snapshot {}: {} points, bounds {:?}, intensity {:.3}",
            state.sequence(),
            state.len(),
            state.snapshot.bounds,
            state.snapshot.intensity
        ),
        None => info!("No snapshot was applied"),
    }
    Ok(())
}
