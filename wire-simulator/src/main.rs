mod charge;
mod compression;
mod config;
mod detector;
mod digit;
mod error;
mod fft;
mod grouping;
mod io;
mod metrics;
mod noise;
mod random;
mod response;
mod simulation;
mod synthesis;

use anyhow::Result;
use clap::Parser;
use config::SimulationConfig;
use digit::RawDigit;
use error::SimulationError;
use io::{DigitWriter, EventInput};
use metrics_exporter_prometheus::PrometheusBuilder;
use noise::spectrum::NoiseSpectrumStore;
use simulation::WireSimulation;
use std::{net::SocketAddr, path::PathBuf};
use tracing::{error, info, level_filters::LevelFilter};
use wiresim_common::{
    init_tracer,
    metrics::component_info_metric,
    tracer::TracerOptions,
};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// JSON file describing the detector, electronics and noise model
    #[clap(long)]
    config: PathBuf,

    /// JSON file listing the events to digitise. If omitted, `num-events`
    /// events without charge are simulated.
    #[clap(long)]
    input: Option<PathBuf>,

    /// Destination of the digitised events, one JSON object per line
    #[clap(long)]
    output: PathBuf,

    /// Number of empty events to simulate when no input is given
    #[clap(long, default_value = "1")]
    num_events: u32,

    /// Decode every compressed waveform before writing it
    #[clap(long)]
    verify_compression: bool,

    /// If set, metrics are served to Prometheus from this address
    #[clap(long, env)]
    observability_address: Option<SocketAddr>,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let tracer = init_tracer!(TracerOptions::new(LevelFilter::INFO));

    if let Some(address) = args.observability_address {
        PrometheusBuilder::new()
            .with_http_listener(address)
            .install()?;
        info!("Serving metrics on {address}");
    }
    component_info_metric("wire-simulator");
    metrics::describe();

    let config = SimulationConfig::load(&args.config)
        .map_err(SimulationError::from)
        .inspect_err(metrics::record_failure)?;
    let simulation = WireSimulation::from_config(&config, &mut NoiseSpectrumStore::from_env())
        .inspect_err(metrics::record_failure)?;

    let events = match &args.input {
        Some(path) => io::read_events(path)
            .map_err(SimulationError::from)
            .inspect_err(metrics::record_failure)?,
        None => (0..args.num_events).map(EventInput::empty).collect(),
    };

    let mut writer = DigitWriter::create(&args.output)
        .map_err(SimulationError::from)
        .inspect_err(metrics::record_failure)?;
    for EventInput { event, records } in events {
        let digits = simulation.process_event(event, records).inspect_err(|e| {
            error!("Event {event} failed: {e}");
            metrics::record_failure(e);
        })?;
        if args.verify_compression {
            for digit in &digits {
                digit
                    .uncompressed()
                    .map_err(SimulationError::from)
                    .inspect_err(metrics::record_failure)?;
            }
        }
        info!(
            "Event {event}: {} channels digitised into {} words",
            digits.len(),
            digits.iter().map(RawDigit::stored_len).sum::<usize>()
        );
        writer
            .write_event(event, &digits)
            .map_err(SimulationError::from)
            .inspect_err(metrics::record_failure)?;
    }
    writer
        .finish()
        .map_err(SimulationError::from)
        .inspect_err(metrics::record_failure)?;

    info!("{} finished", tracer.service_name());
    Ok(())
}
