mod config;
mod logging;

use clap::Parser;
use config::{Config, ConfigError, MetricsConfig};
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};
use sinks::{Registry, RegistryError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about = "Relays JSON log lines to Scalyr and Datadog")]
struct Cli {
    /// YAML configuration file, defaults are used when omitted
    #[arg(long, env = "LOGFWD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum StartupError {
    #[error("could not build statsd recorder: {0}")]
    Statsd(#[from] StatsdError),
    #[error("could not install metrics recorder: {0}")]
    Recorder(String),
    #[error("could not build runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Ingest(#[from] ingest::errors::IngestError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Couldn't load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Invalid sentry DSN: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting");
    if let Err(e) = run(config) {
        tracing::error!(error = %e, "Exiting");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

fn init_metrics(config: &MetricsConfig) -> Result<(), StartupError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(&config.prefix))?;
    metrics::set_global_recorder(recorder).map_err(|e| StartupError::Recorder(e.to_string()))?;

    shared::metrics_defs::describe_all(ingest::metrics_defs::ALL_METRICS);
    shared::metrics_defs::describe_all(sinks::metrics_defs::ALL_METRICS);
    Ok(())
}

fn run(config: Config) -> Result<(), StartupError> {
    if let Some(metrics) = &config.metrics {
        init_metrics(metrics)?;
        tracing::info!(
            host = %metrics.statsd_host,
            port = metrics.statsd_port,
            "Sending metrics to statsd"
        );
    }

    let registry = Registry::from_config(&config.sinks)?;
    tracing::info!(sinks = ?registry.names(), "Sinks enabled");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(ingest::run(config.ingest, registry))?;
    Ok(())
}
