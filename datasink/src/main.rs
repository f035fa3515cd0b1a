mod cli;
mod config;
mod database;
mod encoder;
mod ingest;
mod report;
mod toolchain;

#[cfg(test)]
mod ingest_test;

use crate::{
    cli::Cli,
    config::ConfigErrors,
    database::{ConnectionError, StorageAdapters},
    encoder::MetricEncoder,
    ingest::{IngestError, RunMetadata, Scanner},
};
use chrono::Utc;
use std::{io, process::ExitCode};
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
enum Error {
    #[error(transparent)]
    Config(#[from] ConfigErrors),
    #[error("Failed to set up RedisTimeSeries: {0}")]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

fn init_logging(verbose: bool) {
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// capture time of the run, millisecond precision truncated to whole seconds
fn capture_timestamp() -> i64 {
    Utc::now().timestamp() * 1000
}

fn run(cli: &Cli) -> Result<(), Error> {
    let mut config = cli.config()?;

    if config.preflight_checks() {
        return Err(ConfigErrors::PreflightFailed.into());
    }

    let metadata = RunMetadata::new(
        toolchain::resolve_go_version(config.go_version.as_deref()),
        config.git_ref(),
        cli.timestamp.unwrap_or_else(capture_timestamp),
    );
    debug!(?metadata, "Starting run");

    let encoder = MetricEncoder::load(&config);
    let mut store = StorageAdapters::load(&config, cli.dry_run)?;

    let mut scanner = Scanner::new(metadata, &encoder, &mut store);
    let result = scanner.run(io::stdin().lock());

    println!(
        "{} {} {}",
        scanner.metadata.package, scanner.metadata.goos, scanner.metadata.goarch
    );
    scanner.report.log();
    result?;

    if let StorageAdapters::Memory(memory) = &store {
        for call in memory.calls.iter() {
            info!("Dry run: {call}");
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse_normalized();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");

            ExitCode::FAILURE
        }
    }
}
