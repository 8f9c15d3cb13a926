//! Shared plumbing for the demo binaries: logging setup and JSON output.

use std::fmt::Debug;

use anyhow::{Context, Result};
use argparcel::{Record, Registry};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

/// Log to stderr so that stdout only carries the parsed record.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Parse the process arguments into `T` and print it as one line of JSON.
pub fn run<T>() -> Result<()>
where
    T: Record + Serialize + Debug,
{
    run_with::<T>(&Registry::default())
}

/// [`run`] with extra converters for caller-defined scalars.
pub fn run_with<T>(registry: &Registry) -> Result<()>
where
    T: Record + Serialize + Debug,
{
    init_tracing();

    let record: T =
        argparcel::parse_with(registry).context("failed to parse command-line arguments")?;
    tracing::debug!(?record, "parsed record");

    let json = serde_json::to_string(&record).context("failed to serialize record")?;
    println!("{json}");
    Ok(())
}
