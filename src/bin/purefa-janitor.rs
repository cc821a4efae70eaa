//! Acceptance-test janitor for the FlashArray provider.
//!
//! This binary eradicates destroyed volumes, protection groups and volume
//! groups whose names start with the test prefix and then verifies none
//! remain. Connection settings come from the `PURE_*` environment variables.

use clap::Parser;
use purefa::config::{ProviderConfig, ProviderOptions};
use purefa::janitor::{DEFAULT_TEST_PREFIX, Janitor, JanitorConfig, TEST_PREFIX_ENV};
use purefa::provider;
use std::io::Write as _;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "purefa-janitor",
    about = "Eradicate destroyed FlashArray objects left behind by acceptance tests"
)]
struct Cli {
    /// Name prefix identifying objects created by the test run.
    #[arg(long, env = TEST_PREFIX_ENV, default_value = DEFAULT_TEST_PREFIX)]
    prefix: String,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("PURE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = JanitorConfig::new(cli.prefix).map_err(|err| err.to_string())?;
    let layered = ProviderConfig::load_without_cli_args().map_err(|err| err.to_string())?;
    let client = provider::configure(&ProviderOptions::default(), &layered)
        .await
        .map_err(|err| err.to_string())?;
    let summary = Janitor::new(config, client)
        .sweep()
        .await
        .map_err(|err| err.to_string())?;
    writeln!(
        std::io::stdout(),
        "janitor sweep complete: eradicated_volumes={}, eradicated_pgroups={}, eradicated_vgroups={}",
        summary.eradicated_volumes,
        summary.eradicated_pgroups,
        summary.eradicated_vgroups
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}
