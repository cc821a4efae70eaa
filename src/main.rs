//! Binary entry point for the `purefa-provider` CLI.
//!
//! Each subcommand runs one lifecycle operation. Resource blocks and state
//! records are read from JSON files and the result is printed to stdout as
//! JSON; logs go to stderr.

use std::fs;
use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use clap::Parser;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use purefa::config::{ConfigError, ProviderConfig, ProviderOptions};
use purefa::flasharray::RestClient;
use purefa::provider::{self, Provider, ProviderError};
use purefa::resources::{StateRecord, flasharray};

mod cli;

use cli::{Cli, Command};

/// Environment variable holding the `tracing` filter directive.
const LOG_ENV: &str = "PURE_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("invalid JSON in {path}: {message}")]
    Parse { path: String, message: String },
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("failed to write output: {0}")]
    Output(String),
}

impl CliError {
    fn confirmed_state(&self) -> Option<&StateRecord> {
        match self {
            Self::Provider(err) => err.confirmed_state(),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = dispatch(cli)
        .await
        .and_then(|output| write_output(io::stdout(), &output));
    let exit_code = match result {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<Value, CliError> {
    let provider = Provider::new();
    let options = cli.provider.as_deref();
    match cli.command {
        Command::Schema => to_value(&provider.schema()),
        Command::Plan(args) => {
            let config: Value = read_json(&args.config)?;
            let prior: Option<StateRecord> = args.state.as_deref().map(read_json).transpose()?;
            to_value(&provider.plan(&args.resource_type, prior.as_ref(), &config)?)
        }
        Command::Array => {
            let client = connect(options).await?;
            to_value(
                &provider
                    .read_data_source(&client, flasharray::TYPE_NAME)
                    .await?,
            )
        }
        Command::Create(args) => {
            let config: Value = read_json(&args.config)?;
            provider.validate(&args.resource_type, &config)?;
            let client = connect(options).await?;
            to_value(&provider.create(&client, &args.resource_type, &config).await?)
        }
        Command::Read(args) => {
            let prior: StateRecord = read_json(&args.state)?;
            let client = connect(options).await?;
            to_value(&provider.read(&client, &args.resource_type, &prior).await?)
        }
        Command::Update(args) => {
            let config: Value = read_json(&args.config)?;
            let prior: StateRecord = read_json(&args.state)?;
            provider.validate(&args.resource_type, &config)?;
            let client = connect(options).await?;
            to_value(
                &provider
                    .update(&client, &args.resource_type, &prior, &config)
                    .await?,
            )
        }
        Command::Delete(args) => {
            let prior: StateRecord = read_json(&args.state)?;
            let client = connect(options).await?;
            provider.delete(&client, &args.resource_type, &prior).await?;
            Ok(Value::Null)
        }
        Command::Import(args) => {
            let client = connect(options).await?;
            to_value(&provider.import(&client, &args.resource_type, &args.id).await?)
        }
    }
}

async fn connect(options_path: Option<&Utf8Path>) -> Result<RestClient, CliError> {
    let options: ProviderOptions = options_path.map(read_json).transpose()?.unwrap_or_default();
    let layered = ProviderConfig::load_without_cli_args()?;
    Ok(provider::configure(&options, &layered).await?)
}

fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, CliError> {
    let text = fs::read_to_string(path).map_err(|err| CliError::Read {
        path: path.to_string(),
        message: err.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|err| CliError::Parse {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn to_value(value: &impl Serialize) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(|err| CliError::Output(err.to_string()))
}

fn write_output(mut target: impl Write, value: &Value) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

/// A partially applied change still prints its state record to stdout so
/// the caller keeps tracking the object.
fn report_error(err: &CliError) {
    if let Some(record) = err.confirmed_state() {
        write_confirmed(io::stdout(), record);
    }
    write_error(io::stderr(), err);
}

fn write_confirmed(target: impl Write, record: &StateRecord) {
    to_value(record)
        .and_then(|value| write_output(target, &value))
        .ok();
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
