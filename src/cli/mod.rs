//! Command-line interface definitions for the `purefa-provider` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `purefa-provider` binary.
#[derive(Debug, Parser)]
#[command(
    name = "purefa-provider",
    about = "Manage Pure Storage FlashArray objects as declarative resources",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// JSON file holding the provider block. Unset options fall back to
    /// `PURE_*` environment variables.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) provider: Option<Utf8PathBuf>,
    /// Operation to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Operations exposed by `purefa-provider`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Print the provider, resource and data source schemas as JSON.
    #[command(name = "schema")]
    Schema,
    /// Read the `purefa_flasharray` data source.
    #[command(name = "array")]
    Array,
    /// Compare a resource block with its prior state without contacting the array.
    #[command(name = "plan")]
    Plan(PlanArgs),
    /// Create the object described by a resource block.
    #[command(name = "create")]
    Create(ConfigArgs),
    /// Refresh a state record; prints `null` when the object is gone.
    #[command(name = "read")]
    Read(StateArgs),
    /// Update an object in place from a resource block and its prior state.
    #[command(name = "update")]
    Update(UpdateArgs),
    /// Delete the object behind a state record.
    #[command(name = "delete")]
    Delete(StateArgs),
    /// Adopt an existing object by identifier.
    #[command(name = "import")]
    Import(ImportArgs),
}

/// Arguments for `purefa-provider plan`.
#[derive(Debug, Args)]
pub(crate) struct PlanArgs {
    /// Resource type, for example `purefa_volume`.
    pub(crate) resource_type: String,
    /// JSON file holding the resource block.
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Utf8PathBuf,
    /// JSON file holding the prior state record; omitted for new objects.
    #[arg(long, value_name = "PATH")]
    pub(crate) state: Option<Utf8PathBuf>,
}

/// Arguments for `purefa-provider create`.
#[derive(Debug, Args)]
pub(crate) struct ConfigArgs {
    /// Resource type, for example `purefa_volume`.
    pub(crate) resource_type: String,
    /// JSON file holding the resource block.
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Utf8PathBuf,
}

/// Arguments for `purefa-provider read` and `purefa-provider delete`.
#[derive(Debug, Args)]
pub(crate) struct StateArgs {
    /// Resource type, for example `purefa_volume`.
    pub(crate) resource_type: String,
    /// JSON file holding the state record.
    #[arg(long, value_name = "PATH")]
    pub(crate) state: Utf8PathBuf,
}

/// Arguments for `purefa-provider update`.
#[derive(Debug, Args)]
pub(crate) struct UpdateArgs {
    /// Resource type, for example `purefa_volume`.
    pub(crate) resource_type: String,
    /// JSON file holding the resource block.
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Utf8PathBuf,
    /// JSON file holding the prior state record.
    #[arg(long, value_name = "PATH")]
    pub(crate) state: Utf8PathBuf,
}

/// Arguments for `purefa-provider import`.
#[derive(Debug, Args)]
pub(crate) struct ImportArgs {
    /// Resource type, for example `purefa_host`.
    pub(crate) resource_type: String,
    /// Identifier of the existing object.
    pub(crate) id: String,
}
