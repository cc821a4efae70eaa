//! Build script for generating the `purefa-provider` man page.
//!
//! The page is rendered from the same clap definitions the binary parses and
//! written to `$OUT_DIR/purefa-provider.1` for packaging.

use std::env;
use std::fs;
use std::io::Write;

use camino::Utf8PathBuf;
use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var("OUT_DIR").map(Utf8PathBuf::from)?;

    let mut page = Vec::new();
    Man::new(Cli::command()).render(&mut page)?;
    fs::write(out_dir.join("purefa-provider.1"), page)?;

    Ok(())
}
