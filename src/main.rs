//! DDx CLI
//!
//! Entry point for the `ddx` binary. Only the `config` command family lives
//! here; everything else builds on the library's configuration loader.

use anyhow::Result;
use clap::Parser;
use ddx_config::cli::config::run_config;
use ddx_config::cli::{Cli, Command};
use ddx_config::config::ConfigPaths;
use ddx_config::logging::init_logging;
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    init_logging(&cli.log, cli.verbose)?;

    let paths = match cli.working_dir {
        Some(ref dir) => ConfigPaths::for_working_dir(dir),
        None => ConfigPaths::discover(),
    };
    debug!("working directory: {}", paths.working_dir.display());

    match cli.command {
        Command::Config(ref args) => run_config(args, paths)?,
    }

    Ok(())
}
