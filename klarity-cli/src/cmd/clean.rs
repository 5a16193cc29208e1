use anyhow::{Context, Result};
use clap::{ArgMatches, Command};
use klarity_core::clean_output;

use super::path_arg;
use crate::config::KlarityConfig;

pub fn make_subcommand() -> Command {
    Command::new("clean")
        .about("Remove all build output from a Klarity project")
        .arg(path_arg())
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = KlarityConfig::from_args(args)?;
    let output_dir = clean_output(&config.project_root, &config.site)
        .with_context(|| format!("failed to clean {}", config.project_root.display()))?;
    tracing::info!("Cleaned all build artifacts from {}", output_dir.display());
    Ok(())
}
