use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use klarity_core::{BuildOptions, build_site};

use super::path_arg;
use crate::config::KlarityConfig;

pub fn make_subcommand() -> Command {
    Command::new("build")
        .about("Build Klarity docs from a directory")
        .arg(path_arg())
        .arg(
            Arg::new("no-search")
                .long("no-search")
                .help("Skip generating the Pagefind search index")
                .action(ArgAction::SetTrue),
        )
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = KlarityConfig::from_args(args)?;
    let options = BuildOptions {
        search: !args.get_flag("no-search"),
    };

    let report = build_site(&config.project_root, &config.site, &options)
        .with_context(|| format!("failed to build {}", config.project_root.display()))?;

    tracing::info!(
        pages = report.pages,
        search = report.search_indexed,
        "Site built successfully in {}",
        report.output_dir.display()
    );
    Ok(())
}
