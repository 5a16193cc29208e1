use std::path::{Path, PathBuf};
use std::process::Command as Process;

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

use super::{confirm, path_arg};
use crate::config::KlarityConfig;

pub fn make_subcommand() -> Command {
    Command::new("apply")
        .about("Apply a Git patch to the Klarity project")
        .arg(path_arg())
        .arg(
            Arg::new("patch")
                .value_name("PATCH")
                .help("The path to the patch file to apply")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("yes")
                .short('y')
                .long("yes")
                .help("Apply the patch without previewing or confirming")
                .action(ArgAction::SetTrue),
        )
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = KlarityConfig::from_args(args)?;
    let patch = args
        .get_one::<PathBuf>("patch")
        .context("missing patch argument")?;
    let patch = std::path::absolute(patch).with_context(|| format!("invalid patch path {}", patch.display()))?;
    let content =
        std::fs::read_to_string(&patch).with_context(|| format!("could not read patch {}", patch.display()))?;

    let git = which::which("git").context("git is required to apply patches but was not found in PATH")?;

    git_apply(&git, &config.project_root, &patch, true).context("patch does not apply cleanly")?;

    if !args.get_flag("yes") {
        println!("Preview of changes:\n{content}");
        if !confirm("Apply this patch?")? {
            println!("Patch application cancelled.");
            return Ok(());
        }
    }

    git_apply(&git, &config.project_root, &patch, false)?;
    tracing::info!("Patch applied successfully");
    Ok(())
}

/// Run `git apply` (or `git apply --check`) with the project as working
/// directory.
fn git_apply(git: &Path, project_root: &Path, patch: &Path, check_only: bool) -> Result<()> {
    let mut command = Process::new(git);
    command.arg("apply").current_dir(project_root);
    if check_only {
        command.arg("--check");
    }
    let output = command
        .arg(patch)
        .output()
        .with_context(|| format!("could not run {}", git.display()))?;

    if !output.status.success() {
        bail!("git apply failed: {}", String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(())
}
