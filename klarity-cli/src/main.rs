//! Klarity command line interface.

mod cmd;
mod config;

use clap::{Arg, ArgAction, Command, crate_version};
use tracing_subscriber::EnvFilter;

fn create_clap_command() -> Command {
    Command::new("klarity")
        .about("A very simple markdown docs generator")
        .version(crate_version!())
        .propagate_version(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show debug output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(cmd::init::make_subcommand())
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::dev::make_subcommand())
        .subcommand(cmd::clean::make_subcommand())
        .subcommand(cmd::doctor::make_subcommand())
        .subcommand(cmd::apply::make_subcommand())
}

fn init_logger(verbose: bool) {
    // --verbose enables DEBUG, otherwise use RUST_LOG or default to INFO
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() {
    let matches = create_clap_command().get_matches();
    init_logger(matches.get_flag("verbose"));

    let result = match matches.subcommand() {
        Some(("init", args)) => cmd::init::execute(args),
        Some(("build", args)) => cmd::build::execute(args),
        Some(("dev", args)) => cmd::dev::execute(args).await,
        Some(("clean", args)) => cmd::clean::execute(args),
        Some(("doctor", args)) => cmd::doctor::execute(args),
        Some(("apply", args)) => cmd::apply::execute(args),
        _ => unreachable!("a subcommand is required"),
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}
