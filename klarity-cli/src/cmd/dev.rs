use std::sync::Arc;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use klarity_dev_server::{ConfigLoader, LiveServer, LiveServerConfig};

use super::path_arg;
use crate::config::{CliOverrides, KlarityConfig};

pub fn make_subcommand() -> Command {
    Command::new("dev")
        .about("Start a local development server with live reload")
        .arg(path_arg())
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to serve on (overrides dev.port)")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-search")
                .long("no-search")
                .help("Skip generating the Pagefind search index")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = KlarityConfig::from_args(args)?;
    let overrides = CliOverrides::from_args(args);

    let project_root = config.project_root.clone();
    let load_config: ConfigLoader = Arc::new(move || KlarityConfig::load(&project_root, &overrides).map(|config| config.site));

    let server_config = LiveServerConfig {
        port: config.site.dev.effective_port(),
        project_root: config.project_root,
        open: args.get_flag("open"),
        search: !args.get_flag("no-search"),
        ..LiveServerConfig::default()
    };

    LiveServer::new(server_config, load_config).run().await
}
