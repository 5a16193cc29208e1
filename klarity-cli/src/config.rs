use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use klarity_core::{CONFIG_FILE, Config};

/// Settings given on the command line, applied over every other source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub port: Option<u16>,
}

impl CliOverrides {
    /// Only reads arguments the subcommand actually defines.
    pub fn from_args(args: &ArgMatches) -> Self {
        Self {
            port: args.try_get_one::<u16>("port").ok().flatten().copied(),
        }
    }
}

/// A project directory together with its fully resolved configuration.
#[derive(Debug, Clone)]
pub struct KlarityConfig {
    pub project_root: PathBuf,
    pub site: Config,
}

impl KlarityConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (KLARITY_*)
    /// 3. `klarity.toml` in the project root
    /// 4. Defaults (lowest priority)
    pub fn load(project_root: &Path, overrides: &CliOverrides) -> Result<Self> {
        let site = load_site_config(project_root, overrides)?;
        Ok(Self {
            project_root: project_root.to_path_buf(),
            site,
        })
    }

    /// Resolve the project path from the `path` argument and load its config.
    pub fn from_args(args: &ArgMatches) -> Result<Self> {
        let project_root = project_path(args)?;
        Self::load(&project_root, &CliOverrides::from_args(args))
    }
}

pub fn project_path(args: &ArgMatches) -> Result<PathBuf> {
    let path = args
        .get_one::<PathBuf>("path")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    std::path::absolute(&path)
        .map(|p| klarity_core::paths::normalize(&p))
        .with_context(|| format!("invalid project path {}", path.display()))
}

fn load_site_config(project_root: &Path, overrides: &CliOverrides) -> Result<Config> {
    let config_file = project_root.join(CONFIG_FILE);
    if !config_file.is_file() {
        bail!(
            "no {CONFIG_FILE} found in {}, run `klarity init` to create a project",
            project_root.display()
        );
    }

    let mut builder = ConfigBuilder::builder()
        .add_source(ConfigBuilder::try_from(&Config::default())?)
        .add_source(File::from(config_file.as_path()).format(FileFormat::Toml))
        .add_source(
            Environment::with_prefix("KLARITY")
                .prefix_separator("_")
                .separator("__") // Use double underscore for nested keys
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("doc_dirs"),
        );

    if let Some(port) = overrides.port {
        builder = builder.set_override("dev.port", i64::from(port))?;
    }

    let site: Config = builder
        .build()
        .and_then(|config| config.try_deserialize())
        .with_context(|| format!("invalid configuration in {}", config_file.display()))?;
    Ok(site)
}
