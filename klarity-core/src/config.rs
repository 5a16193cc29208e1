use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the project configuration file, relative to the project root.
pub const CONFIG_FILE: &str = "klarity.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error in {}: {source}", path.display())]
    Parsing {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("could not serialize configuration: {0}")]
    Serializing(#[from] toml::ser::Error),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub output_dir: String,
    pub base_url: String,
    pub doc_dirs: Vec<String>,
    pub entry: String,
    pub ignore_out: bool,
    pub visual: VisualConfig,
    pub dev: DevConfig,
    pub editor: EditorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Klarity".into(),
            output_dir: "public".into(),
            base_url: "/".into(),
            doc_dirs: vec!["docs".into()],
            entry: "docs/main.md".into(),
            ignore_out: true,
            visual: VisualConfig::default(),
            dev: DevConfig::default(),
            editor: EditorConfig::default(),
        }
    }
}

impl Config {
    /// Read `klarity.toml` from the given project root.
    pub fn read<P: AsRef<Path>>(project_root: P) -> Result<Self, ConfigError> {
        let path = project_root.as_ref().join(CONFIG_FILE);
        let data = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        toml::from_str(&data).map_err(|source| ConfigError::Parsing { path, source })
    }

    /// Write a starter `klarity.toml` into the project root.
    pub fn create<P: AsRef<Path>>(project_root: P) -> Result<PathBuf, ConfigError> {
        let path = project_root.as_ref().join(CONFIG_FILE);
        let config = Config {
            title: "Hello klarity!".into(),
            ..Config::default()
        };
        let data = toml::to_string(&config)?;
        std::fs::write(&path, data).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }

    /// Base URL without a trailing slash; the bare root `/` becomes empty.
    pub fn normalized_base_url(&self) -> String {
        normalize_url(&self.base_url)
    }

    pub fn output_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.output_dir)
    }

    pub fn entry_path(&self, project_root: &Path) -> Option<PathBuf> {
        if self.entry.is_empty() {
            return None;
        }
        Some(crate::paths::normalize(&project_root.join(&self.entry)))
    }

    pub fn doc_roots(&self, project_root: &Path) -> Vec<PathBuf> {
        self.doc_dirs
            .iter()
            .map(|dir| crate::paths::normalize(&project_root.join(dir)))
            .collect()
    }

    /// The dev server always serves from the site root.
    pub fn for_dev_server(mut self) -> Self {
        self.base_url = "/".into();
        self
    }
}

pub fn normalize_url(url: &str) -> String {
    if url == "/" {
        return String::new();
    }
    url.trim_end_matches('/').to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct VisualConfig {
    pub theme: String,
    #[serde(rename = "use_spa")]
    pub spa: bool,
    pub custom_css: String,
    pub vars: VarsConfig,
}

/// CSS variable overrides. Only non-empty values end up in `vars.css`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct VarsConfig {
    pub bg_main: String,
    pub bg_panel: String,
    pub bg_hover: String,
    pub bg_active: String,
    pub border_soft: String,
    pub border_hard: String,
    pub accent_primary: String,
    pub accent_secondary: String,
    pub text_main: String,
    pub text_dim: String,
}

impl VarsConfig {
    /// `(css variable name, value)` pairs in stylesheet order.
    pub fn entries(&self) -> [(&'static str, &str); 10] {
        [
            ("--bg-main", &self.bg_main),
            ("--bg-panel", &self.bg_panel),
            ("--bg-hover", &self.bg_hover),
            ("--bg-active", &self.bg_active),
            ("--border-color-soft", &self.border_soft),
            ("--border-color-hard", &self.border_hard),
            ("--accent-primary", &self.accent_primary),
            ("--accent-secondary", &self.accent_secondary),
            ("--text-main", &self.text_main),
            ("--text-dim", &self.text_dim),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|(_, value)| value.is_empty())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DevConfig {
    pub port: u16,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self { port: DEFAULT_DEV_PORT }
    }
}

pub const DEFAULT_DEV_PORT: u16 = 5173;

impl DevConfig {
    /// Configured port if it is outside the reserved and ephemeral ranges,
    /// otherwise the default.
    pub fn effective_port(&self) -> u16 {
        if self.port > 1024 && self.port < 49151 {
            self.port
        } else {
            DEFAULT_DEV_PORT
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    #[serde(rename = "enable_editor")]
    pub enable: bool,
}
