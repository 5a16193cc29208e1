use std::path::Path;

use anyhow::Result;
use clap::{ArgMatches, Command};
use klarity_core::Config;
use klarity_core::assets::find_favicons;

use super::path_arg;
use crate::config::KlarityConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Warning,
    Error,
}

#[derive(Debug, PartialEq, Eq)]
struct Finding {
    severity: Severity,
    message: String,
}

impl Finding {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

pub fn make_subcommand() -> Command {
    Command::new("doctor")
        .about("Diagnose potential issues in a Klarity project")
        .arg(path_arg())
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = KlarityConfig::from_args(args)?;
    let findings = diagnose(&config.project_root, &config.site)?;

    for finding in &findings {
        match finding.severity {
            Severity::Warning => tracing::warn!("{}", finding.message),
            Severity::Error => tracing::error!("{}", finding.message),
        }
    }
    if findings.is_empty() {
        tracing::info!("No issues found in {}", config.project_root.display());
    }
    Ok(())
}

fn diagnose(project_root: &Path, config: &Config) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();

    if config.normalized_base_url().is_empty() {
        findings.push(Finding::warning("the base_url is not configured for distribution"));
    }

    match config.entry_path(project_root) {
        None => findings.push(Finding::error("no entry file configured")),
        Some(entry) if !entry.is_file() => {
            findings.push(Finding::error(format!("entry file {} does not exist", entry.display())));
        }
        Some(_) => {}
    }

    if config.doc_dirs.is_empty() {
        findings.push(Finding::error("no doc directories configured"));
    }
    for root in config.doc_roots(project_root) {
        if !root.is_dir() {
            findings.push(Finding::warning(format!("doc directory {} does not exist", root.display())));
        }
    }

    let favicons = find_favicons(project_root)?;
    match favicons.len() {
        0 => findings.push(Finding::warning("no favicon detected in the root of the project")),
        1 => {}
        _ => {
            let names: Vec<_> = favicons.iter().map(|path| path.display().to_string()).collect();
            findings.push(Finding::warning(format!(
                "multiple favicons detected with different extensions: {}",
                names.join(", ")
            )));
        }
    }

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_healthy_project_has_no_findings() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/main.md"), "# Home").unwrap();
        std::fs::write(dir.path().join("favicon.ico"), "ico").unwrap();
        let config = Config {
            base_url: "https://example.com/docs".into(),
            ..Config::default()
        };

        let findings = diagnose(dir.path(), &config).unwrap();
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn test_reports_every_problem() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("favicon.png"), "png").unwrap();
        std::fs::write(dir.path().join("favicon.svg"), "<svg/>").unwrap();

        let findings = diagnose(dir.path(), &Config::default()).unwrap();
        let messages: Vec<_> = findings.iter().map(|f| (f.severity, f.message.as_str())).collect();

        assert_eq!(messages.len(), 4, "{messages:?}");
        assert_eq!(messages[0], (Severity::Warning, "the base_url is not configured for distribution"));
        assert_eq!(messages[1].0, Severity::Error);
        assert!(messages[1].1.contains("main.md"));
        assert!(messages[2].1.starts_with("doc directory"));
        assert!(messages[3].1.starts_with("multiple favicons"));
    }

    #[test]
    fn test_empty_entry_and_doc_dirs() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            base_url: "https://example.com".into(),
            entry: String::new(),
            doc_dirs: vec![],
            ..Config::default()
        };

        let findings = diagnose(dir.path(), &config).unwrap();
        assert_eq!(
            findings,
            vec![
                Finding::error("no entry file configured"),
                Finding::error("no doc directories configured"),
                Finding::warning("no favicon detected in the root of the project"),
            ]
        );
    }
}
