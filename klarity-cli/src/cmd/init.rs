use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgMatches, Command};
use klarity_core::paths::{is_markdown, is_within};
use klarity_core::{CONFIG_FILE, Config};
use walkdir::WalkDir;

use super::{confirm, path_arg};
use crate::config::project_path;

const STARTER_PAGE: &str = "# Welcome to Klarity!

Start writing your docs here.

```rust
fn main() {
    println!(\"Hello Klarity!\");
}
```
";

#[derive(Debug, PartialEq, Eq)]
enum ProjectState {
    /// Missing or empty directory.
    Fresh,
    NotEmpty,
    /// A config file plus at least one document.
    Existing,
}

pub fn make_subcommand() -> Command {
    Command::new("init")
        .about("Initialize a new Klarity project for writing docs")
        .arg(path_arg().help("The directory where the Klarity project should be initialized"))
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let path = project_path(args)?;

    match project_state(&path) {
        ProjectState::Existing => {
            let prompt = format!(
                "A Klarity project already exists at '{}'. Do you want to reinitialize it? (not recommended, hard deletes files).",
                path.display()
            );
            if !confirm(&prompt)? {
                println!("Initialization cancelled.");
                return Ok(());
            }
            reset(&path)?;
        }
        ProjectState::NotEmpty => {
            let prompt = format!(
                "The directory '{}' is not empty. Do you want to proceed with initialization? (will mix files).",
                path.display()
            );
            if !confirm(&prompt)? {
                println!("Initialization cancelled.");
                return Ok(());
            }
        }
        ProjectState::Fresh => {}
    }

    let entry = initialize(&path)?;
    let name = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    println!(
        "A Klarity project has been successfully created\n\nGet started by running:\n\nklarity dev {name}\n\nor editing {}",
        entry.display()
    );
    Ok(())
}

fn project_state(path: &Path) -> ProjectState {
    if !path.is_dir() {
        return ProjectState::Fresh;
    }

    let has_entries = match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_some(),
        Err(_) => true,
    };
    if !path.join(CONFIG_FILE).exists() {
        return if has_entries { ProjectState::NotEmpty } else { ProjectState::Fresh };
    }

    let Ok(config) = Config::read(path) else {
        return ProjectState::NotEmpty;
    };
    let has_documents = config.doc_roots(path).iter().any(|root| {
        WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .any(|entry| entry.file_type().is_file() && is_markdown(entry.path()))
    });

    if has_documents {
        ProjectState::Existing
    } else {
        ProjectState::NotEmpty
    }
}

/// Delete the documents and config of an existing project. Document roots
/// outside the project are left alone.
fn reset(path: &Path) -> Result<()> {
    let config = Config::read(path)?;
    for root in config.doc_roots(path) {
        if !is_within(&root, path) {
            tracing::warn!(root = %root.display(), "Not deleting document root outside the project");
            continue;
        }
        remove_if_present(std::fs::remove_dir_all(&root))
            .with_context(|| format!("could not delete {}", root.display()))?;
    }
    let config_file = path.join(CONFIG_FILE);
    remove_if_present(std::fs::remove_file(&config_file))
        .with_context(|| format!("could not delete {}", config_file.display()))?;
    Ok(())
}

fn remove_if_present(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Write the starter config and entry page. Returns the entry page path.
fn initialize(path: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(path).with_context(|| format!("could not create {}", path.display()))?;
    Config::create(path)?;

    let docs = path.join("docs");
    std::fs::create_dir_all(&docs).with_context(|| format!("could not create {}", docs.display()))?;
    let entry = docs.join("main.md");
    std::fs::write(&entry, STARTER_PAGE).with_context(|| format!("could not write {}", entry.display()))?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_state() {
        let dir = TempDir::new().unwrap();
        assert_eq!(project_state(&dir.path().join("missing")), ProjectState::Fresh);
        assert_eq!(project_state(dir.path()), ProjectState::Fresh);

        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        assert_eq!(project_state(dir.path()), ProjectState::NotEmpty);

        initialize(dir.path()).unwrap();
        assert_eq!(project_state(dir.path()), ProjectState::Existing);
    }

    #[test]
    fn test_config_without_documents_is_not_a_project() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path()).unwrap();
        assert_eq!(project_state(dir.path()), ProjectState::NotEmpty);
    }

    #[test]
    fn test_initialize_creates_buildable_project() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("handbook");

        let entry = initialize(&root).unwrap();
        assert_eq!(entry, root.join("docs/main.md"));

        let config = Config::read(&root).unwrap();
        assert_eq!(config.title, "Hello klarity!");
        assert_eq!(config.entry_path(&root), Some(klarity_core::paths::normalize(&entry)));
        assert!(std::fs::read_to_string(&entry).unwrap().starts_with("# Welcome to Klarity!"));
    }

    #[test]
    fn test_reset_removes_docs_and_config() {
        let dir = TempDir::new().unwrap();
        initialize(dir.path()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "kept").unwrap();

        reset(dir.path()).unwrap();
        assert!(!dir.path().join("docs").exists());
        assert!(!dir.path().join(CONFIG_FILE).exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
