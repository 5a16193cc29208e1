use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::paths;
use crate::site::Document;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("document root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),
    #[error("could not read {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("document is outside the project root: {}", .0.display())]
    OutsideProject(PathBuf),
}

/// Discovers the markdown documents under a project's document roots.
pub struct SiteScanner {
    project_root: PathBuf,
    doc_dirs: Vec<String>,
    entry: Option<PathBuf>,
    excluded: Vec<PathBuf>,
}

impl SiteScanner {
    pub fn new<P: AsRef<Path>>(project_root: P, doc_dirs: &[String], entry: Option<PathBuf>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            doc_dirs: doc_dirs.to_vec(),
            entry,
            excluded: Vec::new(),
        }
    }

    /// Skip everything under `dir`, e.g. an output directory that sits inside
    /// a doc root.
    pub fn exclude<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.excluded.push(paths::normalize(dir.as_ref()));
        self
    }

    /// Walk every configured root. The result is sorted by path; a missing or
    /// unreadable root aborts the scan.
    pub fn scan(&self) -> Result<Vec<Document>, ScanError> {
        let mut documents = Vec::new();

        for dir in &self.doc_dirs {
            let root = paths::normalize(&self.project_root.join(dir));
            if !root.is_dir() {
                return Err(ScanError::MissingRoot(root));
            }

            for path in get_all_markdown_files(&root, &self.excluded)? {
                let document = Document::new(path.clone(), &self.project_root, self.entry.as_deref())
                    .ok_or(ScanError::OutsideProject(path))?;
                tracing::debug!(path = %document.root_relative_path.display(), "Discovered document");
                documents.push(document);
            }
        }

        documents.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));
        documents.dedup_by(|a, b| a.absolute_path == b.absolute_path);

        Ok(documents)
    }
}

fn get_all_markdown_files(root: &Path, excluded: &[PathBuf]) -> Result<Vec<PathBuf>, ScanError> {
    let mut paths = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !excluded.iter().any(|dir| entry.path().starts_with(dir)));
    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && paths::is_markdown(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# x").unwrap();
    }

    #[test]
    fn test_scan_collects_markdown_recursively() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "docs/main.md");
        touch(dir.path(), "docs/api/intro.md");
        touch(dir.path(), "docs/api/deep/more.md");
        touch(dir.path(), "docs/image.png");
        touch(dir.path(), "other/skipped.md");

        let entry = dir.path().join("docs/main.md");
        let scanner = SiteScanner::new(dir.path(), &["docs".to_string()], Some(entry));
        let documents = scanner.scan().unwrap();

        let rel: Vec<_> = documents
            .iter()
            .map(|d| d.root_relative_path.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["docs/api/deep/more.md", "docs/api/intro.md", "docs/main.md"]);
        assert_eq!(documents.iter().filter(|d| d.is_entry).count(), 1);
    }

    #[test]
    fn test_overlapping_roots_do_not_duplicate() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "docs/api/intro.md");

        let scanner = SiteScanner::new(dir.path(), &["docs".to_string(), "docs/api".to_string()], None);
        assert_eq!(scanner.scan().unwrap().len(), 1);
    }

    #[test]
    fn test_excluded_directory_is_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "guide.md");
        touch(dir.path(), "public/_klarity_raw/guide.md");
        touch(dir.path(), "public/notes.md");

        let scanner = SiteScanner::new(dir.path(), &[".".to_string()], None).exclude(dir.path().join("public"));
        let documents = scanner.scan().unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].root_relative_path, PathBuf::from("guide.md"));
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let scanner = SiteScanner::new(dir.path(), &["nope".to_string()], None);
        assert!(matches!(scanner.scan(), Err(ScanError::MissingRoot(_))));
    }
}
