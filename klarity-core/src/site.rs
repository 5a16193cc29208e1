use std::path::{Path, PathBuf};

use crate::paths;

/// A markdown source discovered during one build pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub absolute_path: PathBuf,
    /// Path relative to the project root.
    pub root_relative_path: PathBuf,
    pub is_entry: bool,
}

impl Document {
    pub fn new(absolute_path: PathBuf, project_root: &Path, entry: Option<&Path>) -> Option<Self> {
        let absolute_path = paths::normalize(&absolute_path);
        let root_relative_path = absolute_path.strip_prefix(project_root).ok()?.to_path_buf();
        let is_entry = entry.is_some_and(|entry| entry == absolute_path);

        Some(Self {
            absolute_path,
            root_relative_path,
            is_entry,
        })
    }

    /// Output file path relative to the output directory.
    pub fn out_path(&self) -> PathBuf {
        if self.is_entry {
            return PathBuf::from("index.html");
        }
        PathBuf::from(paths::html_relative(&self.root_relative_path))
    }

    /// Site-relative URL used for navigation and active-page matching.
    pub fn url(&self) -> String {
        if self.is_entry {
            return "/".to_string();
        }
        paths::site_url(&self.root_relative_path)
    }

    /// Page title: the configured site title for the entry, the file stem
    /// otherwise.
    pub fn title(&self, site_title: &str) -> String {
        if self.is_entry {
            return site_title.to_string();
        }
        self.absolute_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub document: Document,
    pub html_body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, entry: &str) -> Document {
        let entry = PathBuf::from(entry);
        Document::new(PathBuf::from(path), Path::new("/project"), Some(&entry)).unwrap()
    }

    #[test]
    fn test_entry_maps_to_index_regardless_of_location() {
        let d = doc("/project/docs/deep/main.md", "/project/docs/deep/main.md");
        assert!(d.is_entry);
        assert_eq!(d.out_path(), PathBuf::from("index.html"));
        assert_eq!(d.url(), "/");
        assert_eq!(d.title("Home"), "Home");
    }

    #[test]
    fn test_regular_document_mirrors_tree() {
        let d = doc("/project/docs/api/ref.md", "/project/docs/main.md");
        assert!(!d.is_entry);
        assert_eq!(d.root_relative_path, PathBuf::from("docs/api/ref.md"));
        assert_eq!(d.out_path(), PathBuf::from("docs/api/ref.html"));
        assert_eq!(d.url(), "/docs/api/ref.html");
        assert_eq!(d.title("Home"), "ref");
    }

    #[test]
    fn test_document_outside_project_is_rejected() {
        assert!(Document::new(PathBuf::from("/elsewhere/a.md"), Path::new("/project"), None).is_none());
    }
}
