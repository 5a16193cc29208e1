use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::paths;
use crate::site::Document;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavPage {
    pub title: String,
    pub url: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavFolder {
    /// Empty for the top-level group.
    pub label: String,
    pub pages: Vec<NavPage>,
    pub open: bool,
}

/// Sidebar navigation for a whole document set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NavTree {
    folders: Vec<NavFolder>,
}

impl NavTree {
    /// Group `documents` into folders.
    ///
    /// The entry document is always placed first in the top-level group as
    /// `site_title -> "/"`. Other documents are grouped by the first path
    /// segment beneath the document root that contains them; documents in no
    /// root are left out of the tree.
    pub fn build(root: &Path, documents: &[Document], doc_dirs: &[String], site_title: &str) -> Self {
        let doc_roots: Vec<PathBuf> = doc_dirs
            .iter()
            .map(|dir| paths::normalize(&root.join(dir)))
            .collect();

        let mut entry_page = None;
        let mut groups: BTreeMap<String, Vec<NavPage>> = BTreeMap::new();

        for document in documents {
            if document.is_entry {
                entry_page = Some(NavPage {
                    title: site_title.to_string(),
                    url: "/".to_string(),
                    active: false,
                });
                continue;
            }

            let Some(relative) = doc_roots
                .iter()
                .find(|dir| paths::is_within(&document.absolute_path, dir))
                .and_then(|dir| document.absolute_path.strip_prefix(dir).ok())
            else {
                continue;
            };

            groups.entry(folder_label(relative)).or_default().push(NavPage {
                title: document.title(site_title),
                url: document.url(),
                active: false,
            });
        }

        for pages in groups.values_mut() {
            pages.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.url.cmp(&b.url)));
        }

        if let Some(entry) = entry_page {
            groups.entry(String::new()).or_default().insert(0, entry);
        }

        // BTreeMap iteration puts the unlabeled "" group first.
        let folders = groups
            .into_iter()
            .map(|(label, pages)| NavFolder {
                open: label.is_empty(),
                label,
                pages,
            })
            .collect();

        Self { folders }
    }

    pub fn folders(&self) -> &[NavFolder] {
        &self.folders
    }

    /// Copy of the tree with `active`/`open` flags computed for the page
    /// served at `current_url`.
    pub fn scoped(&self, current_url: &str) -> Self {
        let folders = self
            .folders
            .iter()
            .map(|folder| {
                let pages: Vec<NavPage> = folder
                    .pages
                    .iter()
                    .map(|page| NavPage {
                        active: page.url == current_url,
                        ..page.clone()
                    })
                    .collect();
                NavFolder {
                    open: folder.label.is_empty() || pages.iter().any(|p| p.active),
                    label: folder.label.clone(),
                    pages,
                }
            })
            .collect();

        Self { folders }
    }
}

fn folder_label(relative: &Path) -> String {
    let mut components = relative.components().filter_map(|c| match c {
        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
        _ => None,
    });
    let first = components.next().unwrap_or_default();
    if components.next().is_some() {
        first
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROOT: &str = "/project";

    fn docs(paths: &[&str], entry: &str) -> Vec<Document> {
        let entry = PathBuf::from(ROOT).join(entry);
        paths
            .iter()
            .map(|p| Document::new(PathBuf::from(ROOT).join(p), Path::new(ROOT), Some(&entry)).unwrap())
            .collect()
    }

    fn page(title: &str, url: &str) -> NavPage {
        NavPage {
            title: title.into(),
            url: url.into(),
            active: false,
        }
    }

    #[test]
    fn test_reference_tree() {
        let documents = docs(
            &["docs/api/ref.md", "docs/guide.md", "docs/api/intro.md", "docs/main.md"],
            "docs/main.md",
        );
        let tree = NavTree::build(Path::new(ROOT), &documents, &["docs".into()], "Home");

        assert_eq!(
            tree.folders(),
            &[
                NavFolder {
                    label: String::new(),
                    pages: vec![page("Home", "/"), page("guide", "/docs/guide.html")],
                    open: true,
                },
                NavFolder {
                    label: "api".into(),
                    pages: vec![page("intro", "/docs/api/intro.html"), page("ref", "/docs/api/ref.html")],
                    open: false,
                },
            ]
        );
    }

    #[test]
    fn test_entry_is_pinned_before_alphabetical_pages() {
        let documents = docs(&["docs/aaa.md", "docs/zzz.md"], "docs/zzz.md");
        let tree = NavTree::build(Path::new(ROOT), &documents, &["docs".into()], "Welcome");
        let titles: Vec<_> = tree.folders()[0].pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Welcome", "aaa"]);
    }

    #[test]
    fn test_entry_outside_roots_still_in_tree() {
        let documents = docs(&["README.md", "docs/guide.md"], "README.md");
        let tree = NavTree::build(Path::new(ROOT), &documents, &["docs".into()], "Home");
        assert_eq!(tree.folders()[0].pages[0], page("Home", "/"));
    }

    #[test]
    fn test_prefix_sibling_root_does_not_match() {
        let documents = docs(&["docs-extra/a.md", "docs/b.md"], "docs/main.md");
        let tree = NavTree::build(Path::new(ROOT), &documents, &["docs".into()], "Home");
        assert_eq!(tree.folders().len(), 1);
        assert_eq!(tree.folders()[0].pages, vec![page("b", "/docs/b.html")]);
    }

    #[test]
    fn test_deep_nesting_collapses_into_top_folder() {
        let documents = docs(&["docs/api/v1/deep/x.md", "docs/api/y.md"], "docs/main.md");
        let tree = NavTree::build(Path::new(ROOT), &documents, &["docs".into()], "Home");
        assert_eq!(tree.folders().len(), 1);
        assert_eq!(tree.folders()[0].label, "api");
        assert_eq!(
            tree.folders()[0].pages,
            vec![page("x", "/docs/api/v1/deep/x.html"), page("y", "/docs/api/y.html")]
        );
    }

    #[test]
    fn test_folders_sorted_by_label_and_ties_by_url() {
        let documents = docs(
            &["docs/zeta/a.md", "docs/alpha/b.md", "docs/alpha/sub/b.md"],
            "docs/main.md",
        );
        let tree = NavTree::build(Path::new(ROOT), &documents, &["docs".into()], "Home");
        let labels: Vec<_> = tree.folders().iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["alpha", "zeta"]);
        assert_eq!(
            tree.folders()[0].pages,
            vec![page("b", "/docs/alpha/b.html"), page("b", "/docs/alpha/sub/b.html")]
        );
    }

    #[test]
    fn test_scoped_marks_active_page_and_open_folder() {
        let documents = docs(
            &["docs/main.md", "docs/guide.md", "docs/api/intro.md", "docs/api/ref.md"],
            "docs/main.md",
        );
        let tree = NavTree::build(Path::new(ROOT), &documents, &["docs".into()], "Home");

        let scoped = tree.scoped("/docs/api/ref.html");
        assert!(scoped.folders()[0].open);
        assert!(scoped.folders()[1].open);
        assert!(scoped.folders()[1].pages[1].active);
        assert_eq!(
            scoped.folders().iter().flat_map(|f| &f.pages).filter(|p| p.active).count(),
            1
        );

        let rescoped = scoped.scoped("/");
        assert!(rescoped.folders()[0].pages[0].active);
        assert!(!rescoped.folders()[1].open);
        assert!(rescoped.folders()[1].pages.iter().all(|p| !p.active));
    }
}
