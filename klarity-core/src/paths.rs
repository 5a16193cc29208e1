//! Path helpers shared by link resolution, navigation and output planning.
//!
//! Every site URL in Klarity is derived by [`site_url`], so the link
//! resolver, the nav tree and the written output cannot disagree on where a
//! document lives.

use std::path::{Component, Path, PathBuf};

pub const MARKDOWN_EXTENSION: &str = "md";

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. Symlinks are not consulted.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

/// `true` when `path` lives strictly beneath `dir`. Comparison is done per
/// component, so `docs` never contains `docs-extra/a.md`.
pub fn is_within(path: &Path, dir: &Path) -> bool {
    path != dir && path.starts_with(dir)
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == MARKDOWN_EXTENSION)
}

/// Swap the markdown extension for `.html` and render with `/` separators.
pub fn html_relative(relative: &Path) -> String {
    let html = relative.with_extension("html");
    html.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Site-relative URL (without base URL) for a project-root-relative path.
pub fn site_url(relative: &Path) -> String {
    format!("/{}", html_relative(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d.md")), PathBuf::from("/a/c/d.md"));
        assert_eq!(normalize(Path::new("/a/./b")), PathBuf::from("/a/b"));
        assert_eq!(normalize(Path::new("/a/b/../../..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_is_within_is_component_wise() {
        let docs = Path::new("/project/docs");
        assert!(is_within(Path::new("/project/docs/a.md"), docs));
        assert!(is_within(Path::new("/project/docs/api/a.md"), docs));
        assert!(!is_within(Path::new("/project/docs-extra/a.md"), docs));
        assert!(!is_within(docs, docs));
    }

    #[test]
    fn test_site_url() {
        assert_eq!(site_url(Path::new("docs/guide.md")), "/docs/guide.html");
        assert_eq!(site_url(Path::new("docs/api/ref.md")), "/docs/api/ref.html");
    }

    #[test]
    fn test_is_markdown() {
        assert!(is_markdown(Path::new("a/b.md")));
        assert!(!is_markdown(Path::new("a/b.markdown")));
        assert!(!is_markdown(Path::new("a/b")));
    }
}
