//! Cross-document link resolution.
//!
//! Link targets are resolved relative to the directory of the document whose
//! render is in flight, so `[[x]]` means a different page in
//! `docs/api/a.md` than in `docs/b.md`. The document being rendered is
//! passed explicitly through a [`RenderContext`].

use std::path::{Path, PathBuf};

use crate::config::{Config, normalize_url};
use crate::paths;
use crate::site::Document;

/// Identity of the document currently being converted.
///
/// A context is created right before a render call and dropped right after
/// it; [`RenderContext::idle`] represents "no render in flight".
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext<'a> {
    current: Option<&'a Path>,
}

impl<'a> RenderContext<'a> {
    pub fn idle() -> Self {
        Self { current: None }
    }

    pub fn for_document(document: &'a Document) -> Self {
        Self {
            current: Some(&document.absolute_path),
        }
    }

    pub fn current(&self) -> Option<&'a Path> {
        self.current
    }
}

pub trait LinkResolver {
    /// Resolve `target` (with optional `fragment`) as linked from the
    /// document in `context`. `None` leaves the link to the renderer's
    /// default behavior.
    fn resolve(&self, target: &str, fragment: &str, context: &RenderContext<'_>) -> Option<String>;
}

pub struct SiteLinkResolver {
    project_root: PathBuf,
    doc_roots: Vec<PathBuf>,
    entry: Option<PathBuf>,
    base_url: String,
}

impl SiteLinkResolver {
    pub fn new(project_root: &Path, doc_roots: Vec<PathBuf>, entry: Option<PathBuf>, base_url: &str) -> Self {
        Self {
            project_root: paths::normalize(project_root),
            doc_roots,
            entry,
            base_url: normalize_url(base_url),
        }
    }

    pub fn from_config(project_root: &Path, config: &Config) -> Self {
        Self::new(
            project_root,
            config.doc_roots(project_root),
            config.entry_path(project_root),
            &config.base_url,
        )
    }

    fn candidate(&self, target: &str, current: &Path) -> Option<PathBuf> {
        if target.is_empty() {
            return None;
        }
        let base_dir = current.parent()?;
        let target_path = Path::new(target);
        let candidate = match target_path.extension() {
            None => base_dir.join(format!("{target}.{}", paths::MARKDOWN_EXTENSION)),
            Some(ext) if ext == paths::MARKDOWN_EXTENSION => base_dir.join(target_path),
            Some(_) => return None,
        };
        Some(paths::normalize(&candidate))
    }
}

impl LinkResolver for SiteLinkResolver {
    fn resolve(&self, target: &str, fragment: &str, context: &RenderContext<'_>) -> Option<String> {
        let current = context.current()?;
        let candidate = self.candidate(target, current)?;

        let mut dest = if self.entry.as_deref() == Some(candidate.as_path()) {
            format!("{}/index.html", self.base_url)
        } else {
            if !self.doc_roots.iter().any(|root| paths::is_within(&candidate, root)) {
                return None;
            }
            let relative = candidate.strip_prefix(&self.project_root).ok()?;
            format!("{}/{}", self.base_url, paths::html_relative(relative))
        };

        if !fragment.is_empty() {
            dest.push('#');
            dest.push_str(fragment);
        }

        Some(dest)
    }
}
