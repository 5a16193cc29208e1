//! Optional full-text search via Pagefind.
//!
//! Indexing is run as an external process. Every failure here is reported to
//! the caller as a [`SearchError`] and treated as "search disabled" by the
//! build, never as a failed build.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::template::{EDITOR_TEMPLATE, SEARCH_TEMPLATE, TemplateError, TemplateRenderer};

pub const PAGEFIND_SUBDIR: &str = "pagefind";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("neither pagefind nor npx could be found in PATH")]
    NotInstalled,
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("pagefind exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("could not render search fragment: {0}")]
    Template(#[from] TemplateError),
    #[error("could not inject search UI into {}: {source}", path.display())]
    Inject {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Program and leading arguments used to invoke Pagefind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indexer {
    program: PathBuf,
    args: Vec<String>,
}

impl Indexer {
    /// Prefer a `pagefind` binary, fall back to `npx -y pagefind`.
    pub fn discover() -> Option<Self> {
        if let Ok(program) = which::which("pagefind") {
            return Some(Self { program, args: vec![] });
        }
        which::which("npx").ok().map(|program| Self {
            program,
            args: vec!["-y".into(), "pagefind".into()],
        })
    }

    pub fn run(&self, site_dir: &Path) -> Result<(), SearchError> {
        tracing::info!(program = %self.program.display(), "Generating Pagefind search index");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg("--site")
            .arg(site_dir)
            .args(["--output-subdir", PAGEFIND_SUBDIR])
            .stdin(Stdio::null())
            .status()
            .map_err(|source| SearchError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !status.success() {
            return Err(SearchError::Failed(status));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct SearchData {
    bundle_path: String,
}

/// Index `output_dir` and inject the search UI into its pages.
pub fn generate(output_dir: &Path, base_url: &str, templates: &TemplateRenderer) -> Result<usize, SearchError> {
    let indexer = Indexer::discover().ok_or(SearchError::NotInstalled)?;
    indexer.run(output_dir)?;
    inject_search_ui(output_dir, base_url, templates)
}

/// Insert the search fragment before `</body>` in every HTML page under
/// `output_dir` except the editor. Returns the number of pages changed.
pub fn inject_search_ui(output_dir: &Path, base_url: &str, templates: &TemplateRenderer) -> Result<usize, SearchError> {
    let search_html = templates.render(
        SEARCH_TEMPLATE,
        &SearchData {
            bundle_path: format!("{base_url}/{PAGEFIND_SUBDIR}/"),
        },
    )?;

    let mut injected = 0;
    for entry in WalkDir::new(output_dir).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().is_none_or(|ext| ext != "html")
            || path.file_name().is_some_and(|name| name == EDITOR_TEMPLATE)
        {
            continue;
        }

        let inject_err = |source| SearchError::Inject {
            path: path.to_path_buf(),
            source,
        };
        let content = std::fs::read_to_string(path).map_err(inject_err)?;
        let Some(updated) = insert_before_body_end(&content, &search_html) else {
            continue;
        };
        std::fs::write(path, updated).map_err(inject_err)?;
        injected += 1;
    }

    Ok(injected)
}

/// Insert `fragment` before the last `</body>`; `None` when there is none.
pub fn insert_before_body_end(html: &str, fragment: &str) -> Option<String> {
    let pos = html.rfind("</body>")?;
    let mut result = String::with_capacity(html.len() + fragment.len() + 1);
    result.push_str(&html[..pos]);
    result.push_str(fragment);
    result.push('\n');
    result.push_str(&html[pos..]);
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_before_body_end() {
        assert_eq!(
            insert_before_body_end("<body><p>x</p></body></html>", "<s/>").as_deref(),
            Some("<body><p>x</p><s/>\n</body></html>")
        );
        assert_eq!(insert_before_body_end("<p>fragment</p>", "<s/>"), None);
    }

    #[test]
    fn test_inject_skips_editor_and_non_html() {
        let dir = TempDir::new().unwrap();
        let page = "<html><body>page</body></html>";
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("index.html"), page).unwrap();
        std::fs::write(dir.path().join("docs/guide.html"), page).unwrap();
        std::fs::write(dir.path().join("editor.html"), page).unwrap();
        std::fs::write(dir.path().join("style.css"), "</body>").unwrap();

        let templates = TemplateRenderer::builtin().unwrap();
        let injected = inject_search_ui(dir.path(), "/base", &templates).unwrap();
        assert_eq!(injected, 2);

        let guide = std::fs::read_to_string(dir.path().join("docs/guide.html")).unwrap();
        assert!(guide.contains("/base/pagefind/pagefind-ui.js"));
        assert_eq!(std::fs::read_to_string(dir.path().join("editor.html")).unwrap(), page);
        assert_eq!(std::fs::read_to_string(dir.path().join("style.css")).unwrap(), "</body>");
    }
}
