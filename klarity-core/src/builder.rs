use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;

use crate::assets;
use crate::config::Config;
use crate::markdown::{MarkdownRenderer, RenderError, Renderer};
use crate::nav::NavTree;
use crate::paths;
use crate::resolver::{RenderContext, SiteLinkResolver};
use crate::scanner::{ScanError, SiteScanner};
use crate::search::{self, SearchError};
use crate::site::{Document, RenderedDocument};
use crate::template::{EDITOR_TEMPLATE, LAYOUT_TEMPLATE, PageData, TemplateError, TemplateRenderer};

/// Directory inside the output that receives raw sources for the editor.
pub const RAW_SOURCE_DIR: &str = "_klarity_raw";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no entry document configured")]
    MissingEntry,
    #[error("could not resolve project path {}: {source}", path.display())]
    InvalidProject {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("refusing to clear output directory {}: it contains the project or its sources", .0.display())]
    UnsafeOutputDir(PathBuf),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render {}: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },
    #[error("{} and {} both map to {}", first.display(), second.display(), out.display())]
    OutputCollision {
        first: PathBuf,
        second: PathBuf,
        out: PathBuf,
    },
    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Stages of one build pass, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Collecting,
    Rendering,
    PlanningOutput,
    Writing,
    FinalizingAssets,
    Indexing,
    Done,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::Collecting => "collecting",
            BuildStage::Rendering => "rendering",
            BuildStage::PlanningOutput => "planning-output",
            BuildStage::Writing => "writing",
            BuildStage::FinalizingAssets => "finalizing-assets",
            BuildStage::Indexing => "indexing",
            BuildStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Run Pagefind after the site is written.
    pub search: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { search: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub output_dir: PathBuf,
    pub pages: usize,
    pub search_indexed: bool,
}

struct PlannedPage {
    rendered: RenderedDocument,
    out_path: PathBuf,
    url: String,
    title: String,
}

pub struct SiteBuilder {
    project_root: PathBuf,
    config: Config,
    options: BuildOptions,
    renderer: Option<Box<dyn Renderer>>,
}

impl SiteBuilder {
    pub fn new<P: AsRef<Path>>(project_root: P, config: Config) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            config,
            options: BuildOptions::default(),
            renderer: None,
        }
    }

    pub fn options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the built-in markdown renderer.
    pub fn renderer<R: Renderer + 'static>(mut self, renderer: R) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn build(self) -> Result<Site, BuildError> {
        let project_root = absolute_project_root(&self.project_root)?;
        let renderer = self
            .renderer
            .unwrap_or_else(|| Box::new(MarkdownRenderer::with_theme(&self.config.visual.theme)));
        let resolver = SiteLinkResolver::from_config(&project_root, &self.config);
        let output_dir = paths::normalize(&self.config.output_path(&project_root));

        Ok(Site {
            project_root,
            output_dir,
            config: self.config,
            options: self.options,
            renderer,
            resolver,
            templates: TemplateRenderer::builtin()?,
        })
    }
}

/// A configured project, ready to run build passes.
pub struct Site {
    project_root: PathBuf,
    output_dir: PathBuf,
    config: Config,
    options: BuildOptions,
    renderer: Box<dyn Renderer>,
    resolver: SiteLinkResolver,
    templates: TemplateRenderer,
}

impl Site {
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run one complete build pass. The output directory is rebuilt from
    /// scratch every time.
    pub fn render_all(&self) -> Result<BuildReport, BuildError> {
        let started = Instant::now();

        enter(BuildStage::Collecting);
        let documents = self.collect()?;

        enter(BuildStage::Rendering);
        let rendered = self.render_documents(documents)?;

        enter(BuildStage::PlanningOutput);
        let documents: Vec<Document> = rendered.iter().map(|r| r.document.clone()).collect();
        let nav_tree = NavTree::build(&self.project_root, &documents, &self.config.doc_dirs, &self.config.title);
        let planned = plan_output(rendered, &self.config.title)?;
        let favicons = assets::find_favicons(&self.project_root).map_err(|source| BuildError::Read {
            path: self.project_root.clone(),
            source,
        })?;
        let favicon = assets::select_favicon(&favicons);

        enter(BuildStage::Writing);
        self.prepare_output_dir()?;
        if self.config.editor.enable {
            self.write_editor(&documents)?;
        }
        for page in &planned {
            self.write_page(page, &nav_tree, favicon)?;
        }

        enter(BuildStage::FinalizingAssets);
        self.write_assets(favicon)?;

        let search_indexed = if self.options.search {
            enter(BuildStage::Indexing);
            self.index()
        } else {
            false
        };

        enter(BuildStage::Done);
        tracing::info!(
            pages = planned.len(),
            output = %self.output_dir.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Site built"
        );

        Ok(BuildReport {
            output_dir: self.output_dir.clone(),
            pages: planned.len(),
            search_indexed,
        })
    }

    fn collect(&self) -> Result<Vec<Document>, BuildError> {
        let entry = self.config.entry_path(&self.project_root).ok_or(BuildError::MissingEntry)?;
        let scanner =
            SiteScanner::new(&self.project_root, &self.config.doc_dirs, Some(entry.clone())).exclude(&self.output_dir);
        let documents = scanner.scan()?;

        if !documents.iter().any(|d| d.is_entry) {
            tracing::warn!(entry = %entry.display(), "Entry document is not inside any document root; no index.html will be written");
        }
        Ok(documents)
    }

    /// Render every document, one at a time, each with a context naming only
    /// itself.
    fn render_documents(&self, documents: Vec<Document>) -> Result<Vec<RenderedDocument>, BuildError> {
        let mut rendered = Vec::with_capacity(documents.len());
        for document in documents {
            let source = std::fs::read(&document.absolute_path).map_err(|source| BuildError::Read {
                path: document.absolute_path.clone(),
                source,
            })?;

            let html_body = {
                let context = RenderContext::for_document(&document);
                self.renderer.render(&source, &context, &self.resolver)
            }
            .map_err(|source| BuildError::Render {
                path: document.absolute_path.clone(),
                source,
            })?;

            tracing::debug!(path = %document.root_relative_path.display(), "Rendered document");
            rendered.push(RenderedDocument { document, html_body });
        }
        Ok(rendered)
    }

    fn prepare_output_dir(&self) -> Result<(), BuildError> {
        clear_dir(&self.output_dir, &self.project_root, &self.config.doc_roots(&self.project_root))?;
        std::fs::create_dir_all(&self.output_dir).map_err(|source| BuildError::Write {
            path: self.output_dir.clone(),
            source,
        })
    }

    fn write_page(&self, page: &PlannedPage, nav_tree: &NavTree, favicon: Option<&Path>) -> Result<(), BuildError> {
        let scoped = nav_tree.scoped(&page.url);
        let base_url = self.config.normalized_base_url();
        let source_path = page.rendered.document.root_relative_path.to_string_lossy().replace('\\', "/");
        let (favicon_path, favicon_ext) = favicon_names(favicon);
        let custom_css = file_name(Path::new(&self.config.visual.custom_css));

        let data = PageData {
            title: &page.title,
            site_title: &self.config.title,
            content: &page.rendered.html_body,
            base_url: &base_url,
            favicon_path: &favicon_path,
            favicon_ext: &favicon_ext,
            custom_css: &custom_css,
            has_vars: !self.config.visual.vars.is_empty(),
            spa: self.config.visual.spa,
            nav_tree: &scoped,
            current: &page.url,
            editor_enabled: self.config.editor.enable,
            source_path: &source_path,
        };

        let out = self.output_dir.join(&page.out_path);
        self.templates.render_to_file(LAYOUT_TEMPLATE, &data, &out)?;
        Ok(())
    }

    fn write_editor(&self, documents: &[Document]) -> Result<(), BuildError> {
        let raw_dir = self.output_dir.join(RAW_SOURCE_DIR);
        for document in documents {
            let dest = raw_dir.join(&document.root_relative_path);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|source| BuildError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            std::fs::copy(&document.absolute_path, &dest).map_err(|source| BuildError::Write { path: dest, source })?;
        }

        #[derive(serde::Serialize)]
        struct EditorData<'a> {
            base_url: &'a str,
            site_title: &'a str,
        }
        let base_url = self.config.normalized_base_url();
        let data = EditorData {
            base_url: &base_url,
            site_title: &self.config.title,
        };
        self.templates
            .render_to_file(EDITOR_TEMPLATE, &data, &self.output_dir.join(EDITOR_TEMPLATE))?;
        Ok(())
    }

    fn write_assets(&self, favicon: Option<&Path>) -> Result<(), BuildError> {
        let out = &self.output_dir;

        assets::write_stylesheet(out).map_err(write_error(out.join("style.css")))?;
        assets::write_ignore_marker(out, self.config.ignore_out).map_err(write_error(out.join(".gitignore")))?;
        assets::write_vars(&self.config.visual.vars, out).map_err(write_error(out.join("vars.css")))?;

        if let Some(favicon) = favicon {
            assets::copy_into(favicon, out).map_err(write_error(favicon.to_path_buf()))?;
        }

        if !self.config.visual.custom_css.is_empty() {
            let custom = paths::normalize(&self.project_root.join(&self.config.visual.custom_css));
            assets::copy_into(&custom, out).map_err(write_error(custom.clone()))?;
        }
        Ok(())
    }

    /// Returns whether search is available for this build.
    fn index(&self) -> bool {
        match search::generate(&self.output_dir, &self.config.normalized_base_url(), &self.templates) {
            Ok(pages) => {
                tracing::info!(pages, "Pagefind search index generated");
                true
            }
            Err(SearchError::NotInstalled) => {
                tracing::warn!("pagefind nor npx could be found in PATH, skipping search index generation");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Search index generation failed (search will be disabled)");
                false
            }
        }
    }
}

/// Build the project once with the built-in renderer.
pub fn build_site<P: AsRef<Path>>(project_root: P, config: &Config, options: &BuildOptions) -> Result<BuildReport, BuildError> {
    SiteBuilder::new(project_root, config.clone())
        .options(options.clone())
        .build()?
        .render_all()
}

/// Remove the project's build output. Returns the directory that was cleared.
pub fn clean_output<P: AsRef<Path>>(project_root: P, config: &Config) -> Result<PathBuf, BuildError> {
    let project_root = absolute_project_root(project_root.as_ref())?;
    let output_dir = paths::normalize(&config.output_path(&project_root));
    clear_dir(&output_dir, &project_root, &config.doc_roots(&project_root))?;
    Ok(output_dir)
}

fn write_error(path: PathBuf) -> impl FnOnce(std::io::Error) -> BuildError {
    move |source| BuildError::Write { path, source }
}

fn enter(stage: BuildStage) {
    tracing::debug!(%stage, "Build stage");
}

fn absolute_project_root(path: &Path) -> Result<PathBuf, BuildError> {
    std::path::absolute(path)
        .map(|p| paths::normalize(&p))
        .map_err(|source| BuildError::InvalidProject {
            path: path.to_path_buf(),
            source,
        })
}

fn clear_dir(output_dir: &Path, project_root: &Path, doc_roots: &[PathBuf]) -> Result<(), BuildError> {
    if project_root.starts_with(output_dir) || doc_roots.iter().any(|root| root.starts_with(output_dir)) {
        return Err(BuildError::UnsafeOutputDir(output_dir.to_path_buf()));
    }
    match std::fs::remove_dir_all(output_dir) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(BuildError::Write {
            path: output_dir.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}

fn plan_output(rendered: Vec<RenderedDocument>, site_title: &str) -> Result<Vec<PlannedPage>, BuildError> {
    let mut planned: Vec<PlannedPage> = Vec::with_capacity(rendered.len());
    for rendered in rendered {
        let document = &rendered.document;
        let out_path = document.out_path();
        if let Some(existing) = planned.iter().find(|p| p.out_path == out_path) {
            return Err(BuildError::OutputCollision {
                first: existing.rendered.document.absolute_path.clone(),
                second: document.absolute_path.clone(),
                out: out_path,
            });
        }

        planned.push(PlannedPage {
            url: document.url(),
            title: document.title(site_title),
            out_path,
            rendered,
        });
    }
    Ok(planned)
}

fn favicon_names(favicon: Option<&Path>) -> (String, String) {
    let Some(favicon) = favicon else {
        return (String::new(), String::new());
    };
    let ext = favicon
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    (file_name(favicon), ext)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
