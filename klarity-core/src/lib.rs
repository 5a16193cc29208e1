pub mod assets;
pub mod builder;
pub mod config;
pub mod markdown;
pub mod nav;
pub mod paths;
pub mod resolver;
pub mod scanner;
pub mod search;
pub mod site;
pub mod template;

// Re-export main types
pub use builder::{BuildError, BuildOptions, BuildReport, BuildStage, Site, SiteBuilder, build_site, clean_output};
pub use config::{CONFIG_FILE, Config, ConfigError};
pub use markdown::{MarkdownRenderer, RenderError, Renderer};
pub use nav::{NavFolder, NavPage, NavTree};
pub use resolver::{LinkResolver, RenderContext, SiteLinkResolver};
pub use scanner::{ScanError, SiteScanner};
pub use site::{Document, RenderedDocument};
pub use template::{TemplateError, TemplateRenderer};
