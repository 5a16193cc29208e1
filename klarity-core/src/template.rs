use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tera::{Context, Tera, Value};
use thiserror::Error;

use crate::nav::NavTree;

pub const LAYOUT_TEMPLATE: &str = "layout.html";
pub const SEARCH_TEMPLATE: &str = "search.html";
pub const EDITOR_TEMPLATE: &str = "editor.html";

const BUILTIN_TEMPLATES: [(&str, &str); 3] = [
    (LAYOUT_TEMPLATE, include_str!("../templates/layout.html")),
    (SEARCH_TEMPLATE, include_str!("../templates/search.html")),
    (EDITOR_TEMPLATE, include_str!("../templates/editor.html")),
];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template error: {0}")]
    Tera(#[from] tera::Error),
    #[error("IO error writing {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything the layout template needs to emit one page.
#[derive(Debug, Serialize)]
pub struct PageData<'a> {
    pub title: &'a str,
    pub site_title: &'a str,
    pub content: &'a str,
    pub base_url: &'a str,
    pub favicon_path: &'a str,
    pub favicon_ext: &'a str,
    pub custom_css: &'a str,
    pub has_vars: bool,
    pub spa: bool,
    pub nav_tree: &'a NavTree,
    pub current: &'a str,
    pub editor_enabled: bool,
    pub source_path: &'a str,
}

pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Renderer loaded with the templates compiled into the binary.
    pub fn builtin() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        // Text fields use `escape`, attribute values use `attr`.
        tera.autoescape_on(vec![]);
        tera.register_filter("attr", attr_filter);
        tera.add_raw_templates(BUILTIN_TEMPLATES)?;
        Ok(Self { tera })
    }

    /// Render a template with any serializable data as its context
    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String, TemplateError> {
        let context = Context::from_serialize(data)?;
        Ok(self.tera.render(template, &context)?)
    }

    /// Render a template and write it directly to a file
    pub fn render_to_file<T: Serialize>(
        &self,
        template: &str,
        data: &T,
        output_path: &Path,
    ) -> Result<(), TemplateError> {
        let rendered = self.render(template, data)?;

        // Ensure parent directory exists
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TemplateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(output_path, rendered).map_err(|source| TemplateError::Io {
            path: output_path.to_path_buf(),
            source,
        })
    }
}

/// Escape a value for a double-quoted attribute. Unlike `escape`, slashes
/// are left alone so URLs stay readable.
fn attr_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("filter `attr` expects a string"))?;
    Ok(Value::String(html_escape::encode_double_quoted_attribute(text).into_owned()))
}
