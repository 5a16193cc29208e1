use std::collections::HashMap;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, html};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;
use thiserror::Error;

use crate::resolver::{LinkResolver, RenderContext};

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

pub const DEFAULT_THEME: &str = "base16-ocean.dark";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("document is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Converts one document's source into an HTML fragment.
///
/// Implementations consult `resolver` with the given `context` for every
/// cross-document link they encounter.
pub trait Renderer {
    fn render(
        &self,
        source: &[u8],
        context: &RenderContext<'_>,
        resolver: &dyn LinkResolver,
    ) -> Result<String, RenderError>;
}

pub struct MarkdownRenderer {
    theme: String,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl MarkdownRenderer {
    /// Use the named highlighting theme, falling back to the default when the
    /// name is empty or unknown.
    pub fn with_theme(theme: &str) -> Self {
        if theme.is_empty() {
            return Self::default();
        }
        if !is_valid_theme(theme) {
            tracing::warn!(theme, fallback = DEFAULT_THEME, "Unknown highlighting theme");
            return Self::default();
        }
        Self {
            theme: theme.to_string(),
        }
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    fn highlight(&self, lang: &str, code: &str) -> String {
        let syntax = SYNTAX_SET.find_syntax_by_token(lang).or_else(|| {
            // Fallback mappings for unsupported languages
            match lang {
                "nix" => SYNTAX_SET.find_syntax_by_name("JavaScript"),
                "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
                _ => None,
            }
        });

        match syntax {
            Some(syntax) => {
                let theme = &THEME_SET.themes[&self.theme];
                highlighted_or_plain(lang, code, highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme))
            }
            None => plain_code_block(code),
        }
    }
}

impl Renderer for MarkdownRenderer {
    fn render(
        &self,
        source: &[u8],
        context: &RenderContext<'_>,
        resolver: &dyn LinkResolver,
    ) -> Result<String, RenderError> {
        let content = std::str::from_utf8(source)?;
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_MATH
            | Options::ENABLE_GFM
            | Options::ENABLE_WIKILINKS;
        let events: Vec<Event> = Parser::new_ext(content, options).collect();

        let mut processed_events = Vec::with_capacity(events.len());
        let mut heading_ids = HeadingIds::default();
        let mut i = 0;

        while i < events.len() {
            match &events[i] {
                Event::Start(Tag::CodeBlock(kind)) => {
                    // Collect all text events until the end of the code block
                    let mut code_content = String::new();
                    i += 1;
                    while i < events.len() {
                        match &events[i] {
                            Event::End(TagEnd::CodeBlock) => break,
                            Event::Text(text) => code_content.push_str(text),
                            _ => {}
                        }
                        i += 1;
                    }

                    let html = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                            let lang = lang.split_whitespace().next().unwrap_or_default();
                            self.highlight(lang, &code_content)
                        }
                        _ => plain_code_block(&code_content),
                    };
                    processed_events.push(Event::Html(html.into()));
                }
                Event::Start(Tag::Heading {
                    level,
                    id: None,
                    classes,
                    attrs,
                }) => {
                    let text = heading_text(&events[i + 1..]);
                    processed_events.push(Event::Start(Tag::Heading {
                        level: *level,
                        id: Some(heading_ids.assign(&text).into()),
                        classes: classes.clone(),
                        attrs: attrs.clone(),
                    }));
                }
                Event::Start(Tag::Link {
                    link_type: link_type @ LinkType::WikiLink { .. },
                    dest_url,
                    title,
                    id,
                }) => {
                    let (target, fragment) = dest_url.split_once('#').unwrap_or((&**dest_url, ""));
                    let dest_url = match resolver.resolve(target, fragment, context) {
                        Some(url) => CowStr::from(url),
                        None => dest_url.clone(),
                    };
                    processed_events.push(Event::Start(Tag::Link {
                        link_type: *link_type,
                        dest_url,
                        title: title.clone(),
                        id: id.clone(),
                    }));
                }
                event => processed_events.push(event.clone()),
            }
            i += 1;
        }

        let mut out = String::new();
        html::push_html(&mut out, processed_events.into_iter());

        Ok(out)
    }
}

pub fn is_valid_theme(name: &str) -> bool {
    THEME_SET.themes.contains_key(name)
}

/// A highlighting failure only costs the block its colors.
fn highlighted_or_plain(lang: &str, code: &str, highlighted: Result<String, syntect::Error>) -> String {
    highlighted.unwrap_or_else(|e| {
        tracing::warn!(lang, "Could not highlight code block, rendering it plain: {e}");
        plain_code_block(code)
    })
}

fn plain_code_block(code: &str) -> String {
    format!("<pre><code>{}</code></pre>\n", html_escape::encode_text(code))
}

fn heading_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

/// Hands out unique, slugified heading anchors within one document.
#[derive(Default)]
struct HeadingIds {
    seen: HashMap<String, usize>,
}

impl HeadingIds {
    fn assign(&mut self, text: &str) -> String {
        let base = slugify(text);
        let base = if base.is_empty() { "heading".to_string() } else { base };
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}-{}", *count - 1)
        }
    }
}

pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SiteLinkResolver;
    use crate::site::Document;
    use std::path::{Path, PathBuf};

    fn resolver() -> SiteLinkResolver {
        SiteLinkResolver::new(
            Path::new("/project"),
            vec![PathBuf::from("/project/docs")],
            Some(PathBuf::from("/project/docs/main.md")),
            "/",
        )
    }

    fn render(source: &str, path: &str) -> String {
        let document = Document::new(PathBuf::from(path), Path::new("/project"), None).unwrap();
        MarkdownRenderer::default()
            .render(source.as_bytes(), &RenderContext::for_document(&document), &resolver())
            .unwrap()
    }

    #[test]
    fn test_wikilinks_resolve_against_current_document() {
        let html = render("See [[intro]] and [[../main|home]].", "/project/docs/api/a.md");
        assert!(html.contains(r#"href="/docs/api/intro.html""#), "{html}");
        assert!(html.contains(r#"href="/index.html""#), "{html}");
        assert!(html.contains(">home</a>"), "{html}");
    }

    #[test]
    fn test_wikilink_fragment_is_kept() {
        let html = render("[[guide#setup]]", "/project/docs/b.md");
        assert!(html.contains(r#"href="/docs/guide.html#setup""#), "{html}");
    }

    #[test]
    fn test_unresolved_wikilink_stays_literal() {
        let html = render("[[logo.png]]", "/project/docs/b.md");
        assert!(html.contains(r#"href="logo.png""#), "{html}");
    }

    #[test]
    fn test_idle_context_does_not_resolve() {
        let html = MarkdownRenderer::default()
            .render(b"[[guide]]", &RenderContext::idle(), &resolver())
            .unwrap();
        assert!(html.contains(r#"href="guide""#), "{html}");
    }

    #[test]
    fn test_code_blocks() {
        let html = render("```rust\nfn main() {}\n```\n\n```\n<b>\n```", "/project/docs/b.md");
        assert!(html.contains("<pre style="), "{html}");
        assert!(html.contains("&lt;b&gt;"), "{html}");
    }

    #[test]
    fn test_highlight_error_falls_back_to_plain_block() {
        let html = highlighted_or_plain("rust", "a < b", Err(syntect::Error::Fmt(std::fmt::Error)));
        assert_eq!(html, "<pre><code>a &lt; b</code></pre>\n");

        let html = highlighted_or_plain("rust", "a < b", Ok("<pre>colored</pre>".into()));
        assert_eq!(html, "<pre>colored</pre>");
    }

    #[test]
    fn test_heading_ids_are_unique() {
        let html = render("# Getting Started\n\n## Setup\n\n## Setup", "/project/docs/b.md");
        assert!(html.contains(r#"<h1 id="getting-started">"#), "{html}");
        assert!(html.contains(r#"<h2 id="setup">"#), "{html}");
        assert!(html.contains(r#"<h2 id="setup-1">"#), "{html}");
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let result = MarkdownRenderer::default().render(&[0xff, 0xfe], &RenderContext::idle(), &resolver());
        assert!(matches!(result, Err(RenderError::InvalidUtf8(_))));
    }

    #[test]
    fn test_theme_fallback() {
        assert_eq!(MarkdownRenderer::with_theme("no-such-theme").theme(), DEFAULT_THEME);
        assert_eq!(MarkdownRenderer::with_theme("InspiredGitHub").theme(), "InspiredGitHub");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  API  reference_v2 "), "api-reference-v2");
    }
}
