//! Static files emitted next to the rendered pages.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::VarsConfig;

pub const STYLESHEET: &str = include_str!("../assets/style.css");

/// Favicon extensions in order of preference.
pub const FAVICON_EXTENSIONS: [&str; 6] = ["ico", "png", "svg", "gif", "apng", "jpg"];

const IGNORE_MARKER: &str = "# THIS FILE IS AUTOMATICALLY GENERATED, DO NOT MODIFY!

# This file has been automatically generated by Klarity to ignore its build output
*
";

/// All `favicon.<ext>` files in the project root, in preference order.
pub fn find_favicons(project_root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for ext in FAVICON_EXTENSIONS {
        let path = project_root.join(format!("favicon.{ext}"));
        match std::fs::metadata(&path) {
            Ok(_) => found.push(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(found)
}

/// Pick the favicon to publish: the first candidate, with a warning when
/// there is more than one.
pub fn select_favicon(candidates: &[PathBuf]) -> Option<&Path> {
    if candidates.len() > 1 {
        tracing::warn!(
            favicons = ?candidates,
            chosen = %candidates[0].display(),
            "Multiple favicons detected with different extensions"
        );
    }
    candidates.first().map(PathBuf::as_path)
}

/// `:root` block for the explicitly set variables, or `None` when nothing is
/// overridden.
pub fn vars_css(vars: &VarsConfig) -> Option<String> {
    if vars.is_empty() {
        return None;
    }

    let mut css = String::from(":root {\n");
    for (name, value) in vars.entries() {
        if !value.is_empty() {
            let _ = writeln!(css, "  {name}: {value};");
        }
    }
    css.push_str("}\n");
    Some(css)
}

pub fn write_stylesheet(output_dir: &Path) -> io::Result<()> {
    std::fs::write(output_dir.join("style.css"), STYLESHEET)
}

pub fn write_vars(vars: &VarsConfig, output_dir: &Path) -> io::Result<bool> {
    match vars_css(vars) {
        Some(css) => {
            std::fs::write(output_dir.join("vars.css"), css)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Write or remove the `.gitignore` marker that hides the build output.
pub fn write_ignore_marker(output_dir: &Path, ignore_out: bool) -> io::Result<()> {
    let path = output_dir.join(".gitignore");
    if ignore_out {
        return std::fs::write(path, IGNORE_MARKER);
    }
    match std::fs::remove_file(&path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Copy `source` into `output_dir` under its own file name.
pub fn copy_into(source: &Path, output_dir: &Path) -> io::Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let dest = output_dir.join(file_name);
    std::fs::copy(source, &dest)?;
    Ok(dest)
}
