//! Output Path Resolution
//!
//! Turns a provider's base path, an optional configured override and a
//! fallback filename into the absolute path an artifact is written to.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Rule-file suffixes removed from the source basename, longest first.
const RULE_SUFFIXES: &[&str] = &[".ruleset.md", ".rules.md", ".rule.md", ".markdown", ".mdc", ".md"];

/// How a candidate path is classified as a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryCheck {
    /// Extension and trailing-separator heuristics only.
    Lexical,
    /// Lexical heuristics, or the path exists as a directory on disk.
    Stat,
}

/// Lexical rule: no extension, or a trailing separator.
pub fn is_directory_like(path: &str) -> bool {
    if path.ends_with('/') || path.ends_with(std::path::MAIN_SEPARATOR) {
        return true;
    }
    Path::new(path).extension().is_none()
}

/// The document's basename with rule-file suffixes removed.
pub fn rule_stem(source_path: Option<&Path>, source_id: &str) -> String {
    let basename = source_path
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_id.to_string());

    match strip_rule_suffix(&basename) {
        "" => "rules".to_string(),
        stem => stem.to_string(),
    }
}

/// Derives `<stem>.<extension>` from the document's source path or id.
pub fn fallback_filename(source_path: Option<&Path>, source_id: &str, extension: &str) -> String {
    format!(
        "{}.{}",
        rule_stem(source_path, source_id),
        extension.trim_start_matches('.')
    )
}

fn strip_rule_suffix(basename: &str) -> &str {
    let lower = basename.to_ascii_lowercase();
    for suffix in RULE_SUFFIXES {
        if lower.ends_with(suffix) && lower.len() > suffix.len() {
            return &basename[..basename.len() - suffix.len()];
        }
    }
    basename
}

/// Resolves the final artifact path.
///
/// A relative override is resolved against the base's directory: its parent
/// when the base looks like a file, the base itself otherwise.
pub fn resolve_output_path(
    base: &Path,
    override_path: Option<&str>,
    fallback: &str,
    check: DirectoryCheck,
) -> PathBuf {
    let base_text = base.to_string_lossy();
    let base_is_dir = is_directory_like(&base_text);

    let (candidate, candidate_text) = match override_path.map(str::trim).filter(|o| !o.is_empty()) {
        Some(configured) => {
            let configured_path = Path::new(configured);
            let candidate = if configured_path.is_absolute() {
                configured_path.to_path_buf()
            } else if base_is_dir {
                base.join(configured_path)
            } else {
                base.parent()
                    .unwrap_or_else(|| Path::new(""))
                    .join(configured_path)
            };
            (candidate, configured.to_string())
        }
        None => (base.to_path_buf(), base_text.into_owned()),
    };

    let directory = is_directory_like(&candidate_text)
        || (check == DirectoryCheck::Stat
            && fs::metadata(&candidate).map_or(false, |m| m.is_dir()));

    let resolved = if directory {
        candidate.join(fallback)
    } else {
        candidate
    };

    absolutize(&resolved)
}

/// Makes `path` absolute against the working directory and removes `.` and
/// `..` components without touching the filesystem.
pub fn absolutize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize(&absolute)
}

pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if !at_root {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// `path` relative to `root` with `/` separators, or the path itself when it
/// lies outside `root`.
pub fn relative_label(path: &Path, root: &Path) -> String {
    let path = absolutize(path);
    let root = absolutize(root);
    match path.strip_prefix(&root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}
