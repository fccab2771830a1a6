//! Ambient Partial Discovery
//!
//! Partials come from three layers: global, project, and the directory next
//! to the rule being compiled. Later layers win on name collisions.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PARTIAL_EXTENSIONS: &[&str] = &["hbs", "handlebars", "md"];
pub const RULE_ADJACENT_DIR: &str = "_partials";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialDirectories {
    pub global: Option<PathBuf>,
    pub project: Option<PathBuf>,
}

impl PartialDirectories {
    /// `$RULESETS_HOME/partials` (or `~/.config/rulesets/partials`) and
    /// `<root>/.rulesets/partials`.
    pub fn for_project(root: &Path) -> Self {
        let global = env::var_os("RULESETS_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/rulesets")))
            .map(|home| home.join("partials"));

        Self {
            global,
            project: Some(root.join(".rulesets").join("partials")),
        }
    }

    /// Project layer only; ignores the user's global directory.
    pub fn project_only(root: &Path) -> Self {
        Self {
            global: None,
            project: Some(root.join(".rulesets").join("partials")),
        }
    }

    /// Discovers every partial visible to a document at `source_path`.
    pub fn discover(&self, source_path: Option<&Path>) -> BTreeMap<String, String> {
        let rule_adjacent = source_path
            .and_then(Path::parent)
            .map(|dir| dir.join(RULE_ADJACENT_DIR));

        let mut partials = BTreeMap::new();
        for dir in [&self.global, &self.project, &rule_adjacent].into_iter().flatten() {
            load_directory(dir, &mut partials);
        }
        partials
    }
}

fn load_directory(dir: &Path, partials: &mut BTreeMap<String, String>) {
    if !dir.is_dir() {
        return;
    }

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable partial entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !has_partial_extension(path) {
            continue;
        }

        let Some(name) = partial_name(dir, path) else {
            continue;
        };
        match fs::read_to_string(path) {
            Ok(source) => {
                log::debug!("Registered partial '{}' from {}", name, path.display());
                partials.insert(name, source);
            }
            Err(e) => log::warn!("Skipping partial {}: {}", path.display(), e),
        }
    }
}

fn has_partial_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| PARTIAL_EXTENSIONS.contains(&e))
}

/// Relative path without extension, `/`-separated.
fn partial_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let name = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    (!name.is_empty()).then_some(name)
}
