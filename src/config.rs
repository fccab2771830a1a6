//! Project Configuration
//!
//! The project config stays a JSON object so provider hooks can merge
//! arbitrary overrides into a destination-scoped copy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_CANDIDATES: &[&str] = &["config.json", "config.yaml", "config.yml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid YAML config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config {0} must be a mapping at the top level")]
    NotAMapping(PathBuf),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ProjectConfig {
    values: Map<String, Value>,
}

impl ProjectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON value; anything but an object becomes an empty config.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = path
            .extension()
            .map_or(false, |e| e == "yaml" || e == "yml");

        let value: Value = if is_yaml {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?;
            serde_json::to_value(yaml)
                .map_err(|_| ConfigError::NotAMapping(path.to_path_buf()))?
        } else {
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        };

        match value {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::default()),
            _ => Err(ConfigError::NotAMapping(path.to_path_buf())),
        }
    }

    /// Looks for `.rulesets/config.{json,yaml,yml}` under `root`.
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        for candidate in CONFIG_CANDIDATES {
            let path = root.join(".rulesets").join(candidate);
            if path.is_file() {
                log::debug!("Loading project config from {}", path.display());
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Reads a dotted path such as `rule.template`.
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let first = parts.next()?;
        parts.try_fold(self.values.get(first)?, |value, part| value.get(part))
    }

    pub fn provider_block(&self, provider_id: &str) -> Option<&Value> {
        self.values.get("providers")?.get(provider_id)
    }

    /// `rule.template` as a project-wide default.
    pub fn rule_template(&self) -> Option<bool> {
        self.lookup("rule.template").and_then(Value::as_bool)
    }

    /// Legacy `rulesets.compiler` (or top-level `compiler`).
    pub fn legacy_compiler(&self) -> Option<&str> {
        self.lookup("rulesets.compiler")
            .or_else(|| self.values.get("compiler"))
            .and_then(Value::as_str)
    }

    /// A copy with `overrides` deep-merged on top.
    pub fn merged_with(&self, overrides: &Value) -> Self {
        let mut merged = Value::Object(self.values.clone());
        deep_merge(&mut merged, overrides);
        Self::from_value(merged)
    }
}

/// Merges `overlay` into `base`; objects merge key by key, everything else
/// is replaced.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
