//! Destination Selector
//!
//! Decides which registered destinations a document compiles to. Frontmatter
//! values that may be booleans, objects or arrays are decoded once into
//! [`DestinationSetting`] here and nowhere else.

use serde_json::{Map, Value};

use crate::config::ProjectConfig;

/// Keys that mark an object as a provider configuration block.
const PROVIDER_KEYS: &[&str] = &["enabled", "outputPath", "path", "config", "format", "template"];

/// A decoded per-destination signal.
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationSetting {
    Disabled,
    /// A config block was present without an explicit flag.
    EnabledImplicit(Map<String, Value>),
    EnabledExplicit(Map<String, Value>),
}

/// Where a block was found; legacy top-level blocks must be non-empty to
/// count as an opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockShape {
    Provider,
    Legacy,
}

impl DestinationSetting {
    pub fn decode(value: &Value, shape: BlockShape) -> Option<Self> {
        match value {
            Value::Bool(false) => Some(Self::Disabled),
            Value::Bool(true) => Some(Self::EnabledExplicit(Map::new())),
            Value::Object(block) => match block.get("enabled").and_then(Value::as_bool) {
                Some(false) => Some(Self::Disabled),
                Some(true) => Some(Self::EnabledExplicit(block.clone())),
                None => {
                    let provider_shaped = shape == BlockShape::Provider
                        || block.keys().any(|k| PROVIDER_KEYS.contains(&k.as_str()));
                    if provider_shaped || !block.is_empty() {
                        Some(Self::EnabledImplicit(block.clone()))
                    } else {
                        None
                    }
                }
            },
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// True when the frontmatter marks the document as not being a rule.
pub fn is_excluded(frontmatter: &Value) -> bool {
    frontmatter
        .get("rule")
        .and_then(|rule| rule.get("disabled"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Resolves the first setting for `provider_id`, frontmatter before project.
pub fn resolve_setting(
    provider_id: &str,
    frontmatter: &Value,
    config: &ProjectConfig,
) -> Option<DestinationSetting> {
    let candidates = [
        (frontmatter.get(provider_id), BlockShape::Legacy),
        (
            frontmatter.get("providers").and_then(|p| p.get(provider_id)),
            BlockShape::Provider,
        ),
        (config.provider_block(provider_id), BlockShape::Provider),
    ];

    candidates
        .into_iter()
        .filter_map(|(value, shape)| value.map(|v| (v, shape)))
        .find_map(|(value, shape)| DestinationSetting::decode(value, shape))
}

/// Returns the enabled destination ids in registry order.
pub fn select_destinations(
    frontmatter: &Value,
    config: &ProjectConfig,
    registered: &[&str],
) -> Vec<String> {
    if is_excluded(frontmatter) {
        return vec![];
    }

    if let Some(selected) = select_legacy(frontmatter, registered) {
        return selected;
    }

    registered
        .iter()
        .filter(|id| {
            resolve_setting(id, frontmatter, config)
                .map_or(true, |setting| setting.is_enabled())
        })
        .map(|id| id.to_string())
        .collect()
}

fn select_legacy(frontmatter: &Value, registered: &[&str]) -> Option<Vec<String>> {
    let block = frontmatter.get("destinations")?;

    let keep = |wanted: &dyn Fn(&str) -> bool| -> Vec<String> {
        registered
            .iter()
            .filter(|id| wanted(**id))
            .map(|id| id.to_string())
            .collect()
    };

    match block {
        Value::Array(items) => {
            let include = string_items(items);
            Some(keep(&|id| include.iter().any(|i| *i == id)))
        }
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("include") {
                let include = string_items(items);
                return Some(keep(&|id| include.iter().any(|i| *i == id)));
            }
            if registered.iter().any(|id| map.contains_key(*id)) {
                return Some(keep(&|id| map.contains_key(id)));
            }
            None
        }
        _ => None,
    }
}

fn string_items(items: &[Value]) -> Vec<&str> {
    items.iter().filter_map(Value::as_str).collect()
}

/// Per-destination configuration after merging every source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationConfig {
    values: Map<String, Value>,
}

impl DestinationConfig {
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    /// The configured output override; legacy `path` is merged into it.
    pub fn output_override(&self) -> Option<&str> {
        self.get_str("outputPath")
    }

    pub fn format(&self) -> Option<&str> {
        self.get_str("format")
    }
}

/// Merges project `providers.<id>`, frontmatter `destinations.<id>`,
/// frontmatter `providers.<id>` and frontmatter `<id>`, later sources winning.
pub fn destination_config(
    provider_id: &str,
    frontmatter: &Value,
    config: &ProjectConfig,
) -> DestinationConfig {
    let layers = [
        config.provider_block(provider_id),
        frontmatter
            .get("destinations")
            .and_then(|d| d.get(provider_id)),
        frontmatter.get("providers").and_then(|p| p.get(provider_id)),
        frontmatter.get(provider_id),
    ];

    let mut values = Map::new();
    for layer in layers.into_iter().flatten() {
        if let Value::Object(block) = layer {
            merge_layer(&mut values, block);
        }
    }

    DestinationConfig { values }
}

/// Copies one layer's keys, flattening `config` and stripping `enabled`.
/// Legacy `path` is stored as `outputPath` so precedence follows the layer.
fn merge_layer(values: &mut Map<String, Value>, block: &Map<String, Value>) {
    for (key, value) in block {
        match (key.as_str(), value) {
            ("enabled", _) => {}
            ("config", Value::Object(nested)) => merge_layer(values, nested),
            ("path", _) if block.contains_key("outputPath") => {}
            ("path", _) => {
                values.insert("outputPath".to_string(), value.clone());
            }
            _ => {
                values.insert(key.clone(), value.clone());
            }
        }
    }
}
