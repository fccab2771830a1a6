//! Built-in Providers
//!
//! Each provider owns its default destination, its fallback filename and
//! whether its path resolution consults the filesystem.

pub mod agents_md;
pub mod claude_code;
pub mod cline;
pub mod codex;
pub mod copilot;
pub mod cursor;
pub mod roo_code;
pub mod windsurf;

pub use agents_md::AgentsMdProvider;
pub use claude_code::ClaudeCodeProvider;
pub use cline::ClineProvider;
pub use codex::CodexProvider;
pub use copilot::CopilotProvider;
pub use cursor::CursorProvider;
pub use roo_code::RooCodeProvider;
pub use windsurf::WindsurfProvider;

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

use crate::document::CompiledDocument;
use crate::paths;
use crate::provider::{Provider, ProviderError};

/// Fresh instances of every built-in provider, in registry order.
pub fn builtin() -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(CursorProvider::new()),
        Arc::new(WindsurfProvider::new()),
        Arc::new(ClaudeCodeProvider::new()),
        Arc::new(CopilotProvider::new()),
        Arc::new(ClineProvider::new()),
        Arc::new(RooCodeProvider::new()),
        Arc::new(AgentsMdProvider::new()),
        Arc::new(CodexProvider::new()),
    ]
}

/// Ordered frontmatter fields for an emitted file.
pub(crate) type Fields = IndexMap<String, Value>;

/// Prefixes `body` with a YAML frontmatter block when `fields` is non-empty.
pub(crate) fn with_frontmatter(fields: &Fields, body: &str) -> Result<String, ProviderError> {
    let body = body.trim_end();
    if fields.is_empty() {
        return Ok(format!("{}\n", body));
    }

    let yaml = serde_yaml::to_string(fields)
        .map_err(|e| ProviderError::Other(format!("Failed to serialize frontmatter: {}", e)))?;
    Ok(format!("---\n{}---\n\n{}\n", yaml, body))
}

/// Accepts either a single string or a list of strings.
pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => vec![],
    }
}

/// The document's rule name, used for fallback filenames and labels.
pub(crate) fn rule_name(document: &CompiledDocument) -> String {
    paths::rule_stem(document.source.path.as_deref(), &document.source.id)
}

/// A setting from the destination config, else from document frontmatter.
pub(crate) fn setting<'a>(
    config: &'a crate::selector::DestinationConfig,
    document: &'a CompiledDocument,
    key: &str,
) -> Option<&'a Value> {
    config.get(key).or_else(|| document.frontmatter().get(key))
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_frontmatter_keeps_field_order() {
        let mut fields = Fields::new();
        fields.insert("description".into(), json!("Style"));
        fields.insert("alwaysApply".into(), json!(false));

        let out = with_frontmatter(&fields, "Body\n\n").unwrap();
        assert_eq!(out, "---\ndescription: Style\nalwaysApply: false\n---\n\nBody\n");
    }

    #[test]
    fn test_with_frontmatter_empty_fields() {
        assert_eq!(with_frontmatter(&Fields::new(), "Body").unwrap(), "Body\n");
    }

    #[test]
    fn test_string_list_accepts_both_shapes() {
        assert_eq!(string_list(Some(&json!("a, b,"))), vec!["a", "b"]);
        assert_eq!(string_list(Some(&json!(["x", 1, "y"]))), vec!["x", "y"]);
        assert!(string_list(None).is_empty());
    }

    #[test]
    fn test_builtin_ids_unique() {
        let providers = builtin();
        let mut ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), providers.len());
    }
}
