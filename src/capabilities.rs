//! Capability Registry
//!
//! A closed set of known capability ids. Ids outside the set are still
//! describable; they are synthesized and marked experimental.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;

pub const OUTPUT_MARKDOWN: &str = "output.markdown";
pub const OUTPUT_MDC: &str = "output.mdc";
pub const OUTPUT_XML: &str = "output.xml";
pub const FRONTMATTER_TRANSLATE: &str = "frontmatter.translate";
pub const RULE_GLOBS: &str = "rule.globs";
pub const CONTENT_AGGREGATE: &str = "content.aggregate";
pub const SHARED_FILE: &str = "output.shared-file";
pub const ATOMIC_WRITE: &str = "write.atomic";
pub const TEMPLATE_HELPERS: &str = "template.helpers";

const KNOWN: &[(&str, &str)] = &[
    (OUTPUT_MARKDOWN, "Emits markdown rule files"),
    (OUTPUT_MDC, "Emits Cursor .mdc rule files"),
    (OUTPUT_XML, "Emits XML-wrapped rule files"),
    (FRONTMATTER_TRANSLATE, "Translates document frontmatter into destination metadata"),
    (RULE_GLOBS, "Scopes rules to file globs"),
    (CONTENT_AGGREGATE, "Merges many documents into one artifact"),
    (SHARED_FILE, "Emits a secondary file shared across documents"),
    (ATOMIC_WRITE, "Persists through a temporary file and rename"),
    (TEMPLATE_HELPERS, "Contributes helpers to the templating engine"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub experimental: bool,
    #[serde(default)]
    pub optional: bool,
}

pub fn is_known(id: &str) -> bool {
    KNOWN.iter().any(|(known, _)| *known == id)
}

/// Looks up a known capability, or synthesizes an experimental descriptor.
pub fn describe(id: &str) -> CapabilityDescriptor {
    match KNOWN.iter().find(|(known, _)| *known == id) {
        Some((known, description)) => CapabilityDescriptor {
            id: (*known).to_string(),
            description: (*description).to_string(),
            experimental: false,
            optional: false,
        },
        None => CapabilityDescriptor {
            id: id.to_string(),
            description: format!("Unrecognized capability '{}'", id),
            experimental: true,
            optional: false,
        },
    }
}

pub fn describe_all<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<CapabilityDescriptor> {
    ids.into_iter().map(describe).collect()
}

/// The diagnostic a provider returns when asked for a capability it lacks.
pub fn unsupported(provider_id: &str, capability_id: &str) -> Diagnostic {
    Diagnostic::error(
        "capability.unsupported",
        format!(
            "Provider '{}' does not support capability '{}'",
            provider_id, capability_id
        ),
    )
    .with_expected(capability_id)
    .with_remediation(format!(
        "Remove the option requiring '{}' from the {} configuration",
        capability_id, provider_id
    ))
}
