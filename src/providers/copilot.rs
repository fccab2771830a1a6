//! GitHub Copilot path-specific instructions (`*.instructions.md`).

use serde_json::Value;
use std::path::PathBuf;

use super::{rule_name, setting, string_list, with_frontmatter, Fields};
use crate::capabilities;
use crate::handshake::ProviderHandshake;
use crate::paths::{self, DirectoryCheck};
use crate::provider::{
    ensure_capabilities, CompileArtifact, CompileRequest, CompileResult, Provider, WriteRequest,
};
use crate::selector::DestinationConfig;

pub const ID: &str = "copilot";

pub struct CopilotProvider {
    handshake: ProviderHandshake,
}

impl CopilotProvider {
    pub fn new() -> Self {
        Self {
            handshake: ProviderHandshake::new(
                ID,
                env!("CARGO_PKG_VERSION"),
                [
                    capabilities::OUTPUT_MARKDOWN,
                    capabilities::FRONTMATTER_TRANSLATE,
                    capabilities::RULE_GLOBS,
                ],
            ),
        }
    }
}

impl Default for CopilotProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for CopilotProvider {
    fn handshake(&self) -> &ProviderHandshake {
        &self.handshake
    }

    fn default_destination(&self) -> &str {
        ".github/instructions"
    }

    fn name(&self) -> &str {
        "GitHub Copilot"
    }

    fn output_path(&self, request: &WriteRequest<'_>) -> PathBuf {
        let fallback = format!("{}.instructions.md", rule_name(request.document));
        paths::resolve_output_path(
            request.destination_path,
            request.config.output_override(),
            &fallback,
            DirectoryCheck::Lexical,
        )
    }

    fn requested_capabilities(&self, config: &DestinationConfig) -> Vec<String> {
        match config.format() {
            None | Some("markdown") | Some("md") => vec![capabilities::OUTPUT_MARKDOWN.to_string()],
            Some(other) => vec![format!("output.{}", other)],
        }
    }

    fn compile(&self, request: &CompileRequest<'_>) -> CompileResult {
        ensure_capabilities(&self.handshake, &request.target)?;

        let document = request.document;
        let apply_to = match setting(request.config, document, "applyTo").and_then(Value::as_str) {
            Some(explicit) => explicit.to_string(),
            None => {
                let globs = string_list(setting(request.config, document, "globs"));
                if globs.is_empty() {
                    "**".to_string()
                } else {
                    globs.join(",")
                }
            }
        };

        let mut fields = Fields::new();
        fields.insert("applyTo".into(), Value::from(apply_to));
        let contents = with_frontmatter(&fields, &document.output.content)?;
        Ok(vec![CompileArtifact::new(request.target.clone(), contents)])
    }
}
