//! Cursor `.mdc` rule files.

use serde_json::Value;

use super::{rule_name, setting, string_list, with_frontmatter, Fields};
use crate::capabilities;
use crate::handshake::ProviderHandshake;
use crate::paths::{self, DirectoryCheck};
use crate::provider::{
    ensure_capabilities, CompileArtifact, CompileRequest, CompileResult, PrepareCompilation,
    PrepareRequest, Preparation, Provider, ProviderError, WriteRequest,
};
use crate::selector::DestinationConfig;
use crate::templating;

pub const ID: &str = "cursor";

pub struct CursorProvider {
    handshake: ProviderHandshake,
}

impl CursorProvider {
    pub fn new() -> Self {
        Self {
            handshake: ProviderHandshake::new(
                ID,
                env!("CARGO_PKG_VERSION"),
                [
                    capabilities::OUTPUT_MDC,
                    capabilities::OUTPUT_MARKDOWN,
                    capabilities::FRONTMATTER_TRANSLATE,
                    capabilities::RULE_GLOBS,
                    capabilities::TEMPLATE_HELPERS,
                ],
            ),
        }
    }
}

impl Default for CursorProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for CursorProvider {
    fn handshake(&self) -> &ProviderHandshake {
        &self.handshake
    }

    fn default_destination(&self) -> &str {
        ".cursor/rules"
    }

    fn name(&self) -> &str {
        "Cursor"
    }

    fn output_path(&self, request: &WriteRequest<'_>) -> std::path::PathBuf {
        let fallback = format!(
            "{}.{}",
            rule_name(request.document),
            extension(request.config.format())
        );
        paths::resolve_output_path(
            request.destination_path,
            request.config.output_override(),
            &fallback,
            DirectoryCheck::Lexical,
        )
    }

    fn requested_capabilities(&self, config: &DestinationConfig) -> Vec<String> {
        let mut requested = vec![match config.format() {
            Some("xml") => capabilities::OUTPUT_XML.to_string(),
            Some("markdown") | Some("md") => capabilities::OUTPUT_MARKDOWN.to_string(),
            _ => capabilities::OUTPUT_MDC.to_string(),
        }];
        if config.get("globs").is_some() {
            requested.push(capabilities::RULE_GLOBS.to_string());
        }
        requested
    }

    fn compile(&self, request: &CompileRequest<'_>) -> CompileResult {
        ensure_capabilities(&self.handshake, &request.target)?;

        let document = request.document;
        let globs = string_list(setting(request.config, document, "globs"));
        let always_apply = setting(request.config, document, "alwaysApply")
            .and_then(Value::as_bool)
            .unwrap_or(globs.is_empty());

        let mut fields = Fields::new();
        if let Some(description) = setting(request.config, document, "description").and_then(Value::as_str) {
            fields.insert("description".into(), Value::from(description));
        }
        if !globs.is_empty() {
            fields.insert("globs".into(), Value::from(globs.join(",")));
        }
        fields.insert("alwaysApply".into(), Value::Bool(always_apply));

        let contents = with_frontmatter(&fields, &document.output.content)?;
        Ok(vec![CompileArtifact::new(request.target.clone(), contents)])
    }

    fn preparation(&self) -> Option<&dyn PrepareCompilation> {
        Some(self)
    }
}

/// `.mdc` unless plain markdown (or another format) was asked for.
fn extension(format: Option<&str>) -> &str {
    match format {
        None | Some("mdc") => "mdc",
        Some("markdown") | Some("md") => "md",
        Some(other) => other,
    }
}

impl PrepareCompilation for CursorProvider {
    fn prepare(&self, request: &PrepareRequest<'_>) -> Result<Preparation, ProviderError> {
        request.log.debug("registering globs helper");

        let mut preparation = Preparation::default();
        preparation.template.helpers.insert(
            "globs".to_string(),
            templating::helper(|args| {
                let joined: Vec<String> = args.iter().flat_map(|a| string_list(Some(a))).collect();
                Ok(Value::from(joined.join(", ")))
            }),
        );
        Ok(preparation)
    }
}
