//! Windsurf rules, as markdown with frontmatter or as an XML `<rule>` element.

use serde_json::Value;
use std::path::PathBuf;

use super::{rule_name, setting, string_list, with_frontmatter, Fields};
use crate::capabilities;
use crate::handshake::ProviderHandshake;
use crate::paths::{self, DirectoryCheck};
use crate::provider::{
    ensure_capabilities, CompileArtifact, CompileRequest, CompileResult, PrepareCompilation,
    PrepareRequest, Preparation, Provider, ProviderError, WriteRequest,
};
use crate::selector::DestinationConfig;

pub const ID: &str = "windsurf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Markdown,
    Xml,
}

impl Format {
    fn from_config(config: &DestinationConfig) -> Self {
        match config.format() {
            Some("xml") => Format::Xml,
            _ => Format::Markdown,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Format::Markdown => "md",
            Format::Xml => "xml",
        }
    }
}

pub struct WindsurfProvider {
    handshake: ProviderHandshake,
}

impl WindsurfProvider {
    pub fn new() -> Self {
        Self {
            handshake: ProviderHandshake::new(
                ID,
                env!("CARGO_PKG_VERSION"),
                [
                    capabilities::OUTPUT_MARKDOWN,
                    capabilities::OUTPUT_XML,
                    capabilities::FRONTMATTER_TRANSLATE,
                    capabilities::RULE_GLOBS,
                ],
            ),
        }
    }
}

impl Default for WindsurfProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for WindsurfProvider {
    fn handshake(&self) -> &ProviderHandshake {
        &self.handshake
    }

    fn default_destination(&self) -> &str {
        ".windsurf/rules"
    }

    fn name(&self) -> &str {
        "Windsurf"
    }

    fn output_path(&self, request: &WriteRequest<'_>) -> PathBuf {
        let format = Format::from_config(request.config);
        let fallback = format!("{}.{}", rule_name(request.document), format.extension());
        paths::resolve_output_path(
            request.destination_path,
            request.config.output_override(),
            &fallback,
            DirectoryCheck::Stat,
        )
    }

    fn requested_capabilities(&self, config: &DestinationConfig) -> Vec<String> {
        let output = match config.format() {
            None | Some("markdown") | Some("md") => capabilities::OUTPUT_MARKDOWN,
            Some("xml") => capabilities::OUTPUT_XML,
            Some("mdc") => capabilities::OUTPUT_MDC,
            Some(other) => return vec![format!("output.{}", other)],
        };
        vec![output.to_string()]
    }

    fn compile(&self, request: &CompileRequest<'_>) -> CompileResult {
        ensure_capabilities(&self.handshake, &request.target)?;

        let document = request.document;
        let globs = string_list(setting(request.config, document, "globs"));
        let trigger = setting(request.config, document, "trigger")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| if globs.is_empty() { "always_on" } else { "glob" }.to_string());

        let contents = match Format::from_config(request.config) {
            Format::Markdown => {
                let mut fields = Fields::new();
                fields.insert("trigger".into(), Value::from(trigger));
                if !globs.is_empty() {
                    fields.insert("globs".into(), Value::from(globs.join(",")));
                }
                with_frontmatter(&fields, &document.output.content)?
            }
            Format::Xml => {
                let mut open = format!("<rule trigger=\"{}\"", escape_attribute(&trigger));
                if !globs.is_empty() {
                    open.push_str(&format!(" globs=\"{}\"", escape_attribute(&globs.join(","))));
                }
                format!("{}>\n{}\n</rule>\n", open, document.output.content.trim_end())
            }
        };

        Ok(vec![CompileArtifact::new(request.target.clone(), contents)])
    }

    fn preparation(&self) -> Option<&dyn PrepareCompilation> {
        Some(self)
    }
}

impl PrepareCompilation for WindsurfProvider {
    fn prepare(&self, request: &PrepareRequest<'_>) -> Result<Preparation, ProviderError> {
        let mut preparation = Preparation::default();
        if Format::from_config(request.destination) == Format::Xml {
            request.log.debug("xml output, enabling template escaping");
            preparation.template.no_escape = Some(false);
        }
        Ok(preparation)
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
