//! Roo Code rules, optionally scoped to a mode (`.roo/rules-<mode>`).

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{rule_name, setting, with_frontmatter, Fields};
use crate::capabilities;
use crate::handshake::ProviderHandshake;
use crate::paths::{self, DirectoryCheck};
use crate::provider::{
    ensure_capabilities, CompileArtifact, CompileRequest, CompileResult, Provider, WriteRequest,
};
use crate::selector::DestinationConfig;

pub const ID: &str = "roo-code";

pub struct RooCodeProvider {
    handshake: ProviderHandshake,
}

impl RooCodeProvider {
    pub fn new() -> Self {
        Self {
            handshake: ProviderHandshake::new(ID, env!("CARGO_PKG_VERSION"), [capabilities::OUTPUT_MARKDOWN]),
        }
    }
}

impl Default for RooCodeProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// `<parent>/rules-<mode>` for a mode-scoped rule, the base otherwise.
fn mode_base(base: &Path, mode: Option<&str>) -> PathBuf {
    match mode.map(str::trim).filter(|m| !m.is_empty()) {
        Some(mode) => base
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("rules-{}", mode)),
        None => base.to_path_buf(),
    }
}

impl Provider for RooCodeProvider {
    fn handshake(&self) -> &ProviderHandshake {
        &self.handshake
    }

    fn default_destination(&self) -> &str {
        ".roo/rules"
    }

    fn name(&self) -> &str {
        "Roo Code"
    }

    fn output_path(&self, request: &WriteRequest<'_>) -> PathBuf {
        let mode = setting(request.config, request.document, "mode").and_then(Value::as_str);
        let base = mode_base(request.destination_path, mode);
        let fallback = format!("{}.md", rule_name(request.document));
        paths::resolve_output_path(&base, request.config.output_override(), &fallback, DirectoryCheck::Lexical)
    }

    fn requested_capabilities(&self, config: &DestinationConfig) -> Vec<String> {
        match config.format() {
            None | Some("markdown") | Some("md") => vec![capabilities::OUTPUT_MARKDOWN.to_string()],
            Some(other) => vec![format!("output.{}", other)],
        }
    }

    fn compile(&self, request: &CompileRequest<'_>) -> CompileResult {
        ensure_capabilities(&self.handshake, &request.target)?;
        let contents = with_frontmatter(&Fields::new(), &request.document.output.content)?;
        Ok(vec![CompileArtifact::new(request.target.clone(), contents)])
    }
}
