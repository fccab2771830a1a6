//! Cline rules directory (`.clinerules`), plain markdown bodies.

use std::path::PathBuf;

use super::{rule_name, with_frontmatter, Fields};
use crate::capabilities;
use crate::handshake::ProviderHandshake;
use crate::paths::{self, DirectoryCheck};
use crate::provider::{
    ensure_capabilities, CompileArtifact, CompileRequest, CompileResult, Provider, WriteRequest,
};
use crate::selector::DestinationConfig;

pub const ID: &str = "cline";

pub struct ClineProvider {
    handshake: ProviderHandshake,
}

impl ClineProvider {
    pub fn new() -> Self {
        Self {
            handshake: ProviderHandshake::new(ID, env!("CARGO_PKG_VERSION"), [capabilities::OUTPUT_MARKDOWN]),
        }
    }
}

impl Default for ClineProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for ClineProvider {
    fn handshake(&self) -> &ProviderHandshake {
        &self.handshake
    }

    fn default_destination(&self) -> &str {
        ".clinerules"
    }

    fn name(&self) -> &str {
        "Cline"
    }

    fn output_path(&self, request: &WriteRequest<'_>) -> PathBuf {
        let fallback = format!("{}.md", rule_name(request.document));
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
        let contents = with_frontmatter(&Fields::new(), &request.document.output.content)?;
        Ok(vec![CompileArtifact::new(request.target.clone(), contents)])
    }
}
