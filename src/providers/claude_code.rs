//! Claude Code memory file (`CLAUDE.md`).

use std::path::PathBuf;

use super::{rule_name, with_frontmatter, Fields};
use crate::capabilities;
use crate::handshake::ProviderHandshake;
use crate::paths::{self, DirectoryCheck};
use crate::provider::{
    compile_and_persist, ensure_capabilities, CompileArtifact, CompileRequest, CompileResult,
    Provider, ProviderError, WriteRequest,
};
use crate::writer::{WriteMode, WrittenArtifact};

pub const ID: &str = "claude-code";

pub struct ClaudeCodeProvider {
    handshake: ProviderHandshake,
}

impl ClaudeCodeProvider {
    pub fn new() -> Self {
        Self {
            handshake: ProviderHandshake::new(
                ID,
                env!("CARGO_PKG_VERSION"),
                [capabilities::OUTPUT_MARKDOWN, capabilities::ATOMIC_WRITE],
            ),
        }
    }
}

impl Default for ClaudeCodeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for ClaudeCodeProvider {
    fn handshake(&self) -> &ProviderHandshake {
        &self.handshake
    }

    fn default_destination(&self) -> &str {
        "CLAUDE.md"
    }

    fn name(&self) -> &str {
        "Claude Code"
    }

    fn output_path(&self, request: &WriteRequest<'_>) -> PathBuf {
        let fallback = format!("{}.md", rule_name(request.document));
        paths::resolve_output_path(
            request.destination_path,
            request.config.output_override(),
            &fallback,
            DirectoryCheck::Stat,
        )
    }

    fn requested_capabilities(&self, _config: &crate::selector::DestinationConfig) -> Vec<String> {
        vec![capabilities::OUTPUT_MARKDOWN.to_string()]
    }

    fn compile(&self, request: &CompileRequest<'_>) -> CompileResult {
        ensure_capabilities(&self.handshake, &request.target)?;
        let contents = with_frontmatter(&Fields::new(), &request.document.output.content)?;
        Ok(vec![CompileArtifact::new(request.target.clone(), contents)])
    }

    fn write(&self, request: &WriteRequest<'_>) -> Result<Vec<WrittenArtifact>, ProviderError> {
        compile_and_persist(self, request, WriteMode::Atomic)
    }
}
