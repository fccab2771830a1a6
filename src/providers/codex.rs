//! Codex rules: one file per document plus a shared, aggregated
//! `.codex/AGENTS.md`.

use std::path::{Path, PathBuf};

use super::{rule_name, with_frontmatter, Fields};
use crate::aggregate::Aggregator;
use crate::capabilities;
use crate::document::CompiledDocument;
use crate::handshake::ProviderHandshake;
use crate::paths::{self, DirectoryCheck};
use crate::provider::{
    ensure_capabilities, target_for, CompileArtifact, CompileRequest, CompileResult,
    CompileTarget, Provider, ProviderError, WriteRequest,
};
use crate::selector::DestinationConfig;
use crate::writer::{self, WriteMode, WrittenArtifact};

pub const ID: &str = "codex";

const SHARED_PLACEHOLDER: &str = "<!-- shared AGENTS.md output disabled -->\n";

pub struct CodexProvider {
    handshake: ProviderHandshake,
    shared: Aggregator,
}

impl CodexProvider {
    pub fn new() -> Self {
        Self {
            handshake: ProviderHandshake::new(
                ID,
                env!("CARGO_PKG_VERSION"),
                [
                    capabilities::OUTPUT_MARKDOWN,
                    capabilities::SHARED_FILE,
                    capabilities::CONTENT_AGGREGATE,
                    capabilities::ATOMIC_WRITE,
                ],
            ),
            shared: Aggregator::new(SHARED_PLACEHOLDER),
        }
    }

    /// The shared file lives next to the directory holding the primary file
    /// unless `sharedPath` says otherwise.
    fn shared_path(primary_dir: &Path, config: &DestinationConfig) -> PathBuf {
        let parent = primary_dir.parent().unwrap_or(primary_dir);
        paths::resolve_output_path(parent, config.get_str("sharedPath"), "AGENTS.md", DirectoryCheck::Stat)
    }

    fn shared_enabled(config: &DestinationConfig) -> bool {
        config.get_bool("sharedAgentsFile").unwrap_or(true)
    }

    fn primary_contents(document: &CompiledDocument) -> Result<String, ProviderError> {
        with_frontmatter(&Fields::new(), &document.output.content)
    }
}

impl Default for CodexProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for CodexProvider {
    fn handshake(&self) -> &ProviderHandshake {
        &self.handshake
    }

    fn default_destination(&self) -> &str {
        ".codex/rules"
    }

    fn name(&self) -> &str {
        "Codex"
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

    fn requested_capabilities(&self, config: &DestinationConfig) -> Vec<String> {
        let mut requested = vec![capabilities::OUTPUT_MARKDOWN.to_string()];
        if Self::shared_enabled(config) {
            requested.push(capabilities::SHARED_FILE.to_string());
        }
        requested
    }

    /// Returns the primary artifact and the shared artifact, in that order.
    fn compile(&self, request: &CompileRequest<'_>) -> CompileResult {
        ensure_capabilities(&self.handshake, &request.target)?;

        let primary = CompileArtifact::new(request.target.clone(), Self::primary_contents(request.document)?);
        let base = request
            .target
            .output_path
            .parent()
            .unwrap_or(request.project_root);
        let shared_target = CompileTarget {
            provider_id: ID.to_string(),
            output_path: Self::shared_path(base, request.config),
            capabilities: vec![capabilities::CONTENT_AGGREGATE.to_string()],
        };

        let merged = self.shared.update_and_then(
            &request.document.source,
            request.project_root,
            &request.document.output.content,
            vec![],
            Self::shared_enabled(request.config),
            |merged| merged.contents.clone(),
        );

        Ok(vec![primary, CompileArtifact::new(shared_target, merged)])
    }

    fn write(&self, request: &WriteRequest<'_>) -> Result<Vec<WrittenArtifact>, ProviderError> {
        let target = target_for(self, request);
        ensure_capabilities(&self.handshake, &target)?;

        let contents = Self::primary_contents(request.document)?;
        let primary = writer::persist_contents(&target.output_path, &contents, WriteMode::Direct)?;

        let base = target.output_path.parent().unwrap_or(request.project_root);
        let shared_path = Self::shared_path(base, request.config);
        let enabled = Self::shared_enabled(request.config);
        if !enabled {
            request.log.debug("sharedAgentsFile disabled, writing placeholder");
        }

        let shared = self.shared.update_and_then(
            &request.document.source,
            request.project_root,
            &request.document.output.content,
            vec![],
            enabled,
            |merged| writer::persist_contents(&shared_path, &merged.contents, WriteMode::Atomic),
        )?;

        Ok(vec![primary, shared])
    }
}
