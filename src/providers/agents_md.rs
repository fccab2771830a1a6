//! `AGENTS.md`: every compiled document merged into one file.
//!
//! The provider instance owns an [`Aggregator`]; each write upserts the
//! document, rebuilds the merged file and persists it under the same lock.

use std::path::PathBuf;

use crate::aggregate::Aggregator;
use crate::capabilities;
use crate::handshake::ProviderHandshake;
use crate::paths::{self, DirectoryCheck};
use crate::provider::{
    ensure_capabilities, target_for, CompileArtifact, CompileRequest, CompileResult, Provider,
    ProviderError, WriteRequest,
};
use crate::selector::DestinationConfig;
use crate::writer::{self, WriteMode, WrittenArtifact};

pub const ID: &str = "agents-md";

const PLACEHOLDER: &str = "<!-- AGENTS.md output disabled -->\n";

pub struct AgentsMdProvider {
    handshake: ProviderHandshake,
    aggregator: Aggregator,
}

impl AgentsMdProvider {
    pub fn new() -> Self {
        Self {
            handshake: ProviderHandshake::new(
                ID,
                env!("CARGO_PKG_VERSION"),
                [
                    capabilities::OUTPUT_MARKDOWN,
                    capabilities::CONTENT_AGGREGATE,
                    capabilities::ATOMIC_WRITE,
                ],
            ),
            aggregator: Aggregator::new(PLACEHOLDER).with_heading("# AGENTS.md"),
        }
    }

    /// Labels of every document recorded so far, sorted.
    pub fn documents(&self) -> Vec<String> {
        self.aggregator.labels()
    }

    fn emit(config: &DestinationConfig) -> bool {
        config.get_bool("emit").unwrap_or(true)
    }
}

impl Default for AgentsMdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for AgentsMdProvider {
    fn handshake(&self) -> &ProviderHandshake {
        &self.handshake
    }

    fn default_destination(&self) -> &str {
        "AGENTS.md"
    }

    fn name(&self) -> &str {
        "AGENTS.md"
    }

    fn output_path(&self, request: &WriteRequest<'_>) -> PathBuf {
        paths::resolve_output_path(
            request.destination_path,
            request.config.output_override(),
            "AGENTS.md",
            DirectoryCheck::Stat,
        )
    }

    fn requested_capabilities(&self, _config: &DestinationConfig) -> Vec<String> {
        vec![
            capabilities::OUTPUT_MARKDOWN.to_string(),
            capabilities::CONTENT_AGGREGATE.to_string(),
        ]
    }

    fn compile(&self, request: &CompileRequest<'_>) -> CompileResult {
        ensure_capabilities(&self.handshake, &request.target)?;

        let merged = self.aggregator.update_and_then(
            &request.document.source,
            request.project_root,
            &request.document.output.content,
            vec![],
            Self::emit(request.config),
            |merged| merged.clone(),
        );

        let mut artifact = CompileArtifact::new(request.target.clone(), merged.contents);
        artifact.diagnostics = merged.diagnostics;
        Ok(vec![artifact])
    }

    fn write(&self, request: &WriteRequest<'_>) -> Result<Vec<WrittenArtifact>, ProviderError> {
        let target = target_for(self, request);
        ensure_capabilities(&self.handshake, &target)?;

        let emit = Self::emit(request.config);
        let written = self.aggregator.update_and_then(
            &request.document.source,
            request.project_root,
            &request.document.output.content,
            vec![],
            emit,
            |merged| {
                request.log.debug(format_args!(
                    "persisting {} aggregated document(s) to {}",
                    merged.documents,
                    target.output_path.display()
                ));
                writer::persist_contents(&target.output_path, &merged.contents, WriteMode::Atomic)
            },
        )?;

        if !emit {
            request.log.info("emit disabled, wrote placeholder");
        }
        Ok(vec![written])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderLog;
    use crate::providers::test_support::{compiled, config, request};
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_merges_documents_sorted_by_label() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let provider = AgentsMdProvider::new();
        let cfg = config(json!({}));
        let log = ProviderLog::new(ID);
        let base = root.join("AGENTS.md");

        let b = compiled(root.join("rules/b.md").to_str().unwrap(), "Second\n", json!({}));
        let a = compiled(root.join("rules/a.md").to_str().unwrap(), "First", json!({}));
        provider.write(&request(&b, &base, &cfg, root, &log)).unwrap();
        provider.write(&request(&a, &base, &cfg, root, &log)).unwrap();

        assert_eq!(
            fs::read_to_string(&base).unwrap(),
            "# AGENTS.md\n\n<!-- source: rules/a.md -->\n\nFirst\n\n---\n\n<!-- source: rules/b.md -->\n\nSecond\n"
        );
        assert_eq!(provider.documents(), vec!["rules/a.md", "rules/b.md"]);
    }

    #[test]
    fn test_emit_disabled_writes_placeholder_but_records() {
        let dir = tempfile::tempdir().unwrap();
        let provider = AgentsMdProvider::new();
        let cfg = config(json!({"emit": false}));
        let log = ProviderLog::new(ID);
        let base = dir.path().join("AGENTS.md");
        let doc = compiled(dir.path().join("x.md").to_str().unwrap(), "X", json!({}));

        provider.write(&request(&doc, &base, &cfg, dir.path(), &log)).unwrap();

        assert_eq!(fs::read_to_string(&base).unwrap(), PLACEHOLDER);
        assert_eq!(provider.documents(), vec!["x.md"]);
    }
}
