//! Provider Contract
//!
//! A provider turns a compiled document into one or more artifacts and
//! persists them. `compile` and `write` are required behaviour; the
//! preparation hook is an optional capability object.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::capabilities;
use crate::config::ProjectConfig;
use crate::diagnostics::{self, Diagnostic};
use crate::document::{CompiledDocument, RulesetDocument};
use crate::handshake::ProviderHandshake;
use crate::selector::DestinationConfig;
use crate::templating::HelperFn;
use crate::writer::{self, WriteError, WriteMode, WrittenArtifact};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompileTarget {
    pub provider_id: String,
    pub output_path: PathBuf,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompileArtifact {
    pub target: CompileTarget,
    pub contents: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileArtifact {
    pub fn new(target: CompileTarget, contents: impl Into<String>) -> Self {
        Self {
            target,
            contents: contents.into(),
            diagnostics: vec![],
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Compilation failed: {}", diagnostics::summarize(.0))]
    Compile(Vec<Diagnostic>),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn capability_unsupported(provider_id: &str, capability_id: &str) -> Self {
        Self::Compile(vec![capabilities::unsupported(provider_id, capability_id)])
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Compile(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

pub type CompileResult = Result<Vec<CompileArtifact>, ProviderError>;

/// Logging handle scoped to one destination.
#[derive(Debug, Clone)]
pub struct ProviderLog {
    destination: String,
}

impl ProviderLog {
    const TARGET: &'static str = "rulesets::provider";

    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn debug(&self, message: impl fmt::Display) {
        log::debug!(target: Self::TARGET, "[{}] {}", self.destination, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        log::info!(target: Self::TARGET, "[{}] {}", self.destination, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        log::warn!(target: Self::TARGET, "[{}] {}", self.destination, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        log::error!(target: Self::TARGET, "[{}] {}", self.destination, message);
    }
}

/// Templating knobs a provider may set before rendering.
#[derive(Clone, Default)]
pub struct TemplateOverrides {
    pub force: Option<bool>,
    pub helpers: BTreeMap<String, HelperFn>,
    pub partials: BTreeMap<String, String>,
    pub strict: Option<bool>,
    pub no_escape: Option<bool>,
}

impl fmt::Debug for TemplateOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateOverrides")
            .field("force", &self.force)
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .field("partials", &self.partials.keys().collect::<Vec<_>>())
            .field("strict", &self.strict)
            .field("no_escape", &self.no_escape)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Preparation {
    /// Deep-merged into a destination-scoped copy of the project config.
    pub project_overrides: Option<Value>,
    pub template: TemplateOverrides,
}

pub struct PrepareRequest<'a> {
    pub document: &'a RulesetDocument,
    pub project: &'a ProjectConfig,
    pub destination: &'a DestinationConfig,
    pub log: &'a ProviderLog,
}

/// Optional hook run before rendering.
pub trait PrepareCompilation: Send + Sync {
    fn prepare(&self, request: &PrepareRequest<'_>) -> Result<Preparation, ProviderError>;
}

pub struct CompileRequest<'a> {
    pub document: &'a CompiledDocument,
    pub target: CompileTarget,
    pub config: &'a DestinationConfig,
    pub project_root: &'a Path,
}

pub struct WriteRequest<'a> {
    pub document: &'a CompiledDocument,
    /// The provider's base destination, before override and fallback.
    pub destination_path: &'a Path,
    pub config: &'a DestinationConfig,
    pub project_root: &'a Path,
    pub log: &'a ProviderLog,
}

pub trait Provider: Send + Sync {
    fn handshake(&self) -> &ProviderHandshake;

    /// Base destination relative to the project root.
    fn default_destination(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    fn id(&self) -> &str {
        &self.handshake().provider_id
    }

    /// Final artifact path for this document.
    fn output_path(&self, request: &WriteRequest<'_>) -> PathBuf;

    /// Capability ids the requested configuration needs.
    fn requested_capabilities(&self, _config: &DestinationConfig) -> Vec<String> {
        vec![]
    }

    fn compile(&self, request: &CompileRequest<'_>) -> CompileResult;

    fn write(&self, request: &WriteRequest<'_>) -> Result<Vec<WrittenArtifact>, ProviderError> {
        compile_and_persist(self, request, WriteMode::Direct)
    }

    fn preparation(&self) -> Option<&dyn PrepareCompilation> {
        None
    }
}

/// The target a provider compiles against for this request.
pub fn target_for<P: Provider + ?Sized>(provider: &P, request: &WriteRequest<'_>) -> CompileTarget {
    CompileTarget {
        provider_id: provider.id().to_string(),
        output_path: provider.output_path(request),
        capabilities: provider.requested_capabilities(request.config),
    }
}

/// Fails with a capability diagnostic for the first requested capability the
/// handshake does not declare.
pub fn ensure_capabilities(
    handshake: &ProviderHandshake,
    target: &CompileTarget,
) -> Result<(), ProviderError> {
    match target.capabilities.iter().find(|c| !handshake.supports(c)) {
        Some(missing) => Err(ProviderError::capability_unsupported(
            &handshake.provider_id,
            missing,
        )),
        None => Ok(()),
    }
}

/// Default write step: resolve, compile, persist every artifact.
pub fn compile_and_persist<P: Provider + ?Sized>(
    provider: &P,
    request: &WriteRequest<'_>,
    mode: WriteMode,
) -> Result<Vec<WrittenArtifact>, ProviderError> {
    let target = target_for(provider, request);
    let artifacts = provider.compile(&CompileRequest {
        document: request.document,
        target,
        config: request.config,
        project_root: request.project_root,
    })?;

    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        for diagnostic in &artifact.diagnostics {
            request.log.warn(diagnostic);
        }
        written.push(writer::persist(artifact, mode)?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_capabilities_reports_first_missing() {
        let handshake = ProviderHandshake::new("demo", "1.0.0", [capabilities::OUTPUT_MARKDOWN]);
        let target = CompileTarget {
            provider_id: "demo".into(),
            output_path: PathBuf::from("/tmp/demo.md"),
            capabilities: vec![
                capabilities::OUTPUT_MARKDOWN.into(),
                capabilities::OUTPUT_XML.into(),
            ],
        };

        let err = ensure_capabilities(&handshake, &target).unwrap_err();
        assert_eq!(err.diagnostics().len(), 1);
        assert!(err.to_string().contains("output.xml"));
    }
}
