//! Compilation Pipeline - Single Entry Point
//!
//! One document in, one result per destination out. Destinations run in
//! order; a failing destination never stops the ones after it.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ProjectConfig;
use crate::document::{CompilationContext, CompiledDocument, CompiledOutput, RulesetDocument};
use crate::partials::PartialDirectories;
use crate::paths;
use crate::policy::{decide_templating, TemplateDecision};
use crate::provider::{
    Preparation, PrepareRequest, Provider, ProviderError, ProviderLog, TemplateOverrides,
    WriteRequest,
};
use crate::registry::ProviderRegistry;
use crate::selector;
use crate::templating::{HandlebarsEngine, RenderOptions, TemplateEngine, TemplateError};
use crate::writer::WrittenArtifact;

#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("No provider registered for destination '{0}'")]
    UnknownProvider(String),

    #[error("Preparation hook failed for '{destination}': {source}")]
    Prepare {
        destination: String,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to render {source_path} for '{destination}': {source}")]
    Render {
        source_path: String,
        destination: String,
        #[source]
        source: TemplateError,
    },

    #[error("Failed to build template context: {0}")]
    Context(#[from] serde_json::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("All {} destination(s) failed for {source_path}: {}", .results.len(), failure_summary(.results))]
    AllDestinationsFailed {
        source_path: String,
        results: Vec<DestinationResult>,
    },
}

impl PipelineError {
    pub fn results(&self) -> &[DestinationResult] {
        match self {
            Self::AllDestinationsFailed { results, .. } => results,
        }
    }
}

fn failure_summary(results: &[DestinationResult]) -> String {
    results
        .iter()
        .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.destination_id, e)))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Which destinations to compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DestinationRequest {
    /// Let the selector decide from frontmatter and project config.
    #[default]
    Auto,
    Only(Vec<String>),
}

/// Caller-level knobs for one compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// When set, replaces ambient partial discovery entirely.
    pub partials: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationResult {
    pub destination_id: String,
    pub success: bool,
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<DestinationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templating: Option<TemplateDecision>,
    pub written: Vec<WrittenArtifact>,
}

fn serialize_error<S: Serializer>(error: &Option<DestinationError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_str(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

impl DestinationResult {
    fn succeeded(destination_id: &str, written: Vec<WrittenArtifact>, templating: TemplateDecision) -> Self {
        Self {
            destination_id: destination_id.to_string(),
            success: true,
            error: None,
            templating: Some(templating),
            written,
        }
    }

    fn failed(destination_id: &str, error: DestinationError) -> Self {
        Self {
            destination_id: destination_id.to_string(),
            success: false,
            error: Some(error),
            templating: None,
            written: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CompileOutcome {
    /// No destination applied to the document.
    Empty,
    Success,
    Partial { succeeded: usize, failed: usize },
    Failed { failed: usize },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileReport {
    pub run_id: Uuid,
    pub source_path: String,
    pub started_at: DateTime<Utc>,
    pub results: Vec<DestinationResult>,
}

impl CompileReport {
    pub fn outcome(&self) -> CompileOutcome {
        let failed = self.results.iter().filter(|r| !r.success).count();
        match (self.results.len(), failed) {
            (0, _) => CompileOutcome::Empty,
            (_, 0) => CompileOutcome::Success,
            (total, failed) if total == failed => CompileOutcome::Failed { failed },
            (total, failed) => CompileOutcome::Partial {
                succeeded: total - failed,
                failed,
            },
        }
    }

    pub fn result(&self, destination_id: &str) -> Option<&DestinationResult> {
        self.results.iter().find(|r| r.destination_id == destination_id)
    }
}

/// State scoped to one top-level compilation.
struct RunScope {
    id: Uuid,
    started_at: DateTime<Utc>,
    ambient_partials: OnceCell<BTreeMap<String, String>>,
}

impl RunScope {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            ambient_partials: OnceCell::new(),
        }
    }
}

/// The compilation pipeline - single entry point for all documents
pub struct CompilationPipeline {
    registry: ProviderRegistry,
    engine: Box<dyn TemplateEngine>,
    project_root: PathBuf,
    partial_dirs: PartialDirectories,
}

impl CompilationPipeline {
    pub fn new(registry: ProviderRegistry, project_root: impl Into<PathBuf>) -> Self {
        let project_root = paths::absolutize(&project_root.into());
        Self {
            registry,
            engine: Box::new(HandlebarsEngine::new()),
            partial_dirs: PartialDirectories::for_project(&project_root),
            project_root,
        }
    }

    pub fn with_engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    pub fn with_partial_directories(mut self, partial_dirs: PartialDirectories) -> Self {
        self.partial_dirs = partial_dirs;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Destination ids the selector enables for this document.
    pub fn select(&self, document: &RulesetDocument, config: &ProjectConfig) -> Vec<String> {
        selector::select_destinations(document.frontmatter(), config, &self.registry.ids())
    }

    pub fn compile_document(
        &self,
        document: &RulesetDocument,
        request: &DestinationRequest,
        config: &ProjectConfig,
    ) -> Result<CompileReport, PipelineError> {
        self.compile_document_with(document, request, config, &CompileOptions::default())
    }

    /// Compiles one document to every requested destination.
    ///
    /// Returns `Err` only when every destination failed; partial failures are
    /// reported through [`CompileReport::outcome`].
    pub fn compile_document_with(
        &self,
        document: &RulesetDocument,
        request: &DestinationRequest,
        config: &ProjectConfig,
        options: &CompileOptions,
    ) -> Result<CompileReport, PipelineError> {
        let run = RunScope::new();
        let source_path = document.source_path_display();

        let destinations = match request {
            DestinationRequest::Auto => self.select(document, config),
            DestinationRequest::Only(ids) => {
                let mut unique: Vec<String> = Vec::with_capacity(ids.len());
                for id in ids {
                    if !unique.contains(id) {
                        unique.push(id.clone());
                    }
                }
                unique
            }
        };

        log::info!(
            "[{}] Compiling {} to {} destination(s)",
            run.id,
            source_path,
            destinations.len()
        );

        let mut results = Vec::with_capacity(destinations.len());
        for destination_id in &destinations {
            match self.compile_destination(&run, destination_id, document, config, options) {
                Ok((written, templating)) => {
                    log::debug!(
                        "[{}] {} -> {}: {} artifact(s)",
                        run.id,
                        source_path,
                        destination_id,
                        written.len()
                    );
                    results.push(DestinationResult::succeeded(destination_id, written, templating));
                }
                Err(error) => {
                    log::warn!("[{}] {} -> {} failed: {}", run.id, source_path, destination_id, error);
                    results.push(DestinationResult::failed(destination_id, error));
                }
            }
        }

        let report = CompileReport {
            run_id: run.id,
            source_path,
            started_at: run.started_at,
            results,
        };

        match report.outcome() {
            CompileOutcome::Empty => {
                log::debug!("[{}] No destinations selected for {}", run.id, report.source_path);
                Ok(report)
            }
            CompileOutcome::Success => {
                log::info!(
                    "[{}] Compiled {} to all {} destination(s)",
                    run.id,
                    report.source_path,
                    report.results.len()
                );
                Ok(report)
            }
            CompileOutcome::Failed { .. } => Err(PipelineError::AllDestinationsFailed {
                source_path: report.source_path,
                results: report.results,
            }),
            CompileOutcome::Partial { succeeded, failed } => {
                log::warn!(
                    "[{}] Compiled {} with partial success: {} succeeded, {} failed",
                    run.id,
                    report.source_path,
                    succeeded,
                    failed
                );
                Ok(report)
            }
        }
    }

    fn compile_destination(
        &self,
        run: &RunScope,
        destination_id: &str,
        document: &RulesetDocument,
        config: &ProjectConfig,
        options: &CompileOptions,
    ) -> Result<(Vec<WrittenArtifact>, TemplateDecision), DestinationError> {
        let provider = self
            .registry
            .get(destination_id)
            .ok_or_else(|| DestinationError::UnknownProvider(destination_id.to_string()))?;

        let log = ProviderLog::new(destination_id);
        let frontmatter = document.frontmatter();
        let mut destination_config = selector::destination_config(destination_id, frontmatter, config);

        let preparation = match provider.preparation() {
            Some(hook) => hook
                .prepare(&PrepareRequest {
                    document,
                    project: config,
                    destination: &destination_config,
                    log: &log,
                })
                .map_err(|source| DestinationError::Prepare {
                    destination: destination_id.to_string(),
                    source,
                })?,
            None => Preparation::default(),
        };

        let scoped_config = match &preparation.project_overrides {
            Some(overrides) => {
                let merged = config.merged_with(overrides);
                destination_config = selector::destination_config(destination_id, frontmatter, &merged);
                merged
            }
            None => config.clone(),
        };

        let templating = decide_templating(preparation.template.force, frontmatter, &scoped_config);
        log.debug(format_args!(
            "templating {} ({:?})",
            if templating.enabled { "on" } else { "off" },
            templating.authority
        ));

        let content = if templating.enabled {
            self.render(run, provider.as_ref(), document, &scoped_config, &preparation.template, options)?
        } else {
            document.source.contents.clone()
        };

        let compiled = CompiledDocument {
            source: document.source.clone(),
            metadata: document.metadata.clone(),
            ast: document.ast.clone(),
            output: CompiledOutput { content },
            context: CompilationContext {
                destination_id: destination_id.to_string(),
                merged_config: scoped_config.as_value(),
            },
        };

        let destination_path = paths::absolutize(&self.project_root.join(provider.default_destination()));
        let written = provider.write(&WriteRequest {
            document: &compiled,
            destination_path: &destination_path,
            config: &destination_config,
            project_root: &self.project_root,
            log: &log,
        })?;

        Ok((written, templating))
    }

    fn render(
        &self,
        run: &RunScope,
        provider: &dyn Provider,
        document: &RulesetDocument,
        scoped_config: &ProjectConfig,
        overrides: &TemplateOverrides,
        options: &CompileOptions,
    ) -> Result<String, DestinationError> {
        let mut partials = match &options.partials {
            Some(explicit) => explicit.clone(),
            None => run
                .ambient_partials
                .get_or_init(|| self.partial_dirs.discover(document.source.path.as_deref()))
                .clone(),
        };
        partials.extend(overrides.partials.clone());

        let render_options = RenderOptions {
            helpers: overrides.helpers.clone(),
            partials,
            strict: overrides.strict.unwrap_or(false),
            no_escape: overrides.no_escape.unwrap_or(true),
        };

        let context = self.template_context(run, provider, document, scoped_config)?;
        self.engine
            .render(&document.source.contents, &context, &render_options)
            .map_err(|source| DestinationError::Render {
                source_path: document.source_path_display(),
                destination: provider.id().to_string(),
                source,
            })
    }

    fn template_context(
        &self,
        run: &RunScope,
        provider: &dyn Provider,
        document: &RulesetDocument,
        scoped_config: &ProjectConfig,
    ) -> Result<Value, DestinationError> {
        let file_name = document
            .source
            .path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.source.id.clone());

        Ok(json!({
            "provider": {
                "id": provider.id(),
                "name": provider.name(),
            },
            "file": {
                "name": file_name,
                "path": document.source.path,
                "frontmatter": document.frontmatter(),
                "metadata": serde_json::to_value(&document.metadata)?,
            },
            "project": scoped_config.as_value(),
            "registry": {
                "destinations": self.registry.ids(),
            },
            "timestamp": run.started_at.to_rfc3339(),
        }))
    }
}
