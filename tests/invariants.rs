//! Contract Invariant Tests
//!
//! These tests verify the guarantees every compilation run must keep.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use rulesets_core::{
    capabilities,
    diagnostics::Diagnostic,
    partials::PartialDirectories,
    paths::{self, DirectoryCheck},
    provider::{
        CompileArtifact, CompileRequest, CompileResult, PrepareCompilation, PrepareRequest,
        Preparation, WriteRequest,
    },
    providers::{self, CopilotProvider, CursorProvider, WindsurfProvider},
    templating::{self, RenderOptions, TemplateEngine, TemplateError},
    writer::FsOperation,
    CompilationPipeline, CompileOptions, CompileOutcome, DestinationError,
    DestinationRequest, PipelineError, ProjectConfig, Provider, ProviderError, ProviderHandshake,
    ProviderRegistry, RulesetDocument, TemplateAuthority, WriteError, WriteStatus,
};

/// Writes the compiled body verbatim to `<base>/<id>/<stem>.md`, or fails.
struct FakeProvider {
    handshake: ProviderHandshake,
    base: String,
    fail: bool,
}

impl FakeProvider {
    fn ok(id: &str) -> Self {
        Self {
            handshake: ProviderHandshake::new(id, "0.1.0", [capabilities::OUTPUT_MARKDOWN]),
            base: format!("out/{}", id),
            fail: false,
        }
    }

    fn failing(id: &str) -> Self {
        Self {
            fail: true,
            ..Self::ok(id)
        }
    }
}

impl Provider for FakeProvider {
    fn handshake(&self) -> &ProviderHandshake {
        &self.handshake
    }

    fn default_destination(&self) -> &str {
        &self.base
    }

    fn output_path(&self, request: &WriteRequest<'_>) -> PathBuf {
        let fallback = paths::fallback_filename(
            request.document.source.path.as_deref(),
            &request.document.source.id,
            "md",
        );
        paths::resolve_output_path(
            request.destination_path,
            request.config.output_override(),
            &fallback,
            DirectoryCheck::Lexical,
        )
    }

    fn compile(&self, request: &CompileRequest<'_>) -> CompileResult {
        if self.fail {
            return Err(ProviderError::Compile(vec![Diagnostic::error(
                "fake.failure",
                format!("{} always fails", self.handshake.provider_id),
            )]));
        }
        Ok(vec![CompileArtifact::new(
            request.target.clone(),
            request.document.output.content.clone(),
        )])
    }
}

/// Forces templating, adds a helper and a project override.
struct PreparingProvider {
    inner: FakeProvider,
}

impl Provider for PreparingProvider {
    fn handshake(&self) -> &ProviderHandshake {
        self.inner.handshake()
    }

    fn default_destination(&self) -> &str {
        self.inner.default_destination()
    }

    fn output_path(&self, request: &WriteRequest<'_>) -> PathBuf {
        self.inner.output_path(request)
    }

    fn compile(&self, request: &CompileRequest<'_>) -> CompileResult {
        self.inner.compile(request)
    }

    fn preparation(&self) -> Option<&dyn PrepareCompilation> {
        Some(self)
    }
}

impl PrepareCompilation for PreparingProvider {
    fn prepare(&self, _request: &PrepareRequest<'_>) -> Result<Preparation, ProviderError> {
        let mut preparation = Preparation {
            project_overrides: Some(json!({"team": "core"})),
            ..Preparation::default()
        };
        preparation.template.force = Some(true);
        preparation.template.helpers.insert(
            "shout".into(),
            templating::helper(|args| {
                let text = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(Value::String(format!("{}!", text)))
            }),
        );
        Ok(preparation)
    }
}

fn pipeline(root: &Path, providers: Vec<Arc<dyn Provider>>) -> CompilationPipeline {
    CompilationPipeline::new(ProviderRegistry::load(providers), root)
        .with_partial_directories(PartialDirectories::project_only(root))
}

fn builtin_pipeline(root: &Path) -> CompilationPipeline {
    CompilationPipeline::new(ProviderRegistry::builtin(), root)
        .with_partial_directories(PartialDirectories::project_only(root))
}

fn document(root: &Path, name: &str, body: &str, frontmatter: Value) -> RulesetDocument {
    RulesetDocument::new(name, body, frontmatter).with_path(root.join("rules").join(name))
}

fn only(ids: &[&str]) -> DestinationRequest {
    DestinationRequest::Only(ids.iter().map(|id| id.to_string()).collect())
}

fn read(path: PathBuf) -> String {
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

#[test]
fn invariant_one_failure_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = pipeline(
        root,
        vec![
            Arc::new(FakeProvider::ok("a")),
            Arc::new(FakeProvider::failing("b")),
            Arc::new(FakeProvider::ok("c")),
        ],
    );

    let doc = document(root, "doc.md", "Body", json!({}));
    let report = pipeline
        .compile_document(&doc, &only(&["a", "b", "c"]), &ProjectConfig::new())
        .expect("partial success is still Ok");

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.outcome(), CompileOutcome::Partial { succeeded: 2, failed: 1 });
    assert!(report.result("a").unwrap().success);
    assert!(report.result("c").unwrap().success);

    let failed = report.result("b").unwrap();
    assert!(!failed.success);
    assert!(failed.error.as_ref().unwrap().to_string().contains("fake.failure"));

    assert_eq!(read(root.join("out/a/doc.md")), "Body");
    assert_eq!(read(root.join("out/c/doc.md")), "Body");
    assert!(!root.join("out/b").exists());
}

#[test]
fn invariant_total_failure_is_an_error() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = pipeline(
        root,
        vec![Arc::new(FakeProvider::failing("a")), Arc::new(FakeProvider::failing("b"))],
    );

    let doc = document(root, "doc.md", "Body", json!({}));
    let err = pipeline
        .compile_document(&doc, &only(&["a", "b"]), &ProjectConfig::new())
        .unwrap_err();

    let PipelineError::AllDestinationsFailed { source_path, results } = &err;
    assert!(source_path.ends_with("doc.md"));
    assert_eq!(results.len(), 2);
    assert!(err.to_string().contains("a: "));
    assert!(err.to_string().contains("b: "));
}

#[test]
fn invariant_incompatible_provider_never_invoked() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    let mut future = FakeProvider::ok("future");
    future.handshake = future.handshake.with_sdk_version("2.0.0");
    let pipeline = pipeline(root, vec![Arc::new(future), Arc::new(FakeProvider::ok("now"))]);

    assert!(!pipeline.registry().contains("future"));
    assert_eq!(pipeline.registry().ids(), vec!["now"]);

    let rejected = pipeline.registry().rejected();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].diagnostics[0].code, "sdk.incompatible");
    assert!(rejected[0].diagnostics[0].message.contains("2.0.0"));

    let doc = document(root, "doc.md", "Body", json!({}));
    let report = pipeline
        .compile_document(&doc, &only(&["future", "now"]), &ProjectConfig::new())
        .unwrap();

    let result = report.result("future").unwrap();
    assert!(matches!(result.error, Some(DestinationError::UnknownProvider(ref id)) if id == "future"));
    assert!(!root.join("out/future").exists());
}

#[test]
fn invariant_auto_selection_stays_within_registry() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = pipeline(
        root,
        vec![
            Arc::new(CursorProvider::new()),
            Arc::new(WindsurfProvider::new()),
            Arc::new(CopilotProvider::new()),
        ],
    );

    let doc = document(
        root,
        "style.md",
        "Body",
        json!({"cursor": {"enabled": true}, "windsurf": false, "unknown-tool": {"enabled": true}}),
    );
    let selected = pipeline.select(&doc, &ProjectConfig::new());
    assert_eq!(selected, vec!["cursor", "copilot"]);

    let report = pipeline
        .compile_document(&doc, &DestinationRequest::Auto, &ProjectConfig::new())
        .unwrap();
    let ids: Vec<&str> = report.results.iter().map(|r| r.destination_id.as_str()).collect();
    assert_eq!(ids, vec!["cursor", "copilot"]);
}

#[test]
fn invariant_recompile_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = builtin_pipeline(root);
    let doc = document(root, "style.md", "# Style\n\nUse tabs.\n", json!({}));

    let first = pipeline
        .compile_document(&doc, &only(&["claude-code", "cursor"]), &ProjectConfig::new())
        .unwrap();
    let before = read(root.join("CLAUDE.md"));
    let second = pipeline
        .compile_document(&doc, &only(&["claude-code", "cursor"]), &ProjectConfig::new())
        .unwrap();

    assert_eq!(read(root.join("CLAUDE.md")), before);
    for id in ["claude-code", "cursor"] {
        let a = &first.result(id).unwrap().written[0];
        let b = &second.result(id).unwrap().written[0];
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.status, WriteStatus::Written);
        assert_eq!(b.status, WriteStatus::Unchanged);
    }
}

#[test]
fn invariant_templating_off_keeps_markers_literally() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = builtin_pipeline(root);
    let doc = document(root, "doc.md", "Hello {{uppercase name}}", json!({"name": "x"}));

    let report = pipeline
        .compile_document(&doc, &only(&["cline"]), &ProjectConfig::new())
        .unwrap();

    let decision = report.result("cline").unwrap().templating.unwrap();
    assert!(!decision.enabled);
    assert_eq!(decision.authority, TemplateAuthority::Default);
    assert_eq!(read(root.join(".clinerules/doc.md")), "Hello {{uppercase name}}\n");
}

#[test]
fn test_templating_enabled_by_frontmatter_and_project() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = builtin_pipeline(root);

    let doc = document(
        root,
        "doc.md",
        "{{uppercase file.frontmatter.name}} for {{provider.id}}",
        json!({"name": "x", "rule": {"template": true}}),
    );
    pipeline
        .compile_document(&doc, &only(&["cline"]), &ProjectConfig::new())
        .unwrap();
    assert_eq!(read(root.join(".clinerules/doc.md")), "X for cline\n");

    let plain = document(root, "plain.md", "{{project.name}}", json!({}));
    let project = ProjectConfig::from_value(json!({"name": "demo", "rule": {"template": true}}));
    let report = pipeline
        .compile_document(&plain, &only(&["cline"]), &project)
        .unwrap();
    assert_eq!(
        report.result("cline").unwrap().templating.unwrap().authority,
        TemplateAuthority::Project
    );
    assert_eq!(read(root.join(".clinerules/plain.md")), "demo\n");
}

#[test]
fn test_preparation_hook_forces_templating_with_helpers_and_overrides() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = pipeline(
        root,
        vec![Arc::new(PreparingProvider {
            inner: FakeProvider::ok("prep"),
        })],
    );

    let doc = document(
        root,
        "doc.md",
        "{{shout file.name}} {{project.team}}",
        json!({"rule": {"template": false}}),
    );
    let report = pipeline
        .compile_document(&doc, &only(&["prep"]), &ProjectConfig::new())
        .unwrap();

    let decision = report.result("prep").unwrap().templating.unwrap();
    assert!(decision.enabled);
    assert_eq!(decision.authority, TemplateAuthority::Provider);
    assert_eq!(read(root.join("out/prep/doc.md")), "doc.md! core");
}

#[test]
fn test_render_failure_names_source_and_destination() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = pipeline(root, vec![Arc::new(FakeProvider::ok("a"))]);

    let doc = document(root, "broken.md", "{{#if}}", json!({"rule": {"template": true}}));
    let err = pipeline
        .compile_document(&doc, &only(&["a"]), &ProjectConfig::new())
        .unwrap_err();

    let message = err.results()[0].error.as_ref().unwrap().to_string();
    assert!(message.contains("broken.md"));
    assert!(message.contains("'a'"));
}

#[test]
fn test_partials_explicit_replace_ambient() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let project_partials = root.join(".rulesets/partials");
    fs::create_dir_all(&project_partials).unwrap();
    fs::write(project_partials.join("footer.hbs"), "project").unwrap();
    fs::write(project_partials.join("header.hbs"), "top").unwrap();

    let pipeline = pipeline(root, vec![Arc::new(FakeProvider::ok("a"))]);
    let doc = document(
        root,
        "doc.md",
        "[{{> header}}|{{> footer}}]",
        json!({"rule": {"template": true}}),
    );

    pipeline
        .compile_document(&doc, &only(&["a"]), &ProjectConfig::new())
        .unwrap();
    assert_eq!(read(root.join("out/a/doc.md")), "[top|project]");

    let adjacent = root.join("rules/_partials");
    fs::create_dir_all(&adjacent).unwrap();
    fs::write(adjacent.join("footer.md"), "adjacent").unwrap();
    pipeline
        .compile_document(&doc, &only(&["a"]), &ProjectConfig::new())
        .unwrap();
    assert_eq!(read(root.join("out/a/doc.md")), "[top|adjacent]");

    let options = CompileOptions {
        partials: Some(BTreeMap::from([
            ("header".to_string(), "H".to_string()),
            ("footer".to_string(), "explicit".to_string()),
        ])),
    };
    pipeline
        .compile_document_with(&doc, &only(&["a"]), &ProjectConfig::new(), &options)
        .unwrap();
    assert_eq!(read(root.join("out/a/doc.md")), "[H|explicit]");
}

#[test]
fn invariant_aggregate_independent_of_order() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();

    let compile_in = |root: &Path, names: &[&str]| {
        let pipeline = builtin_pipeline(root);
        for name in names {
            let doc = document(root, name, &format!("Rules from {}", name), json!({}));
            pipeline
                .compile_document(&doc, &only(&["agents-md"]), &ProjectConfig::new())
                .unwrap();
        }
        read(root.join("AGENTS.md"))
    };

    let forward = compile_in(first.path(), &["a.md", "b.md", "c.md"]);
    let backward = compile_in(second.path(), &["c.md", "a.md", "b.md"]);

    assert_eq!(forward, backward);
    let a = forward.find("rules/a.md").unwrap();
    let b = forward.find("rules/b.md").unwrap();
    let c = forward.find("rules/c.md").unwrap();
    assert!(a < b && b < c);
}

#[test]
fn test_unsupported_format_fails_with_capability_diagnostic() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = builtin_pipeline(root);
    let doc = document(root, "style.md", "Body", json!({"cursor": {"format": "xml"}}));

    let report = pipeline
        .compile_document(&doc, &only(&["cursor", "cline"]), &ProjectConfig::new())
        .unwrap();

    let cursor = report.result("cursor").unwrap();
    assert!(!cursor.success);
    let message = cursor.error.as_ref().unwrap().to_string();
    assert!(message.contains("capability.unsupported"));
    assert!(message.contains(capabilities::OUTPUT_XML));
    assert!(report.result("cline").unwrap().success);
}

#[test]
fn test_builtin_output_locations() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = builtin_pipeline(root);
    let doc = document(root, "style.rule.md", "Body", json!({}));

    let report = pipeline
        .compile_document(&doc, &DestinationRequest::Auto, &ProjectConfig::new())
        .unwrap();
    assert_eq!(report.outcome(), CompileOutcome::Success);
    assert_eq!(report.results.len(), providers::builtin().len());

    for relative in [
        ".cursor/rules/style.mdc",
        ".windsurf/rules/style.md",
        "CLAUDE.md",
        ".github/instructions/style.instructions.md",
        ".clinerules/style.md",
        ".roo/rules/style.md",
        "AGENTS.md",
        ".codex/rules/style.md",
        ".codex/AGENTS.md",
    ] {
        assert!(root.join(relative).is_file(), "missing {}", relative);
    }
}

#[test]
fn test_output_override_from_project_config() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pipeline = builtin_pipeline(root);
    let doc = document(root, "style.md", "Body", json!({}));
    let project = ProjectConfig::from_value(json!({
        "providers": {"claude-code": {"config": {"outputPath": "docs/AI.md"}}}
    }));

    let report = pipeline
        .compile_document(&doc, &only(&["claude-code"]), &project)
        .unwrap();

    assert_eq!(report.result("claude-code").unwrap().written[0].path, root.join("docs/AI.md"));
}

#[test]
fn invariant_write_failure_is_isolated() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let blocked = root.join(".clinerules/style.md");
    fs::create_dir_all(&blocked).unwrap();

    let pipeline = builtin_pipeline(root);
    let doc = document(root, "style.md", "Body", json!({}));
    let report = pipeline
        .compile_document(&doc, &only(&["cline", "claude-code"]), &ProjectConfig::new())
        .unwrap();

    let cline = report.result("cline").unwrap();
    assert!(!cline.success);
    match &cline.error {
        Some(DestinationError::Provider(ProviderError::Write(WriteError { operation, path, .. }))) => {
            assert_eq!(*operation, FsOperation::Stat);
            assert_eq!(path, &blocked);
        }
        other => panic!("expected a write error, got {:?}", other),
    }

    assert!(report.result("claude-code").unwrap().success);
    assert_eq!(read(root.join("CLAUDE.md")), "Body\n");
}

/// Records the partial names each render sees, and drops a new partial into
/// the project directory after every render.
struct RecordingEngine {
    seen: Arc<Mutex<Vec<Vec<String>>>>,
    late_partial: PathBuf,
}

impl TemplateEngine for RecordingEngine {
    fn render(&self, body: &str, _context: &Value, options: &RenderOptions) -> Result<String, TemplateError> {
        let names = options.partials.keys().cloned().collect();
        self.seen.lock().unwrap().push(names);
        fs::write(&self.late_partial, "late").unwrap();
        Ok(body.to_string())
    }
}

#[test]
fn invariant_partials_discovered_once_per_run() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let partial_dir = root.join(".rulesets/partials");
    fs::create_dir_all(&partial_dir).unwrap();
    fs::write(partial_dir.join("early.hbs"), "early").unwrap();

    let seen = Arc::new(Mutex::new(vec![]));
    let pipeline = pipeline(
        root,
        vec![Arc::new(FakeProvider::ok("a")), Arc::new(FakeProvider::ok("b"))],
    )
    .with_engine(RecordingEngine {
        seen: Arc::clone(&seen),
        late_partial: partial_dir.join("late.hbs"),
    });

    let doc = document(root, "doc.md", "Body", json!({"rule": {"template": true}}));
    pipeline
        .compile_document(&doc, &only(&["a", "b"]), &ProjectConfig::new())
        .unwrap();

    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], vec!["early"]);
        assert_eq!(seen[1], vec!["early"]);
    }

    pipeline
        .compile_document(&doc, &only(&["a"]), &ProjectConfig::new())
        .unwrap();
    assert_eq!(seen.lock().unwrap()[2], vec!["early", "late"]);
}
