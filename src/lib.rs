//! Rulesets Core - Multi-Destination Rule Compiler
//!
//! One ruleset document in, one artifact per enabled destination out.
//!
//! # Ground Rules
//! 1. Selection Never Invents Destinations
//! 2. One Destination Failing Never Stops the Others
//! 3. Incompatible Providers Are Never Invoked
//! 4. Same Input, Same Bytes
//! 5. Aggregated Files Do Not Depend on Arrival Order

pub mod aggregate;
pub mod capabilities;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod handshake;
pub mod hashing;
pub mod partials;
pub mod paths;
pub mod pipeline;
pub mod policy;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod selector;
pub mod templating;
pub mod writer;

pub use config::{ConfigError, ProjectConfig};
pub use diagnostics::{Diagnostic, Severity};
pub use document::{CompiledDocument, DocumentError, RulesetDocument};
pub use handshake::{check_compatibility, ProviderHandshake};
pub use hashing::content_digest;
pub use pipeline::{
    CompilationPipeline, CompileOptions, CompileOutcome, CompileReport, DestinationError,
    DestinationRequest, DestinationResult, PipelineError,
};
pub use policy::{TemplateAuthority, TemplateDecision};
pub use provider::{Provider, ProviderError};
pub use registry::ProviderRegistry;
pub use writer::{WriteError, WriteMode, WriteStatus, WrittenArtifact};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Provider SDK version; providers must declare the same major.
pub const SDK_VERSION: &str = "1.0.0";
