//! Rulesets CLI - Compile rule documents for every configured destination
//!
//! Commands: providers, compile, check
//! Outputs JSON to stdout
//! Returns 2 when a document fails for every destination

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use rulesets_core::{
    check_compatibility, providers, CompilationPipeline, DestinationRequest, ProjectConfig,
    ProviderRegistry, RulesetDocument, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "rulesets-cli", version = ENGINE_VERSION)]
#[command(about = "Rulesets CLI - multi-destination rule compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List active and rejected providers
    Providers,

    /// Compile rule documents
    Compile {
        /// Rule documents (markdown with optional YAML frontmatter)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Only compile these destinations (repeatable)
        #[arg(short, long = "destination")]
        destinations: Vec<String>,

        /// Project config file (.json, .yaml, .yml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Project root
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// Check built-in providers against an SDK version
    Check {
        #[arg(long)]
        sdk: String,
    },
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn failure(error: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": error.to_string(),
    })
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Providers => {
            let registry = ProviderRegistry::builtin();
            let active: Vec<_> = registry
                .list()
                .map(|p| {
                    serde_json::json!({
                        "id": p.id(),
                        "name": p.name(),
                        "defaultDestination": p.default_destination(),
                        "handshake": p.handshake(),
                    })
                })
                .collect();

            print_json(&serde_json::json!({
                "engineVersion": ENGINE_VERSION,
                "sdkVersion": registry.expected_sdk(),
                "providers": active,
                "rejected": registry.rejected(),
            }));
            ExitCode::SUCCESS
        }

        Commands::Check { sdk } => {
            let report: Vec<_> = providers::builtin()
                .iter()
                .map(|p| {
                    let diagnostics = check_compatibility(&sdk, p.handshake());
                    serde_json::json!({
                        "id": p.id(),
                        "sdkVersion": p.handshake().sdk_version,
                        "compatible": diagnostics.is_empty(),
                        "diagnostics": diagnostics,
                    })
                })
                .collect();

            let compatible = report.iter().all(|r| r["compatible"] == true);
            print_json(&report);
            if compatible {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }

        Commands::Compile {
            files,
            destinations,
            config,
            root,
        } => {
            let project = match config {
                Some(path) => ProjectConfig::load(&path),
                None => ProjectConfig::discover(&root),
            };
            let project = match project {
                Ok(p) => p,
                Err(e) => {
                    print_json(&failure(format_args!("Failed to load config: {}", e)));
                    return ExitCode::FAILURE;
                }
            };

            let request = if destinations.is_empty() {
                DestinationRequest::Auto
            } else {
                DestinationRequest::Only(destinations)
            };

            // One pipeline for every file so aggregating providers see them all.
            let pipeline = CompilationPipeline::new(ProviderRegistry::builtin(), &root);
            let mut any_failed = false;
            let mut reports = Vec::with_capacity(files.len());

            for file in &files {
                let document = match fs::read_to_string(file)
                    .map_err(|e| e.to_string())
                    .and_then(|text| RulesetDocument::from_markdown(file, &text).map_err(|e| e.to_string()))
                {
                    Ok(d) => d,
                    Err(e) => {
                        any_failed = true;
                        reports.push(serde_json::json!({
                            "success": false,
                            "sourcePath": file,
                            "error": e,
                        }));
                        continue;
                    }
                };

                match pipeline.compile_document(&document, &request, &project) {
                    Ok(report) => reports.push(serde_json::json!({
                        "success": true,
                        "outcome": report.outcome(),
                        "report": report,
                    })),
                    Err(e) => {
                        any_failed = true;
                        reports.push(serde_json::json!({
                            "success": false,
                            "sourcePath": document.source_path_display(),
                            "error": e.to_string(),
                            "results": e.results(),
                        }));
                    }
                }
            }

            print_json(&reports);
            if any_failed {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
