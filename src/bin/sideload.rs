//! Sideload CLI
//!
//! Command-line interface for serializing object graphs and checking
//! registry declarations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use sideload::{
    check, describe, load_graph, load_registry_auto, FileStatus, LoadError, SchemaRegistry,
    SerializeOptions, Serializer, Severity,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sideload")]
#[command(about = "Serialize object graphs into side-loaded JSON envelopes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serialize an object graph against a registry
    Serialize {
        /// Registry source: file path or URL (http:// or https://)
        registry: String,

        /// Object graph file (JSON, with optional $id/$ref anchors)
        data: PathBuf,

        /// Resource type of the top-level value
        #[arg(long = "type", short = 't')]
        resource_type: String,

        /// Treat the top-level value as a list of resources
        #[arg(long)]
        many: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Keep duplicate side-loaded entries across batch items
        #[arg(long)]
        no_cross_dedup: bool,
    },

    /// Print the relationship map reachable from a resource type
    Links {
        /// Registry source: file path or URL (http:// or https://)
        registry: String,

        /// Resource type to describe
        #[arg(long = "type", short = 't')]
        resource_type: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check registry files for errors (syntax, shape, unresolved targets)
    Check {
        /// File or directory to check
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serialize {
            registry,
            data,
            resource_type,
            many,
            output,
            pretty,
            no_cross_dedup,
        } => run_serialize(SerializeArgs {
            registry,
            data,
            resource_type,
            many,
            output,
            pretty,
            cross_dedup: !no_cross_dedup,
        }),

        Commands::Links {
            registry,
            resource_type,
            pretty,
        } => run_links(&registry, &resource_type, pretty),

        Commands::Check {
            path,
            format,
            strict,
            quiet,
        } => run_check(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

struct SerializeArgs {
    registry: String,
    data: PathBuf,
    resource_type: String,
    many: bool,
    output: Option<PathBuf>,
    pretty: bool,
    cross_dedup: bool,
}

fn run_serialize(args: SerializeArgs) -> Result<(), u8> {
    let registry = load_registry(&args.registry)?;
    let schema = registry.get(&args.resource_type).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let (graph, root) = load_graph(&args.data).map_err(|e| report_load_error("loading data", e))?;

    let options = SerializeOptions::new().dedup_across_items(args.cross_dedup);
    let envelope = Serializer::with_options(&registry, options)
        .serialize(&graph, &root, schema, args.many)
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    let json_output = to_json(&envelope, args.pretty)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_links(registry_source: &str, resource_type: &str, pretty: bool) -> Result<(), u8> {
    let registry = load_registry(registry_source)?;
    let schema = registry.get(resource_type).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    println!("{}", to_json(&describe(&registry, schema), pretty)?);
    Ok(())
}

fn load_registry(source: &str) -> Result<SchemaRegistry, u8> {
    load_registry_auto(source).map_err(|e| report_load_error("loading registry", e))
}

/// Print a load error, listing declaration issues one per line.
fn report_load_error(context: &str, error: LoadError) -> u8 {
    eprintln!("Error {}: {}", context, error);
    if let LoadError::InvalidDeclaration { issues } = &error {
        for issue in issues {
            eprintln!("  {}", issue);
        }
    }
    error.exit_code() as u8
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })
}

fn run_check(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(3);
    }

    let result = check(path, strict);
    let passed = result.is_ok() && (!strict || result.warnings == 0);

    if format == "json" {
        println!("{}", to_json(&result, true)?);
    } else {
        if !quiet {
            println!("Checking {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if passed {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if passed {
        Ok(())
    } else {
        Err(1)
    }
}
