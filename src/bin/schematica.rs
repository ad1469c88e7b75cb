//! Schematica CLI
//!
//! Registers templates from a file, then validates, encodes or decodes data
//! against one of them.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use schematica::{SchemaRegistry, SchemaTemplate, SchematicaConfig};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schematica")]
#[command(about = "Validate, encode and decode data against registered schemas")]
struct Cli {
    /// File holding one template or an array of templates, registered in order
    #[arg(short, long)]
    schemas: Option<PathBuf>,

    /// Config file (defaults to schematica.toml and friends)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a JSON document against a schema
    Validate {
        /// Schema name
        schema: String,
        /// Input file (stdin if omitted)
        input: Option<PathBuf>,
    },

    /// Print the canonical encoding of a JSON document
    Encode {
        schema: String,
        input: Option<PathBuf>,
        /// Print the SHA-256 of the encoding instead
        #[arg(long)]
        fingerprint: bool,
    },

    /// Decode canonical text and pretty-print the value
    Decode {
        schema: String,
        input: Option<PathBuf>,
    },

    /// Report dangling references and recursive schema groups
    Check {
        /// Also list what this schema refers to and what refers to it
        #[arg(long)]
        schema: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref().map(path_str).transpose()?;
    let config = SchematicaConfig::load_from(config_path).context("loading configuration")?;

    let registry = SchemaRegistry::with_config(config);
    if let Some(path) = &cli.schemas {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let templates = SchemaTemplate::many_from_json_str(&text)?;
        let schemas = registry.add_templates(templates)?;
        tracing::info!(count = schemas.len(), path = %path.display(), "registered templates");
    }

    match cli.command {
        Commands::Validate { schema, input } => {
            let value: Value = serde_json::from_str(&read_input(input.as_deref())?)
                .context("input is not valid JSON")?;
            let validator = registry.build_validator(schema.as_str())?;
            match validator.check(&value) {
                Ok(()) => println!("✅ valid {}", schema),
                Err(violation) => {
                    println!("❌ invalid {}", schema);
                    println!("   └─ {}", violation);
                    std::process::exit(1);
                }
            }
        }

        Commands::Encode { schema, input, fingerprint } => {
            let value: Value = serde_json::from_str(&read_input(input.as_deref())?)
                .context("input is not valid JSON")?;
            let encoder = registry.build_serializer(schema.as_str())?;
            if fingerprint {
                println!("{}", encoder.fingerprint(&value)?);
            } else {
                println!("{}", encoder.encode(&value)?);
            }
        }

        Commands::Decode { schema, input } => {
            let text = read_input(input.as_deref())?;
            let decoder = registry.build_parser(schema.as_str())?;
            let value = decoder.decode(text.trim_end_matches(['\n', '\r']))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }

        Commands::Check { schema, json } => {
            let graph = registry.ref_graph();
            let analysis = graph.analyze();
            if let Some(name) = &schema {
                // Unknown names fail with a suggestion
                registry.get_schema(name)?;
            }
            if json {
                let report = match &schema {
                    Some(name) => serde_json::json!({
                        "analysis": analysis,
                        "schema": {
                            "name": name,
                            "dependencies": graph.dependencies_of(name),
                            "dependents": graph.dependents_of(name),
                            "closure": graph.closure(name),
                        }
                    }),
                    None => serde_json::to_value(&analysis)?,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "🔍 {} schemas registered, {} references",
                    analysis.schemas,
                    graph.edge_count()
                );
                if let Some(name) = &schema {
                    println!("  {} → {}", name, graph.dependencies_of(name).join(", "));
                    println!("  {} ← {}", name, graph.dependents_of(name).join(", "));
                    println!("  closure: {}", graph.closure(name).join(", "));
                }
                for group in &analysis.cycles {
                    println!("  ↻ recursive: {}", group.join(" ⇄ "));
                }
                for dangling in &analysis.dangling {
                    println!("  ❌ {} refers to unregistered `{}`", dangling.from, dangling.to);
                }
                if analysis.is_complete() {
                    println!("✅ All references resolve");
                }
            }
            if !analysis.is_complete() {
                std::process::exit(1);
            }
        }

        Commands::Config => print!("{}", registry.config().to_toml()?),
    }

    Ok(())
}

fn path_str(path: &Path) -> anyhow::Result<&str> {
    match path.to_str() {
        Some(s) => Ok(s),
        None => bail!("path {} is not valid UTF-8", path.display()),
    }
}

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            Ok(buf)
        }
    }
}
