// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rosemary - a conversational agent with structured long-term memory.
//!
//! This is the binary entry point.

mod commands;
mod doctor;
mod engine;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rosemary_config::model::RosemaryConfig;
use rosemary_core::RosemaryError;

use crate::commands::ExportFormat;
use crate::engine::Engine;

/// Rosemary - a conversational agent with structured long-term memory.
#[derive(Parser, Debug)]
#[command(name = "rosemary", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a prompt grounded in memory and remember the exchange.
    Ask {
        prompt: String,
        /// Topic groups injected as context; defaults to agent.top_k.
        #[arg(long)]
        top_k: Option<usize>,
        /// Do not store the exchange as a new memory.
        #[arg(long)]
        no_update: bool,
    },
    /// Store a fact in memory.
    Remember {
        text: String,
        /// Where the fact came from.
        #[arg(long)]
        source: Option<String>,
    },
    /// Show the memory relevant to a query.
    Recall {
        query: String,
        /// Similarity floor in [-1, 1]; defaults to memory.retrieval_min_score.
        #[arg(long, allow_hyphen_values = true)]
        min_score: Option<f32>,
        /// Print the bundle as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Generate insights for the least recently analyzed topics.
    Insights {
        /// Topics analyzed in this run; defaults to insights.batch_limit.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Write a snapshot of the memory graph.
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Dot)]
        format: ExportFormat,
        /// Directory the snapshot is written to.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Serve the local embedding model over HTTP.
    EmbedServer,
    /// Run diagnostic checks.
    Doctor {
        /// Also check the structure of the stored graph.
        #[arg(long)]
        deep: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => rosemary_config::load_and_validate_path(path),
        None => rosemary_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            rosemary_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);

    if let Err(e) = run(cli, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: RosemaryConfig) -> Result<(), RosemaryError> {
    match cli.command {
        Commands::Doctor { deep, plain } => {
            return doctor::run_doctor(cli.config.as_deref(), &config, deep, plain).await;
        }
        Commands::EmbedServer => return commands::run_embed_server(&config).await,
        _ => {}
    }

    let engine = Engine::open(config).await?;
    let result = match cli.command {
        Commands::Ask {
            prompt,
            top_k,
            no_update,
        } => commands::run_ask(&engine, &prompt, top_k, no_update).await,
        Commands::Remember { text, source } => {
            commands::run_remember(&engine, &text, source.as_deref()).await
        }
        Commands::Recall {
            query,
            min_score,
            json,
        } => commands::run_recall(&engine, &query, min_score, json).await,
        Commands::Insights { limit } => commands::run_insights(&engine, limit).await,
        Commands::Export { format, out } => commands::run_export(&engine, format, &out).await,
        Commands::EmbedServer | Commands::Doctor { .. } => Ok(()),
    };
    engine.shutdown().await?;
    result
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rosemary={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_recall_with_negative_threshold() {
        let cli = Cli::try_parse_from(["rosemary", "recall", "Paris", "--min-score", "-0.5"]).unwrap();
        match cli.command {
            Commands::Recall { query, min_score, .. } => {
                assert_eq!(query, "Paris");
                assert_eq!(min_score, Some(-0.5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn export_defaults_to_dot_in_current_dir() {
        let cli = Cli::try_parse_from(["rosemary", "export"]).unwrap();
        match cli.command {
            Commands::Export { format, out } => {
                assert_eq!(format, ExportFormat::Dot);
                assert_eq!(out, PathBuf::from("."));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = rosemary_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.agent.top_k, 5);
    }
}
