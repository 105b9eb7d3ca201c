// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Implementations of the memory subcommands.

use std::path::Path;
use std::sync::Arc;

use rosemary_config::model::RosemaryConfig;
use rosemary_core::RosemaryError;
use rosemary_embed_server::EmbedState;
use rosemary_memory::{RetrieveOptions, default_snapshot_path, format_bundle};
use tracing::info;

use crate::engine::{Engine, local_embedder};

/// Output format for `rosemary export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Graphviz DOT.
    Dot,
    /// Pretty-printed JSON.
    Json,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Dot => "dot",
            ExportFormat::Json => "json",
        }
    }
}

/// `rosemary ask`: one grounded agent turn.
pub async fn run_ask(
    engine: &Engine,
    prompt: &str,
    top_k: Option<usize>,
    no_update: bool,
) -> Result<(), RosemaryError> {
    let mut agent = engine.agent(top_k);
    if no_update {
        agent = agent.without_memory_updates();
    }
    let outcome = agent.turn(prompt).await?;
    if outcome.context.degraded {
        eprintln!("warning: memory unavailable, answering without it");
    }
    println!("{}", outcome.reply);
    if let Some(id) = outcome.stored_detail {
        info!(detail_id = %id, "turn remembered");
    }
    Ok(())
}

/// `rosemary remember`: stores one Detail.
pub async fn run_remember(
    engine: &Engine,
    text: &str,
    source: Option<&str>,
) -> Result<(), RosemaryError> {
    let report = engine.writer.store_with_source(text, source).await?;
    println!(
        "stored {} in domain {} (topics: {})",
        report.detail.id,
        report.domain_code,
        report.topic_ids.join(", ")
    );
    if !report.created_topics.is_empty() {
        println!("new topics: {}", report.created_topics.join(", "));
    }
    for (topic_id, cause) in &report.summary_failures {
        eprintln!("warning: summary for topic {topic_id} not refreshed: {cause}");
    }
    Ok(())
}

/// `rosemary recall`: prints the memory bundle for a query.
pub async fn run_recall(
    engine: &Engine,
    query: &str,
    min_score: Option<f32>,
    json: bool,
) -> Result<(), RosemaryError> {
    let options = RetrieveOptions {
        min_score,
        max_results: None,
    };
    let bundle = engine.retriever.retrieve_with(query, options).await?;

    if json {
        let out = serde_json::to_string_pretty(&bundle)
            .map_err(|e| RosemaryError::Internal(format!("bundle serialization failed: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    if bundle.degraded {
        eprintln!("warning: query could not be embedded, no memory searched");
    }
    if bundle.is_empty() {
        println!("No matching memory.");
    } else {
        println!("{}", format_bundle(&bundle));
    }
    Ok(())
}

/// `rosemary insights`: runs one insight batch.
pub async fn run_insights(engine: &Engine, limit: Option<usize>) -> Result<(), RosemaryError> {
    let limit = limit.unwrap_or(engine.config.insights.batch_limit);
    let insights = engine.insights().generate(limit).await?;
    if insights.is_empty() {
        println!("No new insights.");
    }
    for insight in &insights {
        println!("- [{}] {}", insight.scope.node_ref(), insight.text);
    }
    Ok(())
}

/// `rosemary export`: writes a graph snapshot into `out_dir`.
pub async fn run_export(
    engine: &Engine,
    format: ExportFormat,
    out_dir: &Path,
) -> Result<(), RosemaryError> {
    let exporter = engine.exporter();
    let content = match format {
        ExportFormat::Dot => exporter.export_dot().await?,
        ExportFormat::Json => exporter.export_json().await?,
    };

    tokio::fs::create_dir_all(out_dir).await.map_err(|e| {
        RosemaryError::Internal(format!("cannot create {}: {e}", out_dir.display()))
    })?;
    let path = default_snapshot_path(out_dir, format.extension());
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| RosemaryError::Internal(format!("cannot write {}: {e}", path.display())))?;

    println!("{}", path.display());
    if format == ExportFormat::Dot {
        eprintln!("render with: dot -Tpng {} -o graph.png", path.display());
    }
    Ok(())
}

/// `rosemary embed-server`: serves the local model over HTTP until Ctrl+C.
pub async fn run_embed_server(config: &RosemaryConfig) -> Result<(), RosemaryError> {
    let embedder = local_embedder(&config.embedding).await?;
    let state = EmbedState::new(Arc::new(embedder));
    rosemary_embed_server::serve(&config.embed_server.host, config.embed_server.port, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_extensions() {
        assert_eq!(ExportFormat::Dot.extension(), "dot");
        assert_eq!(ExportFormat::Json.extension(), "json");
    }
}
