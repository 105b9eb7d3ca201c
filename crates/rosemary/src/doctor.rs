// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rosemary doctor` command implementation.
//!
//! Diagnoses the configuration, the graph store and both providers without
//! writing memory or downloading models.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rosemary_config::model::RosemaryConfig;
use rosemary_core::types::{Direction, EdgeType, NodeFilter, NodeLabel};
use rosemary_core::{GraphStore, HealthStatus, PluginAdapter, RosemaryError};
use rosemary_memory::{ModelManager, RemoteEmbedder};
use rosemary_openai::OpenAiProvider;
use rosemary_storage::SqliteGraphStore;

/// Status of a diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `rosemary doctor` command.
///
/// With `deep`, also walks the whole graph checking its structural rules.
pub async fn run_doctor(
    config_path: Option<&Path>,
    config: &RosemaryConfig,
    deep: bool,
    plain: bool,
) -> Result<(), RosemaryError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let mut results = vec![check_config(config_path)];
    let (db_result, store) = check_database(config).await;
    results.push(db_result);
    results.push(check_embedding(config).await);
    results.push(check_completion(config).await);
    if deep {
        match &store {
            Some(store) => results.push(check_graph(store.as_ref()).await),
            None => results.push(CheckResult::new(
                "Graph structure",
                CheckStatus::Warn,
                "store unavailable (skipped)",
                Instant::now(),
            )),
        }
    }

    println!();
    println!("  rosemary doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", render_line(result, use_color));
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep to check the graph structure.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let ms = result.duration.as_millis();
    if !use_color {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        return format!("    {tag} {:<18} {} ({ms}ms)", result.name, result.message);
    }

    use colored::Colorize;
    let (symbol, message) = match result.status {
        CheckStatus::Pass => ("✓".green(), result.message.normal()),
        CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
        CheckStatus::Fail => ("✗".red(), result.message.red()),
    };
    format!("    {symbol} {:<18} {message} ({ms}ms)", result.name)
}

fn check_config(path: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let loaded = match path {
        Some(path) => rosemary_config::load_and_validate_path(path),
        None => rosemary_config::load_and_validate(),
    };
    match loaded {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Opens the store and verifies its pinned dimensionality matches the config.
async fn check_database(config: &RosemaryConfig) -> (CheckResult, Option<Arc<SqliteGraphStore>>) {
    let start = Instant::now();
    let db_path = &config.storage.database_path;
    if !Path::new(db_path).exists() {
        let result = CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first run)"),
            start,
        );
        return (result, None);
    }

    let store = match SqliteGraphStore::open(&config.storage).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            let result = CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start);
            return (result, None);
        }
    };
    if let Err(e) = store.ensure_graph(config.embedding.dimensions).await {
        let result = CheckResult::new("Database", CheckStatus::Fail, e.to_string(), start);
        return (result, Some(store));
    }

    let result = match store.node_counts().await {
        Ok(counts) => {
            let summary = counts
                .iter()
                .map(|(label, count)| format!("{label} {count}"))
                .collect::<Vec<_>>()
                .join(", ");
            let message = if summary.is_empty() {
                "empty".to_string()
            } else {
                summary
            };
            CheckResult::new("Database", CheckStatus::Pass, message, start)
        }
        Err(e) => CheckResult::new("Database", CheckStatus::Fail, format!("query failed: {e}"), start),
    };
    (result, Some(store))
}

async fn check_embedding(config: &RosemaryConfig) -> CheckResult {
    let start = Instant::now();
    let embedding = &config.embedding;

    if let Some(url) = &embedding.service_url {
        let embedder = match RemoteEmbedder::new(url, embedding.dimensions, Duration::from_secs(3)) {
            Ok(embedder) => embedder,
            Err(e) => return CheckResult::new("Embedding", CheckStatus::Fail, e.to_string(), start),
        };
        return match embedder.health_check().await {
            Ok(HealthStatus::Healthy) => {
                CheckResult::new("Embedding", CheckStatus::Pass, format!("service at {url}"), start)
            }
            Ok(HealthStatus::Degraded(msg)) => CheckResult::new("Embedding", CheckStatus::Warn, msg, start),
            Ok(HealthStatus::Unhealthy(msg)) => CheckResult::new("Embedding", CheckStatus::Fail, msg, start),
            Err(e) => CheckResult::new("Embedding", CheckStatus::Fail, e.to_string(), start),
        };
    }

    let manager = ModelManager::from_config(embedding);
    if manager.is_model_available() {
        CheckResult::new(
            "Embedding",
            CheckStatus::Pass,
            format!("{} ({} dims)", embedding.model_name, embedding.dimensions),
            start,
        )
    } else {
        CheckResult::new(
            "Embedding",
            CheckStatus::Warn,
            format!("{} not downloaded (fetched on first run)", embedding.model_name),
            start,
        )
    }
}

async fn check_completion(config: &RosemaryConfig) -> CheckResult {
    let start = Instant::now();
    let provider = match OpenAiProvider::new(&config.completion) {
        Ok(provider) => provider,
        Err(RosemaryError::Config(msg)) => {
            return CheckResult::new("Completion", CheckStatus::Warn, msg, start);
        }
        Err(e) => return CheckResult::new("Completion", CheckStatus::Fail, e.to_string(), start),
    };
    match provider.health_check().await {
        Ok(HealthStatus::Healthy) => CheckResult::new(
            "Completion",
            CheckStatus::Pass,
            format!("model {}", config.completion.model),
            start,
        ),
        Ok(HealthStatus::Degraded(msg)) => CheckResult::new("Completion", CheckStatus::Warn, msg, start),
        Ok(HealthStatus::Unhealthy(msg)) => CheckResult::new("Completion", CheckStatus::Fail, msg, start),
        Err(e) => CheckResult::new("Completion", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Every Detail needs a Topic; every Topic exactly one Domain and at most one Summary.
async fn check_graph(store: &dyn GraphStore) -> CheckResult {
    let start = Instant::now();
    match graph_violations(store).await {
        Ok(violations) if violations.is_empty() => {
            CheckResult::new("Graph structure", CheckStatus::Pass, "consistent", start)
        }
        Ok(violations) => CheckResult::new(
            "Graph structure",
            CheckStatus::Fail,
            format!("{} violation(s), first: {}", violations.len(), violations[0]),
            start,
        ),
        Err(e) => CheckResult::new("Graph structure", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn graph_violations(store: &dyn GraphStore) -> Result<Vec<String>, RosemaryError> {
    let mut violations = Vec::new();

    for detail in store.scan_nodes(NodeLabel::Detail, &NodeFilter::all()).await? {
        let topics = store
            .neighbors(&detail.node_ref(), EdgeType::InTopic, Direction::Outgoing)
            .await?;
        if topics.is_empty() {
            violations.push(format!("detail {} has no topic", detail.key));
        }
    }

    for topic in store.scan_nodes(NodeLabel::Topic, &NodeFilter::all()).await? {
        let topic_ref = topic.node_ref();
        let domains = store
            .neighbors(&topic_ref, EdgeType::InDomain, Direction::Outgoing)
            .await?;
        if domains.len() != 1 {
            violations.push(format!("topic {} has {} domains", topic.key, domains.len()));
        }
        let summaries = store
            .neighbors(&topic_ref, EdgeType::HasSummary, Direction::Outgoing)
            .await?;
        if summaries.len() > 1 {
            violations.push(format!("topic {} has {} summaries", topic.key, summaries.len()));
        }
    }

    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosemary_core::types::{Edge, Node};

    fn config_with_db(path: &Path) -> RosemaryConfig {
        let mut config = RosemaryConfig::default();
        config.storage.database_path = path.to_string_lossy().into_owned();
        config
    }

    #[test]
    fn plain_lines_carry_status_tags() {
        let result = CheckResult {
            name: "Database".to_string(),
            status: CheckStatus::Warn,
            message: "not found".to_string(),
            duration: Duration::from_millis(3),
        };
        let line = render_line(&result, false);
        assert!(line.contains("[WARN]"));
        assert!(line.contains("not found"));
        assert!(line.ends_with("(3ms)"));
    }

    #[tokio::test]
    async fn missing_database_warns() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_db(&dir.path().join("absent.db"));
        let (result, store) = check_database(&config).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(store.is_none());
    }

    #[tokio::test]
    async fn existing_database_passes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_db(&dir.path().join("memory.db"));
        SqliteGraphStore::open(&config.storage).await.unwrap();

        let (result, store) = check_database(&config).await;
        assert_eq!(result.status, CheckStatus::Pass, "{}", result.message);
        assert!(store.is_some());
    }

    #[tokio::test]
    async fn dimension_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_db(&dir.path().join("memory.db"));
        {
            let store = SqliteGraphStore::open(&config.storage).await.unwrap();
            store.ensure_graph(16).await.unwrap();
        }

        let (result, _) = check_database(&config).await;
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn configured_api_key_passes_completion_check() {
        let mut config = RosemaryConfig::default();
        config.completion.api_key = Some("sk-test".to_string());
        let result = check_completion(&config).await;
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.message.contains("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn missing_model_warns() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RosemaryConfig::default();
        config.embedding.data_dir = dir.path().to_string_lossy().into_owned();
        let result = check_embedding(&config).await;
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[tokio::test]
    async fn orphan_detail_is_a_violation() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        store.ensure_graph(3).await.unwrap();
        store
            .upsert_node(
                &Node::new(NodeLabel::Detail, "d1")
                    .with_attr("text", "orphan")
                    .with_embedding(vec![1.0, 0.0, 0.0]),
            )
            .await
            .unwrap();

        let violations = graph_violations(&store).await.unwrap();
        assert_eq!(violations, vec!["detail d1 has no topic".to_string()]);

        store
            .upsert_node(&Node::new(NodeLabel::Topic, "t1").with_embedding(vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store.upsert_node(&Node::new(NodeLabel::Domain, "S")).await.unwrap();
        store
            .upsert_edge(&Edge::new(
                Node::new(NodeLabel::Detail, "d1").node_ref(),
                Node::new(NodeLabel::Topic, "t1").node_ref(),
                EdgeType::InTopic,
            ))
            .await
            .unwrap();
        store
            .upsert_edge(&Edge::new(
                Node::new(NodeLabel::Topic, "t1").node_ref(),
                Node::new(NodeLabel::Domain, "S").node_ref(),
                EdgeType::InDomain,
            ))
            .await
            .unwrap();

        assert!(graph_violations(&store).await.unwrap().is_empty());
        assert_eq!(check_graph(&store).await.status, CheckStatus::Pass);
    }
}
