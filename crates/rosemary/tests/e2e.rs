// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the memory engine.
//!
//! Each test builds an isolated TestHarness over an in-memory SQLite graph
//! with the hashing embedder and scripted completion provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rosemary_config::model::MemoryConfig;
use rosemary_core::types::{CompletionPurpose, Direction, EdgeType, NodeLabel};
use rosemary_core::{GraphStore, RosemaryError};
use rosemary_memory::{Detail, InsightScope, RetrieveOptions, Topic};
use rosemary_test_utils::{FailingEmbedder, MockCompletion, SlowEmbedder, TestHarness, TEST_DIMENSIONS};

const TRAVEL: [&str; 5] = [
    "Paris hotels",
    "Paris restaurants",
    "Paris museums",
    "London budget",
    "Paris fashion",
];

/// Two-word Paris texts share one of two content words (cosine 0.5), so they
/// only cluster when the topic threshold sits below that.
const TRAVEL_TOPIC_THRESHOLD: f64 = 0.45;

async fn harness_with_threshold(topic_threshold: f64) -> TestHarness {
    let memory = MemoryConfig {
        topic_threshold,
        ..MemoryConfig::default()
    };
    TestHarness::builder()
        .with_memory_config(memory)
        .build()
        .await
        .unwrap()
}

async fn travel_harness() -> (TestHarness, Vec<Detail>) {
    let harness = harness_with_threshold(TRAVEL_TOPIC_THRESHOLD).await;
    let details = harness.store_all(&TRAVEL).await.unwrap();
    (harness, details)
}

// ---- Data model ----

#[tokio::test]
async fn test_every_detail_is_retrievable_by_its_own_text() {
    let (harness, details) = travel_harness().await;

    for detail in &details {
        let bundle = harness
            .retriever
            .retrieve_with(&detail.text, RetrieveOptions::min_score(0.0))
            .await
            .unwrap();
        assert!(
            bundle.detail_ids().contains(&detail.id),
            "{} not retrieved by its own text",
            detail.text
        );
    }
}

#[tokio::test]
async fn test_graph_invariants_hold_after_stores() {
    let (harness, _) = travel_harness().await;
    harness.check_invariants().await.unwrap();

    assert_eq!(harness.count(NodeLabel::Detail).await.unwrap(), 5);
    assert!(harness.count(NodeLabel::Domain).await.unwrap() >= 1);
    // One summary per topic once every regeneration succeeded.
    assert_eq!(
        harness.count(NodeLabel::Summary).await.unwrap(),
        harness.count(NodeLabel::Topic).await.unwrap()
    );
}

#[tokio::test]
async fn test_retrieval_is_monotonic_in_threshold() {
    let (harness, _) = travel_harness().await;

    let thresholds = [-1.0_f32, 0.0, 0.2, 0.35, 0.5, 0.8, 1.0];
    let mut previous: Option<Vec<String>> = None;
    for t in thresholds {
        let ids = harness
            .retriever
            .retrieve_with("Paris trip", RetrieveOptions::min_score(t))
            .await
            .unwrap()
            .detail_ids();
        if let Some(looser) = &previous {
            assert!(
                ids.iter().all(|id| looser.contains(id)),
                "threshold {t} returned a detail a lower threshold missed"
            );
        }
        previous = Some(ids);
    }
}

// ---- Topic assignment ----

#[tokio::test]
async fn test_near_duplicates_share_a_topic() {
    let harness = TestHarness::new().await.unwrap();
    let details = harness
        .store_all(&["I love Paris fashion", "I love shopping for fashion in Paris"])
        .await
        .unwrap();

    let first = harness.topics_of(&details[0].id).await.unwrap();
    let second = harness.topics_of(&details[1].id).await.unwrap();
    assert_eq!(harness.count(NodeLabel::Topic).await.unwrap(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_travel_scenario_groups_and_retrieves_paris() {
    let (harness, details) = travel_harness().await;
    let text_of: HashMap<String, String> = details
        .iter()
        .map(|d| (d.id.clone(), d.text.clone()))
        .collect();

    // At least four details under one Domain.
    let mut per_domain: HashMap<String, usize> = HashMap::new();
    for detail in &details {
        let topic = harness.topics_of(&detail.id).await.unwrap()[0].clone();
        let domain = harness.domains_of(&topic).await.unwrap()[0].clone();
        *per_domain.entry(domain).or_default() += 1;
    }
    assert!(per_domain.values().any(|&n| n >= 4), "{per_domain:?}");

    // One Topic gathers the Paris details.
    let mut best_paris_topic = 0;
    for topic in harness.topics().await.unwrap() {
        let members = harness
            .store
            .neighbors(&Topic::node_ref(&topic.id), EdgeType::InTopic, Direction::Incoming)
            .await
            .unwrap();
        let paris = members
            .iter()
            .filter(|n| text_of[&n.key].starts_with("Paris"))
            .count();
        best_paris_topic = best_paris_topic.max(paris);
    }
    assert_eq!(best_paris_topic, 4);
    assert_eq!(harness.count(NodeLabel::Topic).await.unwrap(), 2);

    let bundle = harness.retriever.retrieve("Paris").await.unwrap();
    let found: Vec<&str> = bundle
        .detail_ids()
        .iter()
        .map(|id| text_of[id].as_str())
        .collect();
    assert!(found.iter().filter(|t| t.starts_with("Paris")).count() >= 3, "{found:?}");
    assert!(!found.contains(&"London budget"));
}

#[tokio::test]
async fn test_topic_threshold_above_pair_similarity_splits_travel() {
    let harness = harness_with_threshold(0.6).await;
    harness.store_all(&TRAVEL).await.unwrap();

    assert_eq!(harness.count(NodeLabel::Topic).await.unwrap(), 5);
    harness.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_detail_links_secondary_topic_when_both_clear_threshold() {
    let harness = TestHarness::new().await.unwrap();
    let paris = harness.writer.store_with_source("Paris hotels", None).await.unwrap();
    let rome = harness.writer.store_with_source("Rome hotels", None).await.unwrap();
    assert_ne!(paris.topic_ids, rome.topic_ids);

    let both = harness
        .writer
        .store_with_source("Paris Rome hotels", None)
        .await
        .unwrap();
    assert_eq!(both.topic_ids.len(), 2);
    assert!(both.created_topics.is_empty());
    assert!(both.summary_failures.is_empty());

    let mut linked = harness.topics_of(&both.detail.id).await.unwrap();
    linked.sort();
    let mut expected = vec![paris.topic_ids[0].clone(), rome.topic_ids[0].clone()];
    expected.sort();
    assert_eq!(linked, expected);

    let regenerated = harness
        .completion
        .requests_for(CompletionPurpose::Summarize)
        .iter()
        .filter(|r| r.prompt.contains("- Paris Rome hotels"))
        .count();
    assert_eq!(regenerated, 2);
    for topic in harness.topics().await.unwrap() {
        assert_eq!(topic.detail_count, 2, "topic {}", topic.label);
    }
    assert_eq!(harness.count(NodeLabel::Summary).await.unwrap(), 2);
    harness.check_invariants().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stores_do_not_split_topics() {
    let harness = TestHarness::new().await.unwrap();

    let mut handles = Vec::new();
    for text in ["Paris trip: hotels", "Paris trip: restaurants", "Paris trip: museums", "Paris trip: fashion"] {
        let writer = Arc::clone(&harness.writer);
        handles.push(tokio::spawn(async move { writer.store(text).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(harness.count(NodeLabel::Detail).await.unwrap(), 4);
    assert_eq!(harness.count(NodeLabel::Topic).await.unwrap(), 1);
    harness.check_invariants().await.unwrap();
}

// ---- Domain classification ----

#[tokio::test]
async fn test_classified_domain_files_the_topic() {
    let harness = TestHarness::builder()
        .with_completion(MockCompletion::new().with_domain("A"))
        .build()
        .await
        .unwrap();
    let report = harness
        .writer
        .store_with_source("Sketching in the park", Some("cli"))
        .await
        .unwrap();

    assert_eq!(report.domain_code, "A");
    assert_eq!(harness.domains_of(&report.topic_ids[0]).await.unwrap(), vec!["A".to_string()]);
    assert_eq!(report.detail.source.as_deref(), Some("cli"));
}

#[tokio::test]
async fn test_out_of_vocabulary_domain_falls_back_to_default() {
    let harness = TestHarness::builder()
        .with_completion(MockCompletion::new().with_domain("Q"))
        .build()
        .await
        .unwrap();
    let report = harness
        .writer
        .store_with_source("Sketching in the park", None)
        .await
        .unwrap();

    assert_eq!(report.domain_code, "S");
    harness.check_invariants().await.unwrap();
}

// ---- Failures ----

#[tokio::test]
async fn test_blank_input_is_rejected_before_any_provider_call() {
    let harness = TestHarness::new().await.unwrap();

    let err = harness.writer.store("  \n").await.unwrap_err();
    assert!(matches!(err, RosemaryError::Validation { .. }), "{err:?}");
    let err = harness.retriever.retrieve("").await.unwrap_err();
    assert!(matches!(err, RosemaryError::Validation { .. }), "{err:?}");

    assert!(harness.completion.requests().is_empty());
    assert_eq!(harness.count(NodeLabel::Detail).await.unwrap(), 0);
    assert!(harness.store.scan_edges(None).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_embedding_timeout_leaves_no_trace() {
    let harness = TestHarness::builder()
        .with_embedder(Arc::new(SlowEmbedder::new(TEST_DIMENSIONS, Duration::from_secs(60))))
        .build()
        .await
        .unwrap();

    let err = harness.writer.store("Paris trip: hotels").await.unwrap_err();
    assert!(matches!(err, RosemaryError::Timeout { .. }), "{err:?}");

    assert_eq!(harness.count(NodeLabel::Detail).await.unwrap(), 0);
    assert_eq!(harness.count(NodeLabel::Topic).await.unwrap(), 0);
    assert!(harness.store.scan_edges(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_embedding_failure_leaves_no_trace() {
    let harness = TestHarness::builder()
        .with_embedder(Arc::new(FailingEmbedder::new(TEST_DIMENSIONS)))
        .build()
        .await
        .unwrap();

    let err = harness.writer.store("Paris trip: hotels").await.unwrap_err();
    assert!(err.is_provider_failure());
    assert_eq!(harness.count(NodeLabel::Detail).await.unwrap(), 0);
    assert!(harness.store.scan_edges(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_summary_failure_keeps_detail() {
    let harness = TestHarness::new().await.unwrap();
    harness.completion.fail(CompletionPurpose::Summarize);

    let report = harness
        .writer
        .store_with_source("Paris trip: hotels", Some("agent"))
        .await
        .unwrap();
    assert_eq!(report.summary_failures.len(), 1);
    assert_eq!(harness.count(NodeLabel::Summary).await.unwrap(), 0);

    let bundle = harness.retriever.retrieve("Paris trip: hotels").await.unwrap();
    assert_eq!(bundle.detail_ids(), vec![report.detail.id.clone()]);
    assert!(bundle.groups[0].summary.is_none());
    harness.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_retrieval_degrades_when_configured() {
    let memory = MemoryConfig {
        degrade_on_provider_error: true,
        ..MemoryConfig::default()
    };
    let harness = TestHarness::builder()
        .with_memory_config(memory)
        .with_embedder(Arc::new(FailingEmbedder::new(TEST_DIMENSIONS)))
        .build()
        .await
        .unwrap();

    let bundle = harness.retriever.retrieve("Paris").await.unwrap();
    assert!(bundle.degraded);
    assert!(bundle.is_empty());
}

#[tokio::test]
async fn test_retrieval_fails_without_degrade() {
    let harness = TestHarness::builder()
        .with_embedder(Arc::new(FailingEmbedder::new(TEST_DIMENSIONS)))
        .build()
        .await
        .unwrap();

    let err = harness.retriever.retrieve("Paris").await.unwrap_err();
    assert!(err.is_provider_failure());
}

#[tokio::test]
async fn test_topic_surfaces_through_its_summary_alone() {
    let harness = TestHarness::new().await.unwrap();
    harness.completion.add_rule(
        CompletionPurpose::Summarize,
        "Paris hotels",
        "Weekend getaway planning for spring",
    );
    let paris = harness.writer.store_with_source("Paris hotels", None).await.unwrap();
    let garden = harness
        .writer
        .store_with_source("Spring garden checklist", None)
        .await
        .unwrap();
    assert_ne!(paris.topic_ids, garden.topic_ids);

    let bundle = harness.retriever.retrieve("spring getaway").await.unwrap();
    assert_eq!(bundle.groups.len(), 2);

    // Matched only through the Summary, which outranks the garden Detail.
    let first = &bundle.groups[0];
    assert_eq!(first.topic_id, paris.topic_ids[0]);
    assert!(first.matched_details.is_empty());
    assert_eq!(first.summary.as_deref(), Some("Weekend getaway planning for spring"));
    let summary_score = first.summary_score.unwrap();
    assert!((summary_score - 0.7071).abs() < 1e-3, "{summary_score}");

    let second = &bundle.groups[1];
    assert_eq!(second.topic_id, garden.topic_ids[0]);
    assert!(second.summary_score.is_none());
    assert!(second.best_score() < first.best_score());
    assert_eq!(bundle.detail_ids(), vec![garden.detail.id.clone()]);

    let context = rosemary_memory::format_bundle(&bundle);
    assert!(context.contains("2. Topic: Paris hotels"));
    assert!(context.contains("Summary: Weekend getaway planning for spring"));
}

#[tokio::test]
async fn test_empty_store_retrieves_empty_bundle() {
    let harness = TestHarness::new().await.unwrap();
    let bundle = harness.retriever.retrieve("anything at all").await.unwrap();
    assert!(bundle.is_empty());
    assert!(!bundle.degraded);
}

// ---- Insights ----

#[tokio::test]
async fn test_insights_attach_to_topics_and_surface_in_retrieval() {
    let (harness, _) = travel_harness().await;
    let topics = harness.count(NodeLabel::Topic).await.unwrap();

    let insights = harness.insights.generate(25).await.unwrap();
    assert_eq!(insights.len(), topics);
    assert_eq!(harness.count(NodeLabel::Insight).await.unwrap(), topics);

    let bundle = harness.retriever.retrieve("Paris").await.unwrap();
    assert!(bundle.groups.iter().all(|g| !g.insights.is_empty()));
}

#[tokio::test]
async fn test_insight_runs_prefer_unanalyzed_topics() {
    let (harness, _) = travel_harness().await;
    assert_eq!(harness.count(NodeLabel::Topic).await.unwrap(), 2);

    let first = harness.insights.generate(1).await.unwrap();
    let second = harness.insights.generate(1).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0].scope, second[0].scope);

    let analyzed = harness
        .topics()
        .await
        .unwrap()
        .iter()
        .filter(|t| t.last_analyzed_at.is_some())
        .count();
    assert_eq!(analyzed, 2);
}

#[tokio::test]
async fn test_insight_failure_on_one_topic_spares_the_rest() {
    let harness = TestHarness::new().await.unwrap();
    let paris = harness.writer.store_with_source("Paris hotels", None).await.unwrap();
    let london = harness.writer.store_with_source("London budget", None).await.unwrap();
    harness
        .completion
        .fail_when(CompletionPurpose::Insight, "Topic: London budget");

    let insights = harness.insights.generate(25).await.unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].scope, InsightScope::Topic(paris.topic_ids[0].clone()));

    let london_insights = harness
        .store
        .neighbors(&Topic::node_ref(&london.topic_ids[0]), EdgeType::About, Direction::Incoming)
        .await
        .unwrap();
    assert!(london_insights.is_empty());
    assert_eq!(harness.completion.requests_for(CompletionPurpose::Insight).len(), 2);

    for topic in harness.topics().await.unwrap() {
        assert!(topic.last_analyzed_at.is_some(), "topic {} not stamped", topic.label);
    }
}

// ---- Agent turn ----

#[tokio::test]
async fn test_agent_turn_grounds_prompt_and_remembers_exchange() {
    let (harness, _) = travel_harness().await;

    let outcome = harness.agent(5).turn("Paris trip").await.unwrap();
    assert_eq!(outcome.reply, "mock reply");
    assert!(!outcome.context.is_empty());

    let chat = harness.completion.requests_for(CompletionPurpose::Chat);
    assert_eq!(chat.len(), 1);
    assert!(chat[0].prompt.contains("Relevant memory:"));
    assert!(chat[0].prompt.contains("Paris hotels"));

    let id = outcome.stored_detail.expect("exchange should be stored");
    let node = harness
        .store
        .get_node(NodeLabel::Detail, &id)
        .await
        .unwrap()
        .unwrap();
    let detail = Detail::from_node(&node).unwrap();
    assert_eq!(detail.source.as_deref(), Some("cli"));
    assert_eq!(detail.text, "User: Paris trip\nAgent: mock reply");
}

#[tokio::test]
async fn test_agent_turn_without_updates_stores_nothing() {
    let harness = TestHarness::builder()
        .with_completion(MockCompletion::new().with_domain("A"))
        .build()
        .await
        .unwrap();

    let outcome = harness
        .agent(5)
        .without_memory_updates()
        .turn("hello")
        .await
        .unwrap();
    assert!(outcome.stored_detail.is_none());
    assert!(outcome.context.is_empty());
    assert_eq!(harness.count(NodeLabel::Detail).await.unwrap(), 0);
}

// ---- Export ----

#[tokio::test]
async fn test_export_is_stable_on_unchanged_store() {
    let (harness, _) = travel_harness().await;

    let dot_a = harness.exporter.export_dot().await.unwrap();
    let dot_b = harness.exporter.export_dot().await.unwrap();
    assert_eq!(dot_a, dot_b);
    assert!(dot_a.contains("IN_TOPIC"));

    let json_a = harness.exporter.export_json().await.unwrap();
    let json_b = harness.exporter.export_json().await.unwrap();
    assert_eq!(json_a, json_b);
}

#[tokio::test]
async fn test_export_of_empty_store_is_empty_digraph() {
    let harness = TestHarness::new().await.unwrap();
    let snapshot = harness.exporter.snapshot().await.unwrap();
    assert!(snapshot.is_empty());

    let dot = harness.exporter.export_dot().await.unwrap();
    assert!(dot.starts_with("digraph Memory {"));
    assert!(!dot.contains("->"));
}
