// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory engine metrics via the `metrics` facade.
//!
//! Nothing is exported unless the host process installs a recorder.

use metrics::{describe_counter, describe_histogram};

/// Registers descriptions for every memory metric.
pub fn register_metrics() {
    describe_counter!("rosemary_details_stored_total", "Details persisted by the writer");
    describe_counter!("rosemary_topics_created_total", "Topics founded by the writer");
    describe_counter!(
        "rosemary_summary_failures_total",
        "Summary regenerations that failed after a successful store"
    );
    describe_counter!("rosemary_retrievals_total", "Retrieval requests served");
    describe_histogram!(
        "rosemary_retrieved_details",
        "Details returned per retrieval"
    );
    describe_counter!("rosemary_insights_generated_total", "Insights persisted");
}

pub fn record_detail_stored(domain: &str) {
    metrics::counter!("rosemary_details_stored_total", "domain" => domain.to_string()).increment(1);
}

pub fn record_topic_created(domain: &str) {
    metrics::counter!("rosemary_topics_created_total", "domain" => domain.to_string()).increment(1);
}

pub fn record_summary_failure() {
    metrics::counter!("rosemary_summary_failures_total").increment(1);
}

pub fn record_retrieval(degraded: bool, matched: usize) {
    let outcome = if degraded { "degraded" } else { "ok" };
    metrics::counter!("rosemary_retrievals_total", "outcome" => outcome).increment(1);
    metrics::histogram!("rosemary_retrieved_details").record(matched as f64);
}

pub fn record_insights(count: usize) {
    metrics::counter!("rosemary_insights_generated_total").increment(count as u64);
}
