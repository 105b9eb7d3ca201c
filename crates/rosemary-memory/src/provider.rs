// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text rendering of a [`MemoryBundle`] for prompt grounding.

use crate::types::MemoryBundle;

/// Header placed before the rendered bundle in a grounded prompt.
pub const CONTEXT_HEADER: &str = "Relevant memory:";

/// Renders a bundle as a numbered block, one entry per matched Detail.
///
/// A Detail filed under several Topics appears once, listing every Topic,
/// Domain, summary and insight it was found under. Topics matched only
/// through their Summary follow as Topic entries. An empty bundle renders
/// as the empty string.
pub fn format_bundle(bundle: &MemoryBundle) -> String {
    struct Entry<'a> {
        text: &'a str,
        topics: Vec<&'a str>,
        domains: Vec<&'a str>,
        summaries: Vec<&'a str>,
        insights: Vec<&'a str>,
    }

    fn push_unique<'a>(list: &mut Vec<&'a str>, value: &'a str) {
        if !list.contains(&value) {
            list.push(value);
        }
    }

    let mut order: Vec<&str> = Vec::new();
    let mut entries: Vec<Entry<'_>> = Vec::new();
    for group in &bundle.groups {
        for detail in &group.matched_details {
            let idx = match order.iter().position(|id| *id == detail.id) {
                Some(idx) => idx,
                None => {
                    order.push(&detail.id);
                    entries.push(Entry {
                        text: &detail.text,
                        topics: Vec::new(),
                        domains: Vec::new(),
                        summaries: Vec::new(),
                        insights: Vec::new(),
                    });
                    entries.len() - 1
                }
            };
            let entry = &mut entries[idx];
            push_unique(&mut entry.topics, &group.topic_label);
            push_unique(&mut entry.domains, &group.domain.label);
            if let Some(summary) = group.summary.as_deref() {
                push_unique(&mut entry.summaries, summary);
            }
            for insight in &group.insights {
                push_unique(&mut entry.insights, insight);
            }
        }
    }

    let mut lines = Vec::new();
    for (n, entry) in entries.iter().enumerate() {
        lines.push(format!("{}. Detail: {}", n + 1, entry.text));
        lines.push(format!("   Topics: {}", entry.topics.join(", ")));
        lines.push(format!("   Domains: {}", entry.domains.join(", ")));
        if !entry.summaries.is_empty() {
            lines.push(format!("   Summary: {}", entry.summaries.join(" | ")));
        }
        if !entry.insights.is_empty() {
            lines.push(format!("   Insights: {}", entry.insights.join(" | ")));
        }
    }

    let summary_only = bundle
        .groups
        .iter()
        .filter(|g| g.matched_details.is_empty())
        .filter_map(|g| g.summary.as_deref().map(|summary| (g, summary)));
    for (n, (group, summary)) in summary_only.enumerate() {
        lines.push(format!("{}. Topic: {}", entries.len() + n + 1, group.topic_label));
        lines.push(format!("   Domains: {}", group.domain.label));
        lines.push(format!("   Summary: {summary}"));
        if !group.insights.is_empty() {
            lines.push(format!("   Insights: {}", group.insights.join(" | ")));
        }
    }
    lines.join("\n")
}

/// Appends the rendered bundle to a prompt. Returns the prompt unchanged
/// when there is nothing to add.
pub fn ground_prompt(prompt: &str, bundle: &MemoryBundle) -> String {
    let context = format_bundle(bundle);
    if context.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt}\n\n{CONTEXT_HEADER}\n{context}")
    }
}
