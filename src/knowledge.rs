//! Bounded interface to the durable knowledge collaborator.
//!
//! The engine never reads or writes this store unboundedly: queries
//! return a capped summary with the matched topics listed, and appends
//! are capped the same way. The store itself is opaque; the in-memory
//! implementation here is for embedding and tests.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::util::truncate_bytes;
use crate::Result;

/// Byte cap on any summary crossing the store boundary.
pub const SUMMARY_CAP_BYTES: usize = 8192;

/// Maximum number of stored entries folded into one query summary.
pub const MAX_ENTRIES_PER_QUERY: usize = 20;

/// A size-capped summary returned from (or appended to) the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundedSummary {
    /// Topics from the query that matched stored entries.
    pub matched_topics: BTreeSet<String>,
    pub text: String,
}

impl BoundedSummary {
    pub fn new(matched_topics: BTreeSet<String>, text: &str) -> Self {
        Self {
            matched_topics,
            text: truncate_bytes(text, SUMMARY_CAP_BYTES),
        }
    }

    pub fn empty() -> Self {
        Self {
            matched_topics: BTreeSet::new(),
            text: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Append/query contract for the durable knowledge collaborator.
pub trait KnowledgeStore: Send + Sync {
    /// Summarize stored entries relevant to the given topics.
    fn query_summary(&self, topics: &BTreeSet<String>) -> Result<BoundedSummary>;

    /// Fold new findings into the store.
    fn append_findings(&mut self, summary: BoundedSummary) -> Result<()>;
}

/// In-memory store keyed by topic. Each entry is capped on insert so the
/// store can never hand back more than the summary cap per query.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    entries: BTreeMap<String, String>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, topic: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        self.entries.insert(
            topic.into().to_lowercase(),
            truncate_bytes(&text, SUMMARY_CAP_BYTES),
        );
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KnowledgeStore for InMemoryKnowledgeStore {
    fn query_summary(&self, topics: &BTreeSet<String>) -> Result<BoundedSummary> {
        let mut matched = BTreeSet::new();
        let mut parts = Vec::new();
        for topic in topics {
            if parts.len() >= MAX_ENTRIES_PER_QUERY {
                break;
            }
            if let Some(text) = self.entries.get(topic.to_lowercase().as_str()) {
                matched.insert(topic.clone());
                parts.push(format!("{}: {}", topic, text));
            }
        }
        Ok(BoundedSummary::new(matched, &parts.join("\n")))
    }

    fn append_findings(&mut self, summary: BoundedSummary) -> Result<()> {
        for topic in &summary.matched_topics {
            self.entries
                .entry(topic.to_lowercase())
                .or_insert_with(|| truncate_bytes(&summary.text, SUMMARY_CAP_BYTES));
        }
        // Findings with no matched topics still get retained under a
        // synthetic key so the next run can discover them.
        if summary.matched_topics.is_empty() && !summary.text.is_empty() {
            let key = format!("finding-{}", self.entries.len());
            self.entries
                .insert(key, truncate_bytes(&summary.text, SUMMARY_CAP_BYTES));
        }
        Ok(())
    }
}
