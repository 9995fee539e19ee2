//! Task definitions for the engine.
//!
//! A [`Task`] is the original request: a free-text description, a set of
//! detected domain tags, and an optional prior-knowledge summary. It is
//! created once per run and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::util::truncate_bytes;
use crate::{Error, Result};

/// Byte cap applied to the prior-knowledge summary carried on a task.
pub const PRIOR_KNOWLEDGE_CAP: usize = 8 * 1024;

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub uuid::Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Short 8-char form for trace lines and logs.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declared difficulty of a task, as stated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Low,
    Medium,
    High,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Low => "low",
            Difficulty::Medium => "medium",
            Difficulty::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// The original request handed to the engine. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    /// Detected domain tags, e.g. "authentication" or "visualization".
    pub tags: BTreeSet<String>,
    pub difficulty: Difficulty,
    /// Bounded summary of what is already known about this topic, if any.
    pub prior_knowledge: Option<String>,
}

impl Task {
    /// Create a task, validating the description and capping the
    /// prior-knowledge summary.
    pub fn new(
        description: impl Into<String>,
        tags: BTreeSet<String>,
        difficulty: Difficulty,
        prior_knowledge: Option<String>,
    ) -> Result<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(Error::InsufficientInput);
        }
        Ok(Self {
            id: TaskId::new(),
            description,
            tags,
            difficulty,
            prior_knowledge: prior_knowledge
                .map(|s| truncate_bytes(&s, PRIOR_KNOWLEDGE_CAP)),
        })
    }

    /// Sub-topics extracted from the description: lowercased alphanumeric
    /// words longer than 3 chars, deduplicated.
    pub fn sub_topics(&self) -> BTreeSet<String> {
        self.description
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .map(|w| w.to_lowercase())
            .collect()
    }
}
