// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identifiers and id generation.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a task.
///
/// Task ids are opaque strings chosen by whoever submits the task; the
/// worker never parses them. Worker-originated (local) tasks get a fresh
/// UUID from an [`IdGen`] on every launch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new TaskId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this TaskId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for TaskId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TaskId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generator for fresh task ids.
///
/// Local tasks must get a *new* id on every launch (including relaunch
/// after coordinator recovery), so generation sits behind a trait.
pub trait IdGen: Send + Sync {
    fn generate(&self) -> TaskId;
}

/// Production id generator: random v4 UUIDs.
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn generate(&self) -> TaskId {
        TaskId::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Deterministic sequential ids for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct SeqIdGen {
    counter: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

#[cfg(any(test, feature = "test-support"))]
impl IdGen for SeqIdGen {
    fn generate(&self) -> TaskId {
        let n = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        TaskId::new(format!("local-{}", n))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
