// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task record stored in the coordinator hash.

use serde_json::Value;

/// Field names of the per-task coordinator hash.
pub mod fields {
    /// Symbolic class name, resolved against the worker's registry
    pub const TASK: &str = "task";
    /// Serialized construction arguments (a JSON object)
    pub const DATA: &str = "data";
    /// Wire name of the task's lifecycle state
    pub const STATE: &str = "state";
    /// Final payload: return value, error message, or failure trace
    pub const OUTPUT: &str = "output";
    /// Liveness stamp, float seconds since epoch
    pub const LAST_UPDATE: &str = "last_update";
    /// The literal string "false" suppresses the end-queue push
    pub const CLEANUP: &str = "cleanup";
    /// The literal string "true" marks a worker-originated task
    pub const LOCAL: &str = "local";
}

/// Interpret the raw `cleanup` hash field.
///
/// Anything other than the literal `"false"` (including an absent field)
/// means the finished task id is handed off to the end queue.
pub fn cleanup_enabled(raw: Option<&str>) -> bool {
    raw != Some("false")
}

/// A task record as written by a submitter.
///
/// Workers read records field-by-field; this struct is the producer-side
/// view used when creating a task (and by tests asserting hash contents).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    /// Registered class name
    pub task: String,
    /// Construction arguments
    pub data: Value,
    /// Whether the finished id is pushed to the end queue
    pub cleanup: bool,
    /// Whether this task was originated by the worker itself
    pub local: bool,
}

impl TaskRecord {
    /// Record for a normal (queue-submitted) task.
    pub fn new(task: impl Into<String>, data: Value) -> Self {
        Self { task: task.into(), data, cleanup: true, local: false }
    }

    /// Record for a worker-originated task.
    pub fn local(task: impl Into<String>, data: Value) -> Self {
        Self { task: task.into(), data, cleanup: true, local: true }
    }

    /// Suppress the end-queue handoff for this task.
    pub fn without_cleanup(mut self) -> Self {
        self.cleanup = false;
        self
    }

    /// Hash field pairs for the initial write.
    ///
    /// `cleanup` and `local` are only written when they deviate from the
    /// defaults an absent field implies.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (fields::TASK, self.task.clone()),
            (fields::DATA, self.data.to_string()),
        ];
        if !self.cleanup {
            pairs.push((fields::CLEANUP, "false".to_string()));
        }
        if self.local {
            pairs.push((fields::LOCAL, "true".to_string()));
        }
        pairs
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
