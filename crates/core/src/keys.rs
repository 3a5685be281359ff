// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator key schema.
//!
//! Pure functions of a configurable prefix; every worker and producer
//! sharing a coordinator must agree on these names. Channel names must be
//! stable across worker restarts so external actors can keep publishing
//! control messages to a task they did not submit from this process.

use crate::id::TaskId;
use serde::{Deserialize, Serialize};

/// Default prefix for task hashes and event channels.
pub const DEFAULT_TASK_PREFIX: &str = "task";
/// Default name of the active-task set.
pub const DEFAULT_TASK_SET: &str = "tasks";
/// Default list new task ids are popped from.
pub const DEFAULT_NEW_QUEUE: &str = "new-task";
/// Default list finished task ids are pushed onto.
pub const DEFAULT_END_QUEUE: &str = "end-task";
/// Default worker broadcast channel the dispatcher always subscribes.
pub const DEFAULT_WORKER_CHANNEL: &str = "drover";

/// Names of the coordinator keys and channels a worker operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    /// Prefix for per-task hash keys and event channels
    pub task_prefix: String,
    /// Set of task ids currently owned by some worker
    pub task_set: String,
    /// List of task ids waiting to be claimed
    pub new_queue: String,
    /// List of task ids whose lifecycle has ended
    pub end_queue: String,
    /// Fixed broadcast channel every worker subscribes
    pub worker_channel: String,
}

impl Default for KeySchema {
    fn default() -> Self {
        Self {
            task_prefix: DEFAULT_TASK_PREFIX.to_string(),
            task_set: DEFAULT_TASK_SET.to_string(),
            new_queue: DEFAULT_NEW_QUEUE.to_string(),
            end_queue: DEFAULT_END_QUEUE.to_string(),
            worker_channel: DEFAULT_WORKER_CHANNEL.to_string(),
        }
    }
}

impl KeySchema {
    crate::setters! {
        into {
            task_prefix: String,
            task_set: String,
            new_queue: String,
            end_queue: String,
            worker_channel: String,
        }
    }

    /// Key of the task's coordinator hash.
    pub fn task_key(&self, id: &TaskId) -> String {
        format!("{}-{}", self.task_prefix, id)
    }

    /// Channel the task's lifecycle events are published on.
    ///
    /// This is the task key itself.
    pub fn event_channel(&self, id: &TaskId) -> String {
        self.task_key(id)
    }

    /// Channel external actors publish `stop`/`reload` commands on.
    pub fn control_channel(&self, id: &TaskId) -> String {
        format!("{}-{}-control", self.task_prefix, id)
    }
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
