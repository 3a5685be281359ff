// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker configuration.

use drover_core::keys::{
    DEFAULT_END_QUEUE, DEFAULT_NEW_QUEUE, DEFAULT_TASK_PREFIX, DEFAULT_TASK_SET,
    DEFAULT_WORKER_CHANNEL,
};
use drover_core::KeySchema;
use std::time::Duration;

/// Configuration recognized at worker construction.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Coordinator connection URL (single instance; pooling and
    /// clustering belong to the client library)
    pub redis_url: String,
    /// Prefix for task hashes / event channels
    pub task_prefix: String,
    /// Name of the active-task set
    pub task_set: String,
    /// List to pop new task ids from
    pub new_queue: String,
    /// List to push completed task ids onto
    pub end_queue: String,
    /// Fixed broadcast channel the dispatcher always subscribes
    pub worker_channel: String,
    /// Interval between `last_update` liveness stamps
    pub update_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            task_prefix: DEFAULT_TASK_PREFIX.to_string(),
            task_set: DEFAULT_TASK_SET.to_string(),
            new_queue: DEFAULT_NEW_QUEUE.to_string(),
            end_queue: DEFAULT_END_QUEUE.to_string(),
            worker_channel: DEFAULT_WORKER_CHANNEL.to_string(),
            update_interval: Duration::from_secs(5),
        }
    }
}

impl WorkerConfig {
    drover_core::setters! {
        into {
            redis_url: String,
            task_prefix: String,
            task_set: String,
            new_queue: String,
            end_queue: String,
            worker_channel: String,
        }
        set {
            update_interval: Duration,
        }
    }

    /// The key schema this configuration describes.
    pub fn key_schema(&self) -> KeySchema {
        KeySchema::default()
            .task_prefix(self.task_prefix.clone())
            .task_set(self.task_set.clone())
            .new_queue(self.new_queue.clone())
            .end_queue(self.end_queue.clone())
            .worker_channel(self.worker_channel.clone())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
