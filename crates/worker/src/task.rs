// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task contract.
//!
//! A user task is built from the deserialized `data` object of its
//! coordinator record, runs in its own tokio task, and may publish
//! events through the [`TaskContext`] it is handed. Cancellation is
//! abort-based: a body that is stopped never observes a poll again, so
//! tasks that spawn helpers of their own should shut them down in
//! [`Task::stop`].

use async_trait::async_trait;
use drover_coordinator::{Coordinator, CoordinatorError};
use drover_core::{TaskEvent, TaskId};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Failure signal returned by a task body.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Expected, user-visible failure. The task ends in `ERROR` with the
    /// message as its output.
    #[error("{0}")]
    Failed(String),

    /// Anything unexpected. The task ends in `EXCEPTION` with the
    /// formatted error chain as its output, and exception handlers are
    /// notified.
    #[error("{0}")]
    Unexpected(Box<dyn std::error::Error + Send + Sync>),

    /// The task body panicked (recovered from the aborted tokio task).
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Signal an expected failure (the `ERROR` terminal state).
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }

    /// Wrap any error as an unexpected failure (the `EXCEPTION` state).
    pub fn unexpected(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TaskError::Unexpected(err.into())
    }

    /// Formatted failure trace written to the task's `output` field.
    pub fn trace(&self) -> String {
        let mut out = self.to_string();
        let mut source = match self {
            TaskError::Unexpected(err) => err.source(),
            _ => None,
        };
        while let Some(err) = source {
            out.push_str("\ncaused by: ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        TaskError::unexpected(e)
    }
}

impl From<CoordinatorError> for TaskError {
    fn from(e: CoordinatorError) -> Self {
        TaskError::unexpected(e)
    }
}

/// Handle a running task uses to reach the outside world.
pub struct TaskContext {
    id: TaskId,
    channel: String,
    coordinator: Arc<dyn Coordinator>,
}

impl TaskContext {
    pub(crate) fn new(id: TaskId, channel: String, coordinator: Arc<dyn Coordinator>) -> Self {
        Self { id, channel, coordinator }
    }

    /// The id this task is running under.
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Publish `{"event": .., "data": ..}` on the task's event channel.
    pub async fn emit(&self, event: &str, data: Value) -> Result<(), CoordinatorError> {
        let payload = TaskEvent::new(event, data).to_json();
        self.coordinator.publish(&self.channel, &payload).await
    }
}

/// A unit of work.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// The task body. Runs until it returns, fails, or its hosting tokio
    /// task is aborted. The returned value becomes the `SUCCESS` output.
    async fn start(&self, ctx: &TaskContext) -> Result<Value, TaskError>;

    /// Best-effort cooperative shutdown hook, called before the body is
    /// aborted.
    async fn stop(&self) {}

    /// Optional scoped acquisition. When present, the engine enters the
    /// scope once before `start` and exits it on cleanup, on every
    /// terminal path.
    fn scope(&self) -> Option<Arc<dyn TaskScope>> {
        None
    }
}

impl std::fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Task")
    }
}

/// Scoped resource acquisition anchored to a task instance's lifetime.
#[async_trait]
pub trait TaskScope: Send + Sync {
    async fn enter(&self);
    async fn exit(&self);
}

/// A registrable task class: buildable from the record's `data` object.
///
/// `NAME` must be unique within a worker; submitters reference it in the
/// `task` field of the record.
pub trait TaskClass: Task + serde::de::DeserializeOwned + Sized + 'static {
    const NAME: &'static str;
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
