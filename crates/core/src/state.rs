// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task state machine vocabulary.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task, as mirrored into the coordinator hash.
///
/// `LocalStopped` is the one exception to mirroring: it marks a task
/// stopped by the coordinator-loss path and is never published (its wire
/// name carries the `_` prefix that tags local-only transitions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Created, not yet claimed by a worker
    #[serde(rename = "WAIT")]
    Wait,
    /// Claimed and executing on some worker
    #[serde(rename = "RUNNING")]
    Running,
    /// Stopped by a control message
    #[serde(rename = "STOPPED")]
    Stopped,
    /// Stopped locally because the coordinator went away (never published)
    #[serde(rename = "_STOPPED")]
    LocalStopped,
    /// Task body returned a value
    #[serde(rename = "SUCCESS")]
    Success,
    /// Task body signalled an expected, user-visible failure
    #[serde(rename = "ERROR")]
    Error,
    /// Task body failed unexpectedly, or the task could not be built
    #[serde(rename = "EXCEPTION")]
    Exception,
}

impl TaskState {
    /// Wire name written into the coordinator `state` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Wait => "WAIT",
            TaskState::Running => "RUNNING",
            TaskState::Stopped => "STOPPED",
            TaskState::LocalStopped => "_STOPPED",
            TaskState::Success => "SUCCESS",
            TaskState::Error => "ERROR",
            TaskState::Exception => "EXCEPTION",
        }
    }

    /// Event name published on the task's event channel for this state.
    pub fn event_name(&self) -> String {
        self.as_str().to_lowercase()
    }

    /// Parse a wire name back into a state.
    pub fn parse(s: &str) -> Option<TaskState> {
        match s {
            "WAIT" => Some(TaskState::Wait),
            "RUNNING" => Some(TaskState::Running),
            "STOPPED" => Some(TaskState::Stopped),
            "_STOPPED" => Some(TaskState::LocalStopped),
            "SUCCESS" => Some(TaskState::Success),
            "ERROR" => Some(TaskState::Error),
            "EXCEPTION" => Some(TaskState::Exception),
            _ => None,
        }
    }

    /// Check if this state ends the task's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Stopped
                | TaskState::LocalStopped
                | TaskState::Success
                | TaskState::Error
                | TaskState::Exception
        )
    }

    /// Check if this task was stopped (by control message or coordinator loss).
    ///
    /// Terminal-state arrivals for stopped tasks are dropped: a stopped
    /// task must never transition to `SUCCESS`, `ERROR`, or `EXCEPTION`.
    pub fn is_stopped(&self) -> bool {
        matches!(self, TaskState::Stopped | TaskState::LocalStopped)
    }

    /// True when this state must not be written to the coordinator.
    pub fn is_local_only(&self) -> bool {
        matches!(self, TaskState::LocalStopped)
    }
}

crate::simple_display! {
    TaskState {
        Wait => "WAIT",
        Running => "RUNNING",
        Stopped => "STOPPED",
        LocalStopped => "_STOPPED",
        Success => "SUCCESS",
        Error => "ERROR",
        Exception => "EXCEPTION",
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
