// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages carried on the per-task pub/sub channels.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

/// Payload published on a task's event channel.
///
/// Terminal transitions publish the lowercased state name as the event;
/// task bodies may publish arbitrary events through `emit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub event: String,
    pub data: Value,
}

impl TaskEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }

    /// Serialize for publishing.
    pub fn to_json(&self) -> String {
        // Struct of (String, Value) cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Command published on a task's control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Stop the task; it is not requeued
    Stop,
    /// Stop, re-read the task hash, and start a fresh instance
    Reload,
}

/// An unrecognized control payload. Logged and ignored by workers.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown control command: {0}")]
pub struct UnknownControl(pub String);

impl FromStr for ControlMessage {
    type Err = UnknownControl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(ControlMessage::Stop),
            "reload" => Ok(ControlMessage::Reload),
            other => Err(UnknownControl(other.to_string())),
        }
    }
}

crate::simple_display! {
    ControlMessage {
        Stop => "stop",
        Reload => "reload",
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
