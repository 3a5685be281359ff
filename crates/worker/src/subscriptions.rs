// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel-subscription bookkeeping shared between the engine and the
//! pub/sub dispatcher.
//!
//! The routing table is updated synchronously so the engine's invariants
//! hold immediately; the coordinator-side SUBSCRIBE/UNSUBSCRIBE happens
//! in the dispatcher, which owns the pub/sub connection and applies the
//! queued commands at the top of each drain cycle.

use drover_core::TaskId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug)]
pub(crate) enum SubCommand {
    Subscribe(String),
    Unsubscribe(String),
}

#[derive(Clone)]
pub(crate) struct SubscriptionHandle {
    table: Arc<Mutex<HashMap<String, TaskId>>>,
    commands: mpsc::UnboundedSender<SubCommand>,
}

impl SubscriptionHandle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SubCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self { table: Arc::new(Mutex::new(HashMap::new())), commands: tx };
        (handle, rx)
    }

    /// Route control messages on `channel` to `task_id`.
    pub fn subscribe(&self, channel: String, task_id: TaskId) {
        self.table.lock().insert(channel.clone(), task_id);
        self.send(SubCommand::Subscribe(channel));
    }

    /// Stop routing `channel`. Returns whether a route existed.
    pub fn unsubscribe(&self, channel: &str) -> bool {
        let existed = self.table.lock().remove(channel).is_some();
        if existed {
            self.send(SubCommand::Unsubscribe(channel.to_string()));
        }
        existed
    }

    /// Task the channel routes to, if any.
    pub fn route(&self, channel: &str) -> Option<TaskId> {
        self.table.lock().get(channel).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    fn send(&self, cmd: SubCommand) {
        // The dispatcher is gone during coordinator-failure cleanup;
        // dropping the command is exactly what that path wants.
        if self.commands.send(cmd).is_err() {
            tracing::debug!("subscription command dropped, dispatcher not running");
        }
    }
}

#[cfg(test)]
#[path = "subscriptions_tests.rs"]
mod tests;
