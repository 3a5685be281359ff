// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pub/sub dispatcher.
//!
//! One tokio task owns the pub/sub connection. Each cycle applies the
//! engine's queued subscribe/unsubscribe commands, drains every pending
//! message, routes control-channel messages to the engine, and idles.
//! Serializing control messages through this single loop is what keeps
//! them in arrival order.

use crate::engine::Engine;
use crate::error::WorkerError;
use crate::subscriptions::{SubCommand, SubscriptionHandle};
use drover_core::Clock;
use drover_coordinator::Subscriber;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Idle pause between drain cycles.
pub(crate) const DISPATCH_IDLE: Duration = Duration::from_millis(500);

pub(crate) struct Dispatcher<C: Clock> {
    subscriber: Box<dyn Subscriber>,
    commands: mpsc::UnboundedReceiver<SubCommand>,
    subscriptions: SubscriptionHandle,
    engine: Arc<Engine<C>>,
    worker_channel: String,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(
        subscriber: Box<dyn Subscriber>,
        commands: mpsc::UnboundedReceiver<SubCommand>,
        subscriptions: SubscriptionHandle,
        engine: Arc<Engine<C>>,
        worker_channel: String,
    ) -> Self {
        Self { subscriber, commands, subscriptions, engine, worker_channel }
    }

    pub async fn run(mut self) -> Result<(), WorkerError> {
        // The worker broadcast channel is always subscribed; it has no
        // route in the table.
        self.subscriber.subscribe(&self.worker_channel).await?;

        loop {
            self.apply_commands().await?;
            self.drain().await?;
            tokio::time::sleep(DISPATCH_IDLE).await;
        }
    }

    /// Apply queued subscription changes to the pub/sub connection.
    ///
    /// Unsubscribe failures are swallowed: that path runs while tearing
    /// down tasks during coordinator failure, when the route is already
    /// gone and the connection may be too.
    async fn apply_commands(&mut self) -> Result<(), WorkerError> {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                SubCommand::Subscribe(channel) => {
                    self.subscriber.subscribe(&channel).await?;
                }
                SubCommand::Unsubscribe(channel) => {
                    if let Err(e) = self.subscriber.unsubscribe(&channel).await {
                        debug!(channel = %channel, error = %e, "unsubscribe failed, ignoring");
                    }
                }
            }
        }
        Ok(())
    }

    /// Read messages until there are no more.
    async fn drain(&mut self) -> Result<(), WorkerError> {
        while let Some(message) = self.subscriber.try_next().await? {
            match self.subscriptions.route(&message.channel) {
                Some(task_id) => {
                    debug!(channel = %message.channel, payload = %message.payload, "control message");
                    self.engine.control_task(&task_id, &message.payload).await?;
                }
                // Messages on the broadcast channel, or for tasks already
                // cleaned up, have no route
                None => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
