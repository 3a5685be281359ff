// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The two simple long-running loops: queue reading and liveness.

use crate::engine::Engine;
use crate::error::WorkerError;
use drover_core::{Clock, TaskId};
use drover_coordinator::Coordinator;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Block on the new-task queue and feed claimed ids into the engine.
///
/// Coordinator errors propagate; the supervisor reads them as
/// "coordinator down".
pub(crate) async fn queue_reader<C: Clock>(
    engine: Arc<Engine<C>>,
    coordinator: Arc<dyn Coordinator>,
    new_queue: String,
) -> Result<(), WorkerError> {
    loop {
        let id = coordinator.pop_back_blocking(&new_queue).await?;
        debug!(task = %id, "claimed from queue");
        engine.add_task(TaskId::from(id)).await?;
    }
}

/// Stamp `last_update` on every locally-RUNNING task at a fixed
/// interval.
pub(crate) async fn liveness_updater<C: Clock>(
    engine: Arc<Engine<C>>,
    interval: Duration,
) -> Result<(), WorkerError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        engine.stamp_running().await?;
    }
}
