// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Producer-side task submission.

use crate::client::Coordinator;
use crate::error::CoordinatorError;
use drover_core::{KeySchema, TaskId, TaskRecord};

/// Create a task: write its record hash, then queue its id for workers.
///
/// The hash write strictly precedes the queue push so a worker popping
/// the id always finds the record.
pub async fn submit(
    coordinator: &dyn Coordinator,
    keys: &KeySchema,
    id: &TaskId,
    record: &TaskRecord,
) -> Result<(), CoordinatorError> {
    coordinator
        .hash_set(&keys.task_key(id), &record.to_pairs())
        .await?;
    coordinator.push_front(&keys.new_queue, id.as_str()).await?;
    Ok(())
}

#[cfg(test)]
#[path = "submit_tests.rs"]
mod tests;
