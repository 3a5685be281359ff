// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task lifecycle engine.
//!
//! Owns the active-task table for one run attempt, spawns a tokio task
//! per task body plus a watcher that routes the outcome, and keeps the
//! coordinator's view of every owned task consistent with the local one.
//! All tables are transient: the supervisor builds a fresh engine after
//! coordinator-loss recovery.
//!
//! Locks are held only across table access, never across coordinator
//! I/O.

use crate::registry::{BuildError, Registry};
use crate::subscriptions::SubscriptionHandle;
use crate::task::{Task, TaskContext, TaskError, TaskScope};
use drover_core::record::{cleanup_enabled, fields};
use drover_core::{Clock, ControlMessage, KeySchema, TaskEvent, TaskId, TaskState};
use drover_coordinator::{Coordinator, CoordinatorError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

/// Callback notified when a task fails unexpectedly.
///
/// Handlers run in insertion order; a panicking handler is isolated and
/// never interferes with task cleanup.
pub type ExceptionHandler = Arc<dyn Fn(&TaskId, &TaskError) + Send + Sync>;

/// One owned task: the instance, its locally-authoritative state, and
/// the flags read at acquisition.
struct ActiveTask {
    task: Arc<dyn Task>,
    state: TaskState,
    cleanup: bool,
    scope: Option<Arc<dyn TaskScope>>,
}

/// Per-attempt lifecycle engine.
///
/// Shared as `Arc<Engine<_>>` between the queue reader, the liveness
/// updater, the pub/sub dispatcher, the supervisor, and the per-task
/// watcher tasks.
pub struct Engine<C: Clock> {
    coordinator: Arc<dyn Coordinator>,
    keys: KeySchema,
    registry: Arc<Registry>,
    handlers: Arc<Mutex<Vec<ExceptionHandler>>>,
    local_ids: Arc<Mutex<HashSet<TaskId>>>,
    subscriptions: SubscriptionHandle,
    clock: C,
    tasks: Mutex<HashMap<TaskId, ActiveTask>>,
    handles: Mutex<HashMap<TaskId, AbortHandle>>,
    /// Self-handle cloned into per-task watcher tasks.
    weak: Weak<Engine<C>>,
}

impl<C: Clock> Engine<C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        coordinator: Arc<dyn Coordinator>,
        keys: KeySchema,
        registry: Arc<Registry>,
        handlers: Arc<Mutex<Vec<ExceptionHandler>>>,
        local_ids: Arc<Mutex<HashSet<TaskId>>>,
        subscriptions: SubscriptionHandle,
        clock: C,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            coordinator,
            keys,
            registry,
            handlers,
            local_ids,
            subscriptions,
            clock,
            tasks: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
            weak: weak.clone(),
        })
    }

    /// Claim a task: read its record, mark it RUNNING, subscribe its
    /// control channel, build the instance, and start the body.
    ///
    /// A queued id with no record is a broken producer contract: logged
    /// and dropped. Construction failures end the task in `EXCEPTION`
    /// without it ever entering the table.
    pub async fn add_task(&self, id: TaskId) -> Result<(), CoordinatorError> {
        let key = self.keys.task_key(&id);
        let record = self
            .coordinator
            .hash_get(&key, &[fields::TASK, fields::DATA, fields::CLEANUP])
            .await?;
        let mut record = record.into_iter();
        let class = record.next().flatten();
        let data = record.next().flatten();
        let cleanup = record.next().flatten();

        let Some(class) = class else {
            error!(task = %id, "task id in new queue but no hash");
            return Ok(());
        };

        let local = self.local_ids.lock().contains(&id);
        debug!(task = %id, local, "new task");

        self.coordinator.set_add(&self.keys.task_set, id.as_str()).await?;
        self.coordinator
            .hash_set(
                &key,
                &[
                    (fields::STATE, TaskState::Running.as_str().to_string()),
                    (fields::LAST_UPDATE, self.clock.epoch_secs().to_string()),
                ],
            )
            .await?;

        self.subscriptions.subscribe(self.keys.control_channel(&id), id.clone());

        if !self.registry.contains(&class) {
            self.on_task_failure(&id, BuildError::MissingClass(class).into(), false).await?;
            return Ok(());
        }

        let raw_data = data.unwrap_or_else(|| "{}".to_string());
        let parsed: Value = match serde_json::from_str(&raw_data) {
            Ok(value) => value,
            Err(e) => {
                self.on_task_failure(&id, BuildError::InvalidData(e).into(), false).await?;
                return Ok(());
            }
        };
        let task = match self.registry.build(&class, parsed) {
            Ok(task) => task,
            Err(e) => {
                self.on_task_failure(&id, e.into(), false).await?;
                return Ok(());
            }
        };

        let scope = task.scope();
        if let Some(scope) = &scope {
            scope.enter().await;
        }

        {
            let mut tasks = self.tasks.lock();
            tasks.insert(
                id.clone(),
                ActiveTask {
                    task,
                    state: TaskState::Wait,
                    cleanup: cleanup_enabled(cleanup.as_deref()),
                    scope,
                },
            );
        }

        self.start_task(&id).await?;
        info!(task = %id, class = %class, "task added");
        Ok(())
    }

    /// Spawn the task body and its completion watcher, then publish
    /// RUNNING.
    async fn start_task(&self, id: &TaskId) -> Result<(), CoordinatorError> {
        debug!(task = %id, "starting task");
        let task = {
            let tasks = self.tasks.lock();
            match tasks.get(id) {
                Some(entry) => Arc::clone(&entry.task),
                None => return Ok(()),
            }
        };

        let ctx = TaskContext::new(
            id.clone(),
            self.keys.event_channel(id),
            Arc::clone(&self.coordinator),
        );
        let body = tokio::spawn(async move { task.start(&ctx).await });
        self.handles.lock().insert(id.clone(), body.abort_handle());

        let engine = self.weak.clone();
        let watch_id = id.clone();
        tokio::spawn(async move {
            let outcome = body.await;
            // A gone engine means the run attempt was torn down; there is
            // nothing left to route into
            let Some(engine) = engine.upgrade() else {
                return;
            };
            let routed = match outcome {
                Ok(Ok(value)) => engine.on_task_success(&watch_id, value).await,
                Ok(Err(err)) => engine.on_task_failure(&watch_id, err, true).await,
                // Abort is our own cancellation signal, never a failure
                Err(join_err) if join_err.is_cancelled() => Ok(()),
                Err(join_err) => {
                    let err = TaskError::Panicked(panic_message(join_err));
                    engine.on_task_failure(&watch_id, err, true).await
                }
            };
            if let Err(e) = routed {
                // The supervisor's own loops surface coordinator loss
                warn!(task = %watch_id, error = %e, "coordinator error finishing task");
            }
        });

        if let Some(entry) = self.tasks.lock().get_mut(id) {
            entry.state = TaskState::Running;
        }
        self.coordinator
            .hash_set(
                &self.keys.task_key(id),
                &[(fields::STATE, TaskState::Running.as_str().to_string())],
            )
            .await?;
        Ok(())
    }

    /// Handle a payload from the task's control channel.
    pub async fn control_task(
        &self,
        id: &TaskId,
        payload: &str,
    ) -> Result<(), CoordinatorError> {
        match payload.parse::<ControlMessage>() {
            Ok(ControlMessage::Stop) => self.stop_task(id).await,
            Ok(ControlMessage::Reload) => self.reload_task(id).await,
            Err(unknown) => {
                warn!(task = %id, "{unknown}");
                Ok(())
            }
        }
    }

    /// Stop a task: publish STOPPED, run the cooperative hook, abort the
    /// body, clean up without the end-queue handoff.
    ///
    /// STOPPED is recorded *before* `stop()` runs so any terminal signal
    /// raced out of the dying body is filtered.
    pub async fn stop_task(&self, id: &TaskId) -> Result<(), CoordinatorError> {
        debug!(task = %id, "stopping task");
        let task = {
            let mut tasks = self.tasks.lock();
            match tasks.get_mut(id) {
                Some(entry) => {
                    entry.state = TaskState::Stopped;
                    Arc::clone(&entry.task)
                }
                None => {
                    warn!(task = %id, "stop for unknown task");
                    return Ok(());
                }
            }
        };
        self.coordinator
            .hash_set(
                &self.keys.task_key(id),
                &[(fields::STATE, TaskState::Stopped.as_str().to_string())],
            )
            .await?;

        task.stop().await;

        if let Some(handle) = self.handles.lock().get(id) {
            handle.abort();
        }

        self.cleanup_task(id, false).await
    }

    /// Stop, then re-acquire: the record is re-read, so `data` updated
    /// by an external actor is picked up by the fresh instance.
    async fn reload_task(&self, id: &TaskId) -> Result<(), CoordinatorError> {
        debug!(task = %id, "reloading task");
        self.stop_task(id).await?;
        self.add_task(id.clone()).await
    }

    /// Route a returned value. Arrivals for unknown or stopped tasks are
    /// dropped: they lost the race against a stop.
    async fn on_task_success(
        &self,
        id: &TaskId,
        value: Value,
    ) -> Result<(), CoordinatorError> {
        {
            let tasks = self.tasks.lock();
            match tasks.get(id) {
                None => return Ok(()),
                Some(entry) if entry.state.is_stopped() => return Ok(()),
                Some(_) => {}
            }
        }
        self.handle_end_task(id, TaskState::Success, value.to_string(), value).await?;
        self.cleanup_task(id, true).await
    }

    /// Route a failure: expected failures end in `ERROR`, everything
    /// else in `EXCEPTION` with the registered handlers notified.
    ///
    /// `was_tracked` says whether the failure comes from a body that ran
    /// (the watcher) or from a construction that never entered the
    /// table. For a tracked task a missing entry means a stop already
    /// cleaned it up, and the late arrival is dropped like any other
    /// terminal signal after a stop; an untracked failure must proceed
    /// so the hash and the handoff still happen.
    async fn on_task_failure(
        &self,
        id: &TaskId,
        error: TaskError,
        was_tracked: bool,
    ) -> Result<(), CoordinatorError> {
        {
            let tasks = self.tasks.lock();
            match tasks.get(id) {
                Some(entry) if entry.state.is_stopped() => return Ok(()),
                None if was_tracked => return Ok(()),
                _ => {}
            }
        }
        match error {
            TaskError::Failed(msg) => {
                self.handle_end_task(
                    id,
                    TaskState::Error,
                    msg.clone(),
                    Value::String(msg),
                )
                .await?;
                self.cleanup_task(id, true).await
            }
            other => {
                let trace = other.trace();
                self.handle_end_task(
                    id,
                    TaskState::Exception,
                    trace.clone(),
                    Value::String(trace),
                )
                .await?;
                self.run_exception_handlers(id, &other);
                self.cleanup_task(id, true).await
            }
        }
    }

    /// Record a terminal state: one hash update carrying both `state`
    /// and `output`, then the in-memory state and the event — but only
    /// for tasks that made it into the table (a failed construction has
    /// nothing to emit through).
    async fn handle_end_task(
        &self,
        id: &TaskId,
        state: TaskState,
        output: String,
        data: Value,
    ) -> Result<(), CoordinatorError> {
        match state {
            TaskState::Exception => warn!(task = %id, state = %state, output = %output, "task ended"),
            _ => info!(task = %id, state = %state, output = %output, "task ended"),
        }

        self.coordinator
            .hash_set(
                &self.keys.task_key(id),
                &[
                    (fields::STATE, state.as_str().to_string()),
                    (fields::OUTPUT, output),
                ],
            )
            .await?;

        let present = {
            let mut tasks = self.tasks.lock();
            match tasks.get_mut(id) {
                Some(entry) => {
                    entry.state = state;
                    true
                }
                None => false,
            }
        };
        if present {
            let event = TaskEvent::new(state.event_name(), data);
            self.coordinator
                .publish(&self.keys.event_channel(id), &event.to_json())
                .await?;
        }
        Ok(())
    }

    fn run_exception_handlers(&self, id: &TaskId, error: &TaskError) {
        let handlers: Vec<ExceptionHandler> = self.handlers.lock().clone();
        for handler in handlers {
            let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(id, error)
            }));
            if caught.is_err() {
                warn!(task = %id, "exception handler panicked");
            }
        }
    }

    /// Drop all local bookkeeping for a task and, when `enqueue` (and the
    /// record's `cleanup` flag allows), hand the id to the end queue and
    /// release the active-set claim.
    ///
    /// Idempotent: the control-channel route doubles as the "not yet
    /// cleaned" marker, so a second call never re-enqueues. Non-enqueueing
    /// cleanups deliberately leave active-set membership untouched.
    pub(crate) async fn cleanup_task(
        &self,
        id: &TaskId,
        enqueue: bool,
    ) -> Result<(), CoordinatorError> {
        let was_live = self.subscriptions.unsubscribe(&self.keys.control_channel(id));

        let mut cleanup = true;
        let scope = {
            let mut tasks = self.tasks.lock();
            match tasks.remove(id) {
                Some(entry) => {
                    cleanup = entry.cleanup;
                    entry.scope
                }
                None => None,
            }
        };
        if let Some(handle) = self.handles.lock().remove(id) {
            // No-op when the body already finished
            handle.abort();
        }
        if let Some(scope) = scope {
            scope.exit().await;
        }

        if enqueue && cleanup && was_live {
            self.coordinator.push_front(&self.keys.end_queue, id.as_str()).await?;
            self.coordinator.set_remove(&self.keys.task_set, id.as_str()).await?;
        }
        Ok(())
    }

    /// One liveness tick: a single timestamp stamped onto every
    /// locally-RUNNING task. Mid-transition entries are skipped; their
    /// state is authoritative.
    pub(crate) async fn stamp_running(&self) -> Result<(), CoordinatorError> {
        let stamp = self.clock.epoch_secs().to_string();
        for id in self.running_tasks() {
            self.coordinator
                .hash_set(&self.keys.task_key(&id), &[(fields::LAST_UPDATE, stamp.clone())])
                .await?;
        }
        Ok(())
    }

    /// Coordinator-loss teardown: mark every owned task `_STOPPED`
    /// (local-only, never published), run its `stop` hook, and drop the
    /// local bookkeeping without any coordinator traffic.
    pub(crate) async fn halt_all_local(&self) {
        let entries: Vec<(TaskId, Arc<dyn Task>)> = {
            let mut tasks = self.tasks.lock();
            tasks
                .iter_mut()
                .map(|(id, entry)| {
                    entry.state = TaskState::LocalStopped;
                    (id.clone(), Arc::clone(&entry.task))
                })
                .collect()
        };
        for (id, task) in entries {
            debug!(task = %id, "halting task, coordinator lost");
            task.stop().await;
            if let Some(handle) = self.handles.lock().get(&id) {
                handle.abort();
            }
            if let Err(e) = self.cleanup_task(&id, false).await {
                debug!(task = %id, error = %e, "ignored during halt");
            }
        }
    }

    /// Ids whose in-memory state is RUNNING.
    pub(crate) fn running_tasks(&self) -> Vec<TaskId> {
        self.tasks
            .lock()
            .iter()
            .filter(|(_, entry)| entry.state == TaskState::Running)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Whether the engine currently owns `id`.
    pub fn is_tracking(&self, id: &TaskId) -> bool {
        self.tasks.lock().contains_key(id)
    }

    /// Number of owned tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn task_state(&self, id: &TaskId) -> Option<TaskState> {
        self.tasks.lock().get(id).map(|entry| entry.state)
    }
}

/// Extract a readable message from a panicked tokio task.
fn panic_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(msg) = payload.downcast_ref::<&str>() {
                (*msg).to_string()
            } else if let Some(msg) = payload.downcast_ref::<String>() {
                msg.clone()
            } else {
                "non-string panic payload".to_string()
            }
        }
        Err(err) => err.to_string(),
    }
}

#[cfg(test)]
#[path = "engine_tests/mod.rs"]
mod tests;
