// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker: durable state, the supervisor loop, and recovery.
//!
//! `Worker` owns everything that survives coordinator loss (the class
//! registry, seeded local tasks, their ids, exception handlers). Each
//! run attempt builds a fresh transient [`Engine`] plus the three
//! long-running loops, then waits for one of them to fail, for ctrl-c,
//! or for the shutdown handle.

use crate::config::WorkerConfig;
use crate::dispatcher::Dispatcher;
use crate::engine::{Engine, ExceptionHandler};
use crate::error::WorkerError;
use crate::loops::{liveness_updater, queue_reader};
use crate::registry::Registry;
use crate::subscriptions::SubscriptionHandle;
use crate::task::{TaskClass, TaskError};
use drover_core::{Clock, IdGen, KeySchema, SystemClock, TaskId, TaskRecord, UuidIdGen};
use drover_coordinator::{Coordinator, RedisCoordinator};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause between liveness probes while waiting the coordinator back.
const RECOVERY_PROBE_PAUSE: Duration = Duration::from_millis(500);

/// Handle for stopping a running worker from another task.
///
/// Equivalent to sending the process an interrupt: running non-local
/// tasks are stopped and requeued, local tasks are deleted.
#[derive(Clone)]
pub struct ShutdownHandle(CancellationToken);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.cancel();
    }
}

/// How one run attempt ended.
enum Exit {
    Shutdown,
    CoordinatorLost,
}

/// A task-worker daemon instance.
pub struct Worker<C: Clock = SystemClock> {
    coordinator: Arc<dyn Coordinator>,
    keys: KeySchema,
    update_interval: Duration,
    clock: C,
    id_gen: Arc<dyn IdGen>,
    registry: Arc<Registry>,
    handlers: Arc<Mutex<Vec<ExceptionHandler>>>,
    local_tasks: Mutex<Vec<(String, Value)>>,
    local_task_ids: Arc<Mutex<HashSet<TaskId>>>,
    shutdown: CancellationToken,
}

impl Worker<SystemClock> {
    /// Connect to the configured Redis instance.
    pub async fn connect(config: WorkerConfig) -> Result<Self, WorkerError> {
        let coordinator = RedisCoordinator::connect(&config.redis_url).await?;
        Ok(Self::new(config, Arc::new(coordinator)))
    }

    /// Build a worker over an already-constructed coordinator.
    pub fn new(config: WorkerConfig, coordinator: Arc<dyn Coordinator>) -> Self {
        Self::with_parts(config, coordinator, SystemClock, Arc::new(UuidIdGen))
    }
}

impl<C: Clock> Worker<C> {
    /// Fully-injected constructor (clock and id generation), used by
    /// tests.
    pub fn with_parts(
        config: WorkerConfig,
        coordinator: Arc<dyn Coordinator>,
        clock: C,
        id_gen: Arc<dyn IdGen>,
    ) -> Self {
        Self {
            keys: config.key_schema(),
            update_interval: config.update_interval,
            coordinator,
            clock,
            id_gen,
            registry: Arc::new(Registry::new()),
            handlers: Arc::new(Mutex::new(Vec::new())),
            local_tasks: Mutex::new(Vec::new()),
            local_task_ids: Arc::new(Mutex::new(HashSet::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a task class under its declared `NAME`.
    pub fn register<T: TaskClass>(&self) {
        self.registry.register::<T>();
    }

    /// The underlying registry, for dynamic factory registration.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Append an exception handler, notified (in insertion order) for
    /// every unexpected task failure.
    pub fn on_exception(&self, handler: impl Fn(&TaskId, &TaskError) + Send + Sync + 'static) {
        self.handlers.lock().push(Arc::new(handler));
    }

    /// Seed a local task: launched when `run` starts, relaunched with a
    /// fresh id after coordinator recovery, deleted (never requeued) on
    /// shutdown.
    pub fn start_local_task(&self, name: impl Into<String>, data: Value) {
        self.local_tasks.lock().push((name.into(), data));
    }

    /// Handle for stopping this worker from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Run until interrupted. Coordinator loss is not fatal: the worker
    /// stops its tasks locally, hibernates until the coordinator
    /// answers pings again, and resumes with fresh transient state.
    pub async fn run(&self) -> Result<(), WorkerError> {
        debug!(tasks = ?self.registry.names(), "worker starting");
        loop {
            match self.run_attempt().await? {
                Exit::Shutdown => {
                    info!("exiting on user command");
                    return Ok(());
                }
                Exit::CoordinatorLost => {
                    debug!("waiting for coordinator");
                    if !self.wait_for_coordinator().await {
                        info!("exiting on user command");
                        return Ok(());
                    }
                    debug!("coordinator is back, restarting");
                }
            }
        }
    }

    /// One attempt: fresh engine and loops, supervised until something
    /// gives.
    async fn run_attempt(&self) -> Result<Exit, WorkerError> {
        let (subscriptions, commands) = SubscriptionHandle::new();
        let engine = Engine::new(
            Arc::clone(&self.coordinator),
            self.keys.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.handlers),
            Arc::clone(&self.local_task_ids),
            subscriptions.clone(),
            self.clock.clone(),
        );

        let subscriber = match self.coordinator.subscriber().await {
            Ok(subscriber) => subscriber,
            Err(e) => {
                warn!(error = %e, "could not open pub/sub connection");
                return Ok(Exit::CoordinatorLost);
            }
        };
        let dispatcher = Dispatcher::new(
            subscriber,
            commands,
            subscriptions,
            Arc::clone(&engine),
            self.keys.worker_channel.clone(),
        );

        let mut dispatch_loop = tokio::spawn(dispatcher.run());
        let mut queue_loop = tokio::spawn(queue_reader(
            Arc::clone(&engine),
            Arc::clone(&self.coordinator),
            self.keys.new_queue.clone(),
        ));
        let mut update_loop =
            tokio::spawn(liveness_updater(Arc::clone(&engine), self.update_interval));

        let interrupt = async {
            if tokio::signal::ctrl_c().await.is_err() {
                // No signal handler available; rely on the shutdown handle
                std::future::pending::<()>().await;
            }
        };
        tokio::pin!(interrupt);

        // Kick off seeded local tasks, then supervise: a pending join is
        // the healthy case, so the select only wakes for a failed loop,
        // ctrl-c, or the shutdown handle
        let exit = match self.launch_local_tasks(&engine).await {
            Err(e) => {
                warn!(error = %e, "coordinator unreachable launching local tasks");
                Ok(Exit::CoordinatorLost)
            }
            Ok(()) => tokio::select! {
                res = &mut queue_loop => classify_loop_exit("queue reader", res),
                res = &mut update_loop => classify_loop_exit("liveness updater", res),
                res = &mut dispatch_loop => classify_loop_exit("dispatcher", res),
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested");
                    Ok(Exit::Shutdown)
                }
                _ = &mut interrupt => {
                    info!("interrupt received");
                    Ok(Exit::Shutdown)
                }
            },
        };

        debug!("stopping worker loops");
        queue_loop.abort();
        update_loop.abort();
        dispatch_loop.abort();

        match &exit {
            Ok(Exit::CoordinatorLost) => engine.halt_all_local().await,
            Ok(Exit::Shutdown) => self.shutdown_tasks(&engine).await?,
            Err(_) => {}
        }
        exit
    }

    /// Launch every seeded local task with a fresh id.
    async fn launch_local_tasks(&self, engine: &Arc<Engine<C>>) -> Result<(), WorkerError> {
        let seeds: Vec<(String, Value)> = self.local_tasks.lock().clone();
        for (name, data) in seeds {
            let id = self.id_gen.generate();
            debug!(task = %id, class = %name, "launching local task");
            self.local_task_ids.lock().insert(id.clone());

            let record = TaskRecord::local(name, data);
            self.coordinator
                .hash_set(&self.keys.task_key(&id), &record.to_pairs())
                .await?;
            engine.add_task(id).await?;
        }
        Ok(())
    }

    /// Clean shutdown: stop every RUNNING task; delete local records,
    /// requeue everything else for another worker to claim.
    async fn shutdown_tasks(&self, engine: &Arc<Engine<C>>) -> Result<(), WorkerError> {
        for id in engine.running_tasks() {
            engine.stop_task(&id).await?;

            if self.local_task_ids.lock().contains(&id) {
                self.coordinator.delete(&self.keys.task_key(&id)).await?;
                self.coordinator.set_remove(&self.keys.task_set, id.as_str()).await?;
            } else {
                info!(task = %id, "requeueing task");
                self.coordinator.push_front(&self.keys.new_queue, id.as_str()).await?;
            }
        }
        Ok(())
    }

    /// Probe until the coordinator answers. Returns false if shutdown
    /// was requested while waiting.
    async fn wait_for_coordinator(&self) -> bool {
        loop {
            if self.coordinator.ping().await.is_ok() {
                debug!("coordinator answered ping");
                return true;
            }
            tokio::select! {
                _ = tokio::time::sleep(RECOVERY_PROBE_PAUSE) => {}
                _ = self.shutdown.cancelled() => return false,
            }
        }
    }
}

/// Classify a finished supervised loop: any coordinator error is the
/// down-recovery path, everything else is a bug.
fn classify_loop_exit(
    name: &'static str,
    outcome: Result<Result<(), WorkerError>, tokio::task::JoinError>,
) -> Result<Exit, WorkerError> {
    match outcome {
        Ok(Err(WorkerError::Coordinator(e))) => {
            warn!(worker_loop = name, error = %e, "coordinator unreachable");
            Ok(Exit::CoordinatorLost)
        }
        Ok(Err(other)) => Err(other),
        Ok(Ok(())) => Err(WorkerError::LoopExited(name)),
        Err(_join) => Err(WorkerError::LoopPanicked(name)),
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
