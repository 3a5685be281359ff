// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios: a full worker against the in-memory
//! coordinator, driven the way external actors drive it (record writes,
//! queue pushes, pub/sub control messages).

use async_trait::async_trait;
use drover_coordinator::{submit, Coordinator, MemoryCoordinator};
use drover_core::{FakeClock, KeySchema, SeqIdGen, TaskId, TaskRecord};
use drover_worker::{
    register_tasks, Task, TaskClass, TaskContext, TaskError, Worker, WorkerConfig, WorkerError,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Poll until `cond` holds; tokio time is paused, so this is cheap.
async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[derive(Deserialize)]
struct Echo {
    msg: String,
}

#[async_trait]
impl Task for Echo {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        Ok(Value::String(self.msg.clone()))
    }
}

impl TaskClass for Echo {
    const NAME: &'static str = "echo";
}

#[derive(Deserialize)]
struct Napper {}

#[async_trait]
impl Task for Napper {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(json!("rested"))
    }
}

impl TaskClass for Napper {
    const NAME: &'static str = "napper";
}

#[derive(Deserialize)]
struct BadInput {}

#[async_trait]
impl Task for BadInput {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        Err(TaskError::failed("bad input"))
    }
}

impl TaskClass for BadInput {
    const NAME: &'static str = "bad-input";
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value: negative count")]
struct InvalidValue;

#[derive(Deserialize)]
struct Blowup {}

#[async_trait]
impl Task for Blowup {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        Err(TaskError::unexpected(InvalidValue))
    }
}

impl TaskClass for Blowup {
    const NAME: &'static str = "blowup";
}

/// Parks until stopped; records its `stop` hook running.
struct Parked {
    gate: Arc<Notify>,
    stopped: Arc<AtomicBool>,
}

#[async_trait]
impl Task for Parked {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        self.gate.notified().await;
        Ok(Value::Null)
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

struct Harness {
    store: MemoryCoordinator,
    keys: KeySchema,
    worker: Arc<Worker<FakeClock>>,
    running: JoinHandle<Result<(), WorkerError>>,
}

impl Harness {
    fn start() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
        let store = MemoryCoordinator::new();
        let worker = Arc::new(Worker::with_parts(
            WorkerConfig::default(),
            Arc::new(store.clone()),
            FakeClock::new(),
            Arc::new(SeqIdGen::default()),
        ));
        register_tasks!(worker, Echo, Napper, BadInput, Blowup);

        let running = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.run().await })
        };
        Self { store, keys: KeySchema::default(), worker, running }
    }

    async fn submit(&self, id: &str, class: &str, data: Value) -> TaskId {
        let id = TaskId::from(id);
        submit(&self.store, &self.keys, &id, &TaskRecord::new(class, data))
            .await
            .unwrap();
        id
    }

    fn state_of(&self, id: &TaskId) -> Option<String> {
        self.store.hash_field(&self.keys.task_key(id), "state")
    }

    async fn wait_for_state(&self, id: &TaskId, state: &str) {
        let store = self.store.clone();
        let key = self.keys.task_key(id);
        wait_until(&format!("{id} to reach {state}"), move || {
            store.hash_field(&key, "state").as_deref() == Some(state)
        })
        .await;
    }

    fn events_for(&self, id: &TaskId) -> Vec<Value> {
        self.store
            .published_on(&self.keys.event_channel(id))
            .iter()
            .filter_map(|p| serde_json::from_str(p).ok())
            .collect()
    }

    /// Wait for the dispatcher to have the control channel live on the
    /// pub/sub connection, so a published command cannot be lost.
    async fn wait_for_control_channel(&self, id: &TaskId) {
        let store = self.store.clone();
        let channel = self.keys.control_channel(id);
        wait_until(&format!("control channel for {id}"), move || {
            store.subscribed_channels().contains(&channel)
        })
        .await;
    }

    async fn finish(self) {
        self.worker.shutdown_handle().shutdown();
        self.running.await.unwrap().unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn happy_path() {
    let h = Harness::start();
    let id = h.submit("A", "echo", json!({"msg": "hi"})).await;

    h.wait_for_state(&id, "SUCCESS").await;

    assert_eq!(
        h.store.hash_field("task-A", "output"),
        Some("\"hi\"".to_string())
    );
    assert_eq!(h.events_for(&id), vec![json!({"event": "success", "data": "hi"})]);
    assert_eq!(h.store.list_items(&h.keys.end_queue), vec!["A".to_string()]);
    assert!(!h.store.set_members(&h.keys.task_set).contains("A"));

    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn stop_mid_flight() {
    let h = Harness::start();
    let id = h.submit("B", "napper", json!({})).await;
    h.wait_for_state(&id, "RUNNING").await;
    h.wait_for_control_channel(&id).await;

    h.store
        .publish(&h.keys.control_channel(&id), "stop")
        .await
        .unwrap();
    h.wait_for_state(&id, "STOPPED").await;

    assert!(h.store.list_items(&h.keys.end_queue).is_empty());
    assert!(h.events_for(&id).is_empty(), "no success event after a stop");

    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn reload_picks_up_rewritten_data() {
    let h = Harness::start();
    let builds: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let builds = Arc::clone(&builds);
        h.worker.registry().register_factory("counting", move |data| {
            builds.lock().push(data.get("n").and_then(Value::as_i64).unwrap_or(-1));
            Ok(Arc::new(Napper {}))
        });
    }

    let id = h.submit("C", "counting", json!({"n": 1})).await;
    h.wait_for_state(&id, "RUNNING").await;
    h.wait_for_control_channel(&id).await;
    {
        let builds = Arc::clone(&builds);
        wait_until("first build", move || builds.lock().len() == 1).await;
    }

    h.store
        .hash_set(&h.keys.task_key(&id), &[("data", "{\"n\":2}".to_string())])
        .await
        .unwrap();
    h.store
        .publish(&h.keys.control_channel(&id), "reload")
        .await
        .unwrap();

    {
        let builds = Arc::clone(&builds);
        wait_until("rebuild with fresh data", move || builds.lock().len() == 2).await;
    }
    assert_eq!(*builds.lock(), vec![1, 2]);
    h.wait_for_state(&id, "RUNNING").await;

    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn user_error() {
    let h = Harness::start();
    let id = h.submit("D", "bad-input", json!({})).await;

    h.wait_for_state(&id, "ERROR").await;

    assert_eq!(
        h.store.hash_field("task-D", "output"),
        Some("bad input".to_string())
    );
    assert_eq!(h.events_for(&id), vec![json!({"event": "error", "data": "bad input"})]);
    assert_eq!(h.store.list_items(&h.keys.end_queue), vec!["D".to_string()]);

    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn unexpected_exception() {
    let h = Harness::start();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        h.worker.on_exception(move |id, err| {
            seen.lock().push(format!("{id}: {err}"));
        });
    }

    let id = h.submit("E", "blowup", json!({})).await;
    h.wait_for_state(&id, "EXCEPTION").await;

    let output = h.store.hash_field("task-E", "output").unwrap();
    assert!(output.contains("invalid value"), "output: {output}");
    assert_eq!(h.store.list_items(&h.keys.end_queue), vec!["E".to_string()]);

    let seen_probe = Arc::clone(&seen);
    wait_until("handler to fire", move || !seen_probe.lock().is_empty()).await;
    let seen = seen.lock();
    assert_eq!(seen.len(), 1, "handler called exactly once");
    assert!(seen[0].contains("invalid value"));

    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn coordinator_loss_and_recovery() {
    let h = Harness::start();

    // A normal running task plus a seeded local task
    let (gate, stopped) = (Arc::new(Notify::new()), Arc::new(AtomicBool::new(false)));
    {
        let (gate, stopped) = (Arc::clone(&gate), Arc::clone(&stopped));
        h.worker.registry().register_factory("parked", move |_| {
            Ok(Arc::new(Parked {
                gate: Arc::clone(&gate),
                stopped: Arc::clone(&stopped),
            }))
        });
    }
    h.worker.start_local_task("parked", json!({}));

    let id = h.submit("N", "parked", json!({})).await;
    h.wait_for_state(&id, "RUNNING").await;
    let probe = h.store.clone();
    wait_until("seeded local task to run", move || {
        probe.hash_field("task-local-0", "state").as_deref() == Some("RUNNING")
    })
    .await;

    h.store.sever();
    {
        let stopped = Arc::clone(&stopped);
        wait_until("stop hook on loss", move || stopped.load(Ordering::SeqCst)).await;
    }

    h.store.restore();
    let probe = h.store.clone();
    wait_until("local task relaunched with a fresh id", move || {
        probe.hash_field("task-local-1", "state").as_deref() == Some("RUNNING")
    })
    .await;
    let probe = h.store.clone();
    wait_until("fresh control subscription to apply", move || {
        probe.subscribed_channels().contains("task-local-1-control")
    })
    .await;

    // Fresh subscriptions only: the broadcast channel, the relaunched
    // local task's control channel, nothing left over from before the
    // loss
    let channels = h.store.subscribed_channels();
    assert!(channels.contains("drover"), "channels: {channels:?}");
    assert!(channels.contains("task-local-1-control"), "channels: {channels:?}");
    assert!(!channels.contains("task-local-0-control"), "channels: {channels:?}");
    assert!(!channels.contains("task-N-control"), "channels: {channels:?}");

    // The interrupted normal task was neither finished nor requeued
    assert_eq!(h.state_of(&id), Some("RUNNING".to_string()));
    assert!(h.store.list_items(&h.keys.new_queue).is_empty());
    assert!(h.store.list_items(&h.keys.end_queue).is_empty());

    h.finish().await;
}
