// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor tests: clean shutdown and coordinator-loss recovery.

use super::*;
use crate::test_support::{wait_until, Sleepy, StopProbe};
use drover_core::{FakeClock, SeqIdGen};
use drover_coordinator::{submit, MemoryCoordinator};
use serde_json::json;
use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;

fn spawn_run(worker: &Arc<Worker<FakeClock>>) -> JoinHandle<Result<(), WorkerError>> {
    let worker = Arc::clone(worker);
    tokio::spawn(async move { worker.run().await })
}

fn test_worker(store: &MemoryCoordinator) -> Arc<Worker<FakeClock>> {
    crate::test_support::init_tracing();
    Arc::new(Worker::with_parts(
        WorkerConfig::default(),
        Arc::new(store.clone()),
        FakeClock::new(),
        Arc::new(SeqIdGen::default()),
    ))
}

#[tokio::test(start_paused = true)]
async fn shutdown_requeues_running_tasks() {
    let store = MemoryCoordinator::new();
    let worker = test_worker(&store);
    worker.register::<Sleepy>();
    let keys = worker.keys.clone();

    let running = spawn_run(&worker);
    submit(
        &store,
        &keys,
        &TaskId::from("b"),
        &drover_core::TaskRecord::new("sleepy", json!({})),
    )
    .await
    .unwrap();

    let probe = store.clone();
    wait_until("task to run", move || {
        probe.hash_field("task-b", "state").as_deref() == Some("RUNNING")
    })
    .await;

    worker.shutdown_handle().shutdown();
    running.await.unwrap().unwrap();

    // Stopped locally, then handed to another worker via the new queue
    assert_eq!(store.hash_field("task-b", "state"), Some("STOPPED".to_string()));
    assert_eq!(store.list_items(&keys.new_queue), vec!["b".to_string()]);
    assert!(store.list_items(&keys.end_queue).is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_deletes_local_tasks() {
    let store = MemoryCoordinator::new();
    let worker = test_worker(&store);
    worker.register::<Sleepy>();
    worker.start_local_task("sleepy", json!({}));
    let keys = worker.keys.clone();

    let running = spawn_run(&worker);
    let probe = store.clone();
    wait_until("local task to run", move || {
        probe.hash_field("task-local-0", "state").as_deref() == Some("RUNNING")
    })
    .await;
    assert_eq!(store.hash_field("task-local-0", "local"), Some("true".to_string()));

    worker.shutdown_handle().shutdown();
    running.await.unwrap().unwrap();

    assert!(!store.hash_exists("task-local-0"));
    assert!(!store.set_members(&keys.task_set).contains("local-0"));
    assert!(store.list_items(&keys.new_queue).is_empty());
}

#[tokio::test(start_paused = true)]
async fn coordinator_loss_relaunches_local_tasks_with_fresh_ids() {
    let store = MemoryCoordinator::new();
    let worker = test_worker(&store);

    let (gate, stopped) = StopProbe::parts();
    {
        let (gate, stopped) = (Arc::clone(&gate), Arc::clone(&stopped));
        worker.registry().register_factory("probe", move |_| {
            Ok(Arc::new(StopProbe {
                gate: Arc::clone(&gate),
                stopped: Arc::clone(&stopped),
                release_on_stop: false,
                fail_on_release: false,
            }))
        });
    }
    worker.start_local_task("probe", json!({}));

    let running = spawn_run(&worker);
    let probe = store.clone();
    wait_until("local task to run", move || {
        probe.hash_field("task-local-0", "state").as_deref() == Some("RUNNING")
    })
    .await;

    store.sever();
    let stopped_probe = Arc::clone(&stopped);
    wait_until("stop hook on loss", move || stopped_probe.load(Ordering::SeqCst)).await;

    store.restore();
    let probe = store.clone();
    wait_until("relaunch with a fresh id", move || {
        probe.hash_field("task-local-1", "state").as_deref() == Some("RUNNING")
    })
    .await;
    let probe = store.clone();
    wait_until("fresh control subscription to apply", move || {
        probe.subscribed_channels().contains("task-local-1-control")
    })
    .await;

    // The relaunched task is a fresh registration, not the old id
    assert_eq!(store.hash_field("task-local-1", "local"), Some("true".to_string()));
    assert!(store.set_members("tasks").contains("local-1"));

    // No subscription survives from before the loss
    let channels = store.subscribed_channels();
    assert!(channels.contains("task-local-1-control"), "channels: {channels:?}");
    assert!(!channels.contains("task-local-0-control"), "channels: {channels:?}");

    worker.shutdown_handle().shutdown();
    running.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_waiting_for_coordinator_exits() {
    let store = MemoryCoordinator::new();
    let worker = test_worker(&store);
    let running = spawn_run(&worker);

    let probe = store.clone();
    wait_until("worker to come up", move || {
        probe.subscribed_channels().contains("drover")
    })
    .await;

    store.sever();
    // Give the worker time to fall into the recovery wait
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    worker.shutdown_handle().shutdown();
    running.await.unwrap().unwrap();
}
