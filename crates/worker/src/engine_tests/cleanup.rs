// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cleanup, the `cleanup` flag, scopes, and the coordinator-loss halt.

use super::*;
use std::sync::atomic::Ordering;

#[tokio::test(start_paused = true)]
async fn cleanup_is_idempotent() {
    let ctx = setup();
    let id = ctx.put_task("a", "echo", json!({"msg": "hi"})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "SUCCESS").await;
    assert_eq!(ctx.end_queue(), vec!["a".to_string()]);

    // A second cleanup must not hand the id off again
    ctx.engine.cleanup_task(&id, true).await.unwrap();
    assert_eq!(ctx.end_queue(), vec!["a".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn cleanup_false_suppresses_the_handoff() {
    let ctx = setup();
    let id = TaskId::from("a");
    ctx.store
        .hash_set(
            &ctx.keys.task_key(&id),
            &TaskRecord::new("echo", json!({"msg": "hi"})).without_cleanup().to_pairs(),
        )
        .await
        .unwrap();

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "SUCCESS").await;

    assert!(ctx.end_queue().is_empty());
    // Handoff suppressed means the claim is not released either
    assert!(ctx.in_task_set(&id));
    assert!(!ctx.engine.is_tracking(&id));
}

#[tokio::test(start_paused = true)]
async fn scope_wraps_the_task_lifetime() {
    let ctx = setup();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let log = Arc::clone(&log);
        ctx.registry.register_factory("scoped", move |_| {
            Ok(Arc::new(ScopeProbe { log: Arc::clone(&log), park: false }))
        });
    }
    let id = ctx.put_task("a", "scoped", json!({})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "SUCCESS").await;

    let log = log.lock().clone();
    assert_eq!(log, vec!["enter", "start", "exit"]);
}

#[tokio::test(start_paused = true)]
async fn scope_exits_on_the_stop_path() {
    let ctx = setup();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let log = Arc::clone(&log);
        ctx.registry.register_factory("scoped", move |_| {
            Ok(Arc::new(ScopeProbe { log: Arc::clone(&log), park: true }))
        });
    }
    let id = ctx.put_task("a", "scoped", json!({})).await;
    ctx.engine.add_task(id.clone()).await.unwrap();
    {
        let log = Arc::clone(&log);
        wait_until("body to start", move || log.lock().contains(&"start")).await;
    }

    ctx.engine.stop_task(&id).await.unwrap();

    let log = log.lock().clone();
    assert_eq!(log, vec!["enter", "start", "stop", "exit"]);
}

#[tokio::test(start_paused = true)]
async fn halt_stops_everything_without_coordinator_traffic() {
    let ctx = setup();
    let (gate, stopped) = StopProbe::parts();
    {
        let (gate, stopped) = (Arc::clone(&gate), Arc::clone(&stopped));
        ctx.registry.register_factory("probe", move |_| {
            Ok(Arc::new(StopProbe {
                gate: Arc::clone(&gate),
                stopped: Arc::clone(&stopped),
                release_on_stop: false,
                fail_on_release: false,
            }))
        });
    }
    let id = ctx.put_task("a", "probe", json!({})).await;
    ctx.engine.add_task(id.clone()).await.unwrap();

    // Coordinator is gone; nothing below may touch it
    ctx.store.sever();
    ctx.engine.halt_all_local().await;

    assert!(stopped.load(Ordering::SeqCst), "stop hook should have run");
    assert!(!ctx.engine.is_tracking(&id));
    assert!(ctx.subscriptions.is_empty());

    // The coordinator view is untouched: still RUNNING, claim in place
    ctx.store.restore();
    assert_eq!(ctx.state_field(&id), Some("RUNNING".to_string()));
    assert!(ctx.in_task_set(&id));
    assert!(ctx.end_queue().is_empty());
    assert!(ctx.events_for(&id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_completion_after_halt_is_dropped() {
    let ctx = setup();
    let (gate, stopped) = StopProbe::parts();
    {
        let (gate, stopped) = (Arc::clone(&gate), Arc::clone(&stopped));
        ctx.registry.register_factory("probe", move |_| {
            Ok(Arc::new(StopProbe {
                gate: Arc::clone(&gate),
                stopped: Arc::clone(&stopped),
                release_on_stop: false,
                fail_on_release: false,
            }))
        });
    }
    let id = ctx.put_task("a", "probe", json!({})).await;
    ctx.engine.add_task(id.clone()).await.unwrap();

    ctx.store.sever();
    ctx.engine.halt_all_local().await;
    ctx.store.restore();

    // Even if the body were released now, its completion goes nowhere
    gate.notify_one();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(ctx.state_field(&id), Some("RUNNING".to_string()));
    assert!(ctx.end_queue().is_empty());
}
