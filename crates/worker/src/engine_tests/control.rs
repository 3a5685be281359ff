// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stop, reload, and control-message handling.

use super::*;
use std::sync::atomic::Ordering;

#[tokio::test(start_paused = true)]
async fn stop_runs_hook_and_skips_end_queue() {
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
    let id = ctx.put_task("b", "probe", json!({})).await;
    ctx.engine.add_task(id.clone()).await.unwrap();

    ctx.engine.stop_task(&id).await.unwrap();

    assert!(stopped.load(Ordering::SeqCst), "stop hook should have run");
    assert_eq!(ctx.state_field(&id), Some("STOPPED".to_string()));
    assert!(ctx.end_queue().is_empty());
    // A non-enqueueing cleanup leaves the active-set claim in place
    assert!(ctx.in_task_set(&id));
    assert!(!ctx.engine.is_tracking(&id));
    assert!(ctx.subscriptions.is_empty());
    assert!(ctx.events_for(&id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn completion_racing_a_stop_is_dropped() {
    let ctx = setup();
    let (gate, stopped) = StopProbe::parts();
    {
        let (gate, stopped) = (Arc::clone(&gate), Arc::clone(&stopped));
        ctx.registry.register_factory("probe", move |_| {
            Ok(Arc::new(StopProbe {
                gate: Arc::clone(&gate),
                stopped: Arc::clone(&stopped),
                // stop() releases the body and yields, so the natural
                // completion lands while the task is marked STOPPED
                release_on_stop: true,
                fail_on_release: false,
            }))
        });
    }
    let id = ctx.put_task("b", "probe", json!({})).await;
    ctx.engine.add_task(id.clone()).await.unwrap();

    ctx.engine.stop_task(&id).await.unwrap();
    // Let any raced completion wash through
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert_eq!(ctx.state_field(&id), Some("STOPPED".to_string()));
    assert!(ctx.end_queue().is_empty());
    assert!(ctx.events_for(&id).is_empty(), "no success event may follow a stop");
}

#[tokio::test(start_paused = true)]
async fn failure_racing_a_stop_is_dropped() {
    let ctx = setup();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        ctx.handlers.lock().push(Arc::new(move |id: &TaskId, _: &TaskError| {
            seen.lock().push(id.to_string());
        }));
    }
    let (gate, stopped) = StopProbe::parts();
    {
        let (gate, stopped) = (Arc::clone(&gate), Arc::clone(&stopped));
        ctx.registry.register_factory("probe", move |_| {
            Ok(Arc::new(StopProbe {
                gate: Arc::clone(&gate),
                stopped: Arc::clone(&stopped),
                // stop() releases the body and yields; the released body
                // fails, and that failure lands while the task is marked
                // STOPPED
                release_on_stop: true,
                fail_on_release: true,
            }))
        });
    }
    let id = ctx.put_task("b", "probe", json!({})).await;
    ctx.engine.add_task(id.clone()).await.unwrap();

    ctx.engine.stop_task(&id).await.unwrap();
    // Let any raced failure wash through
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert_eq!(ctx.state_field(&id), Some("STOPPED".to_string()));
    assert!(ctx.end_queue().is_empty());
    assert!(ctx.events_for(&id).is_empty(), "no event may follow a stop");
    assert!(seen.lock().is_empty(), "no handler may run for a stopped task");
}

#[tokio::test(start_paused = true)]
async fn late_failure_after_stop_cleanup_is_dropped() {
    let ctx = setup();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        ctx.handlers.lock().push(Arc::new(move |id: &TaskId, _: &TaskError| {
            seen.lock().push(id.to_string());
        }));
    }
    let (gate, stopped) = StopProbe::parts();
    {
        let (gate, stopped) = (Arc::clone(&gate), Arc::clone(&stopped));
        ctx.registry.register_factory("probe", move |_| {
            Ok(Arc::new(StopProbe {
                gate: Arc::clone(&gate),
                stopped: Arc::clone(&stopped),
                release_on_stop: false,
                fail_on_release: true,
            }))
        });
    }
    let id = ctx.put_task("b", "probe", json!({})).await;
    ctx.engine.add_task(id.clone()).await.unwrap();

    // Stop runs to completion: STOPPED written, entry removed
    ctx.engine.stop_task(&id).await.unwrap();
    assert!(!ctx.engine.is_tracking(&id));

    // A watcher whose body had already failed can still deliver its
    // outcome after the cleanup; it must be dropped, not recorded
    ctx.engine
        .on_task_failure(
            &id,
            TaskError::unexpected(std::io::Error::other("late failure")),
            true,
        )
        .await
        .unwrap();

    assert_eq!(ctx.state_field(&id), Some("STOPPED".to_string()));
    assert!(ctx.end_queue().is_empty());
    assert!(ctx.events_for(&id).is_empty(), "no event may follow a stop");
    assert!(seen.lock().is_empty(), "no handler may run for a stopped task");
}

#[tokio::test(start_paused = true)]
async fn stop_for_unknown_task_is_ignored() {
    let ctx = setup();
    ctx.engine.stop_task(&TaskId::from("nope")).await.unwrap();
    assert!(ctx.end_queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_control_payload_is_ignored() {
    let ctx = setup();
    let id = ctx.put_task("a", "sleepy", json!({})).await;
    ctx.engine.add_task(id.clone()).await.unwrap();

    ctx.engine.control_task(&id, "restart").await.unwrap();

    assert_eq!(ctx.state_field(&id), Some("RUNNING".to_string()));
    assert!(ctx.engine.is_tracking(&id));
}

#[tokio::test(start_paused = true)]
async fn control_stop_goes_through_the_stop_path() {
    let ctx = setup();
    let id = ctx.put_task("a", "sleepy", json!({})).await;
    ctx.engine.add_task(id.clone()).await.unwrap();

    ctx.engine.control_task(&id, "stop").await.unwrap();

    assert_eq!(ctx.state_field(&id), Some("STOPPED".to_string()));
    assert!(!ctx.engine.is_tracking(&id));
}

#[tokio::test(start_paused = true)]
async fn reload_rebuilds_from_the_updated_record() {
    let ctx = setup();
    let builds: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let builds = Arc::clone(&builds);
        ctx.registry.register_factory("counting", move |data| {
            let n = data.get("n").and_then(|v| v.as_i64()).unwrap_or(-1);
            builds.lock().push(n);
            Ok(Arc::new(Sleepy { secs: 3600 }))
        });
    }
    let id = ctx.put_task("c", "counting", json!({"n": 1})).await;
    ctx.engine.add_task(id.clone()).await.unwrap();
    assert_eq!(*builds.lock(), vec![1]);

    // External actor rewrites the data, then reloads
    ctx.store
        .hash_set(&ctx.keys.task_key(&id), &[("data", "{\"n\":2}".to_string())])
        .await
        .unwrap();
    ctx.engine.control_task(&id, "reload").await.unwrap();

    assert_eq!(*builds.lock(), vec![1, 2]);
    assert_eq!(ctx.state_field(&id), Some("RUNNING".to_string()));
    assert_eq!(ctx.engine.task_state(&id), Some(TaskState::Running));
    // The control channel is routed again for the fresh instance
    assert_eq!(
        ctx.subscriptions.route(&ctx.keys.control_channel(&id)),
        Some(id.clone())
    );
    assert!(ctx.in_task_set(&id));
}
