// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure classification and exception handlers.

use super::*;

#[tokio::test(start_paused = true)]
async fn expected_failure_ends_in_error() {
    let ctx = setup();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        ctx.handlers.lock().push(Arc::new(move |id: &TaskId, _: &TaskError| {
            seen.lock().push(id.to_string());
        }));
    }
    let id = ctx.put_task("a", "failing", json!({"msg": "bad input"})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "ERROR").await;

    assert_eq!(ctx.output_field(&id), Some("bad input".to_string()));
    assert_eq!(ctx.events_for(&id), vec![json!({"event": "error", "data": "bad input"})]);
    assert_eq!(ctx.end_queue(), vec!["a".to_string()]);
    assert!(!ctx.in_task_set(&id));
    // Expected failures never reach the exception handlers
    assert!(seen.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unexpected_failure_ends_in_exception_and_notifies_handlers() {
    let ctx = setup();
    let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        ctx.handlers.lock().push(Arc::new(move |id: &TaskId, err: &TaskError| {
            seen.lock().push((id.to_string(), err.to_string()));
        }));
    }
    let id = ctx.put_task("a", "crashing", json!({})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "EXCEPTION").await;

    let output = ctx.output_field(&id).unwrap();
    assert!(output.contains("wires crossed"), "output: {output}");
    assert_eq!(ctx.end_queue(), vec!["a".to_string()]);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1, "handler called exactly once");
    assert_eq!(seen[0].0, "a");
    assert!(seen[0].1.contains("wires crossed"));
}

#[tokio::test(start_paused = true)]
async fn panicking_body_ends_in_exception() {
    let ctx = setup();
    let id = ctx.put_task("a", "panicking", json!({})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "EXCEPTION").await;

    let output = ctx.output_field(&id).unwrap();
    assert!(output.contains("task panicked: boom"), "output: {output}");
    assert_eq!(ctx.end_queue(), vec!["a".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn handlers_run_in_insertion_order_and_panics_are_isolated() {
    let ctx = setup();
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let order = Arc::clone(&order);
        ctx.handlers.lock().push(Arc::new(move |_: &TaskId, _: &TaskError| {
            order.lock().push("first");
            panic!("handler misbehaves");
        }));
    }
    {
        let order = Arc::clone(&order);
        ctx.handlers.lock().push(Arc::new(move |_: &TaskId, _: &TaskError| {
            order.lock().push("second");
        }));
    }
    let id = ctx.put_task("a", "crashing", json!({})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "EXCEPTION").await;

    let store = ctx.store.clone();
    let end_queue = ctx.keys.end_queue.clone();
    wait_until("cleanup after handlers", || !store.list_items(&end_queue).is_empty()).await;

    assert_eq!(*order.lock(), vec!["first", "second"]);
    // The panicking handler did not block the handoff
    assert_eq!(ctx.end_queue(), vec!["a".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn output_is_written_with_the_terminal_state() {
    let ctx = setup();
    let id = ctx.put_task("a", "failing", json!({"msg": "nope"})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "ERROR").await;

    // Single update: by the time the state reads ERROR, output is there
    assert_eq!(ctx.output_field(&id), Some("nope".to_string()));
}
