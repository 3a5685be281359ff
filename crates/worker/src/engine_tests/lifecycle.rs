// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Acquisition and the happy path.

use super::*;

#[tokio::test(start_paused = true)]
async fn happy_path_success() {
    let ctx = setup();
    let id = ctx.put_task("a", "echo", json!({"msg": "hi"})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "SUCCESS").await;

    assert_eq!(ctx.output_field(&id), Some("\"hi\"".to_string()));
    assert_eq!(ctx.end_queue(), vec!["a".to_string()]);
    assert!(!ctx.in_task_set(&id));
    assert!(!ctx.engine.is_tracking(&id));
    assert!(ctx.subscriptions.is_empty());

    let events = ctx.events_for(&id);
    assert_eq!(events, vec![json!({"event": "success", "data": "hi"})]);
}

#[tokio::test(start_paused = true)]
async fn acquisition_marks_running_and_claims_ownership() {
    let ctx = setup();
    let id = ctx.put_task("a", "sleepy", json!({})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();

    assert_eq!(ctx.state_field(&id), Some("RUNNING".to_string()));
    assert_eq!(
        ctx.store.hash_field(&ctx.keys.task_key(&id), "last_update"),
        Some(ctx.clock.epoch_secs().to_string())
    );
    assert!(ctx.in_task_set(&id));
    assert_eq!(ctx.engine.task_state(&id), Some(TaskState::Running));
    assert_eq!(
        ctx.subscriptions.route(&ctx.keys.control_channel(&id)),
        Some(id.clone())
    );
}

#[tokio::test(start_paused = true)]
async fn missing_hash_is_dropped() {
    let ctx = setup();
    let id = TaskId::from("ghost");

    ctx.engine.add_task(id.clone()).await.unwrap();

    assert!(!ctx.in_task_set(&id));
    assert!(ctx.end_queue().is_empty());
    assert_eq!(ctx.engine.task_count(), 0);
    assert!(ctx.subscriptions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_class_ends_in_exception() {
    let ctx = setup();
    let id = ctx.put_task("a", "unregistered", json!({})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "EXCEPTION").await;

    let output = ctx.output_field(&id).unwrap();
    assert!(output.contains("task class not registered: unregistered"), "output: {output}");
    // The instance was never built, so nothing is tracked and no event
    // goes out
    assert!(!ctx.engine.is_tracking(&id));
    assert!(ctx.events_for(&id).is_empty());
    // The id is still handed off
    assert_eq!(ctx.end_queue(), vec!["a".to_string()]);
    assert!(!ctx.in_task_set(&id));
}

#[tokio::test(start_paused = true)]
async fn unparseable_data_ends_in_exception() {
    let ctx = setup();
    let id = TaskId::from("a");
    ctx.store
        .hash_set(
            &ctx.keys.task_key(&id),
            &[("task", "echo".to_string()), ("data", "{not json".to_string())],
        )
        .await
        .unwrap();

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "EXCEPTION").await;

    assert!(ctx.output_field(&id).unwrap().contains("invalid task data"));
    assert!(!ctx.engine.is_tracking(&id));
}

#[tokio::test(start_paused = true)]
async fn mismatched_data_ends_in_exception() {
    let ctx = setup();
    let id = ctx.put_task("a", "echo", json!({"wrong_field": 1})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "EXCEPTION").await;

    assert!(ctx.output_field(&id).unwrap().contains("invalid task data"));
}

#[tokio::test(start_paused = true)]
async fn absent_data_field_defaults_to_empty_object() {
    let ctx = setup();
    let id = TaskId::from("a");
    ctx.store
        .hash_set(&ctx.keys.task_key(&id), &[("task", "crashing".to_string())])
        .await
        .unwrap();

    ctx.engine.add_task(id.clone()).await.unwrap();
    // Crashing builds from {} fine, then fails in the body
    ctx.wait_for_state(&id, "EXCEPTION").await;
    assert!(ctx.output_field(&id).unwrap().contains("wires crossed"));
}

#[tokio::test(start_paused = true)]
async fn task_emits_through_its_context() {
    let ctx = setup();
    let id = ctx.put_task("a", "emitting", json!({})).await;

    ctx.engine.add_task(id.clone()).await.unwrap();
    let store = ctx.store.clone();
    let channel = ctx.keys.event_channel(&id);
    wait_until("emit to land", || !store.published_on(&channel).is_empty()).await;

    assert_eq!(
        ctx.events_for(&id),
        vec![json!({"event": "progress", "data": {"pct": 50}})]
    );
}

#[tokio::test(start_paused = true)]
async fn local_task_completing_naturally_is_still_handed_off() {
    let ctx = setup();
    let id = TaskId::from("loc");
    ctx.local_ids.lock().insert(id.clone());
    ctx.store
        .hash_set(
            &ctx.keys.task_key(&id),
            &TaskRecord::local("echo", json!({"msg": "hi"})).to_pairs(),
        )
        .await
        .unwrap();

    ctx.engine.add_task(id.clone()).await.unwrap();
    ctx.wait_for_state(&id, "SUCCESS").await;

    // Local-ness only matters on the supervisor's shutdown paths; a
    // natural completion is handed off like any other
    assert_eq!(ctx.end_queue(), vec!["loc".to_string()]);
    assert!(!ctx.in_task_set(&id));
}

#[tokio::test(start_paused = true)]
async fn liveness_stamp_touches_only_running_tasks() {
    let ctx = setup();
    let running = ctx.put_task("a", "sleepy", json!({})).await;
    let parked = ctx.put_task("b", "sleepy", json!({})).await;
    ctx.engine.add_task(running.clone()).await.unwrap();
    ctx.engine.add_task(parked.clone()).await.unwrap();

    // Force b mid-transition; its stamp must not move
    ctx.engine.tasks.lock().get_mut(&parked).unwrap().state = TaskState::Stopped;

    let before = ctx.store.hash_field(&ctx.keys.task_key(&parked), "last_update").unwrap();
    ctx.clock.advance(std::time::Duration::from_secs(5));
    ctx.engine.stamp_running().await.unwrap();

    assert_eq!(
        ctx.store.hash_field(&ctx.keys.task_key(&running), "last_update"),
        Some(ctx.clock.epoch_secs().to_string())
    );
    assert_eq!(
        ctx.store.hash_field(&ctx.keys.task_key(&parked), "last_update"),
        Some(before)
    );
}
