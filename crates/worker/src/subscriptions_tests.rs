// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn subscribe_routes_and_queues_a_command() {
    let (handle, mut rx) = SubscriptionHandle::new();
    handle.subscribe("task-1-control".to_string(), TaskId::from("1"));

    assert_eq!(handle.route("task-1-control"), Some(TaskId::from("1")));
    assert!(matches!(rx.try_recv(), Ok(SubCommand::Subscribe(ch)) if ch == "task-1-control"));
}

#[test]
fn unsubscribe_removes_route_and_reports_existence() {
    let (handle, mut rx) = SubscriptionHandle::new();
    handle.subscribe("ch".to_string(), TaskId::from("1"));
    let _ = rx.try_recv();

    assert!(handle.unsubscribe("ch"));
    assert_eq!(handle.route("ch"), None);
    assert!(matches!(rx.try_recv(), Ok(SubCommand::Unsubscribe(ch)) if ch == "ch"));

    // Second unsubscribe: no route, no command
    assert!(!handle.unsubscribe("ch"));
    assert!(rx.try_recv().is_err());
}

#[test]
fn send_with_dispatcher_gone_is_silent() {
    let (handle, rx) = SubscriptionHandle::new();
    drop(rx);
    handle.subscribe("ch".to_string(), TaskId::from("1"));
    assert_eq!(handle.route("ch"), Some(TaskId::from("1")));
}

#[test]
fn is_empty_tracks_routes() {
    let (handle, _rx) = SubscriptionHandle::new();
    assert!(handle.is_empty());
    handle.subscribe("ch".to_string(), TaskId::from("1"));
    assert!(!handle.is_empty());
    handle.unsubscribe("ch");
    assert!(handle.is_empty());
}
