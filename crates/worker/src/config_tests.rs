// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drover_core::TaskId;

#[test]
fn defaults() {
    let config = WorkerConfig::default();
    assert_eq!(config.task_prefix, "task");
    assert_eq!(config.task_set, "tasks");
    assert_eq!(config.new_queue, "new-task");
    assert_eq!(config.end_queue, "end-task");
    assert_eq!(config.update_interval, Duration::from_secs(5));
}

#[test]
fn setters_chain() {
    let config = WorkerConfig::default()
        .redis_url("redis://example:7000/1")
        .task_prefix("job")
        .update_interval(Duration::from_secs(1));
    assert_eq!(config.redis_url, "redis://example:7000/1");
    assert_eq!(config.task_prefix, "job");
    assert_eq!(config.update_interval, Duration::from_secs(1));
}

#[test]
fn key_schema_reflects_overrides() {
    let keys = WorkerConfig::default().task_prefix("job").end_queue("done").key_schema();
    assert_eq!(keys.task_key(&TaskId::from("1")), "job-1");
    assert_eq!(keys.end_queue, "done");
}
