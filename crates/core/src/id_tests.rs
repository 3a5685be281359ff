// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn task_id_round_trips_through_display() {
    let id = TaskId::new("abc-123");
    assert_eq!(id.to_string(), "abc-123");
    assert_eq!(id.as_str(), "abc-123");
}

#[test]
fn task_id_compares_against_str() {
    let id = TaskId::from("t1");
    assert_eq!(id, "t1");
    assert_eq!(id, *"t1");
}

#[test]
fn task_id_serde_is_transparent() {
    let id = TaskId::new("t-9");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"t-9\"");
    let back: TaskId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn uuid_gen_produces_distinct_ids() {
    let gen = UuidIdGen;
    let a = gen.generate();
    let b = gen.generate();
    assert_ne!(a, b);
    // v4 UUIDs are 36 chars with hyphens
    assert_eq!(a.as_str().len(), 36);
}

#[test]
fn seq_gen_counts_up() {
    let gen = SeqIdGen::default();
    assert_eq!(gen.generate(), "local-0");
    assert_eq!(gen.generate(), "local-1");
    let clone = gen.clone();
    assert_eq!(clone.generate(), "local-2");
}
