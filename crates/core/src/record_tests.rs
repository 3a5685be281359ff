// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn cleanup_defaults_to_enabled() {
    assert!(cleanup_enabled(None));
    assert!(cleanup_enabled(Some("")));
    assert!(cleanup_enabled(Some("true")));
    assert!(cleanup_enabled(Some("False")));
    assert!(!cleanup_enabled(Some("false")));
}

#[test]
fn record_pairs_omit_default_flags() {
    let record = TaskRecord::new("echo", json!({"msg": "hi"}));
    let pairs = record.to_pairs();
    assert_eq!(
        pairs,
        vec![
            ("task", "echo".to_string()),
            ("data", "{\"msg\":\"hi\"}".to_string()),
        ]
    );
}

#[test]
fn record_pairs_write_cleanup_false() {
    let pairs = TaskRecord::new("echo", json!({})).without_cleanup().to_pairs();
    assert!(pairs.contains(&("cleanup", "false".to_string())));
}

#[test]
fn local_record_marks_itself() {
    let pairs = TaskRecord::local("monitor", json!({"n": 1})).to_pairs();
    assert!(pairs.contains(&("local", "true".to_string())));
    assert!(!pairs.iter().any(|(k, _)| *k == "cleanup"));
}
