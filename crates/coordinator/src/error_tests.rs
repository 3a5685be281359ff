// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn display_includes_detail() {
    let err = CoordinatorError::Connection("refused".to_string());
    assert_eq!(err.to_string(), "coordinator connection: refused");
    let err = CoordinatorError::Command("bad reply".to_string());
    assert_eq!(err.to_string(), "coordinator command failed: bad reply");
}
