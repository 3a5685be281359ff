// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator error type.

use thiserror::Error;

/// Errors from coordinator operations.
///
/// Workers do not distinguish the variants: any coordinator error that
/// reaches the supervisor triggers the down-recovery path, mirroring the
/// catch-all over the client library's connection and cluster errors.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("coordinator connection: {0}")]
    Connection(String),

    #[error("coordinator command failed: {0}")]
    Command(String),
}

impl From<redis::RedisError> for CoordinatorError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
            CoordinatorError::Connection(e.to_string())
        } else {
            CoordinatorError::Command(e.to_string())
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
