// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker error type.

use drover_coordinator::CoordinatorError;
use thiserror::Error;

/// Errors surfaced from [`Worker::run`](crate::Worker::run).
///
/// Coordinator errors never escape `run`: they put the worker into the
/// down-recovery path instead. The remaining variants are genuine bugs
/// (a supposedly-infinite loop returned, or panicked).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("worker loop '{0}' exited unexpectedly")]
    LoopExited(&'static str),

    #[error("worker loop '{0}' panicked")]
    LoopPanicked(&'static str),
}
