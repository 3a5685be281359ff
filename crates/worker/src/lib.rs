// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-worker: the task-worker daemon.
//!
//! A [`Worker`] claims task ids from a shared coordinator queue, builds
//! the registered task class for each, runs the task body as a tokio
//! task, mirrors lifecycle state back into the coordinator, and obeys
//! per-task `stop`/`reload` control messages. Many workers may share one
//! coordinator; each task has at most one owner at a time.
//!
//! ```no_run
//! # use drover_worker::{Worker, WorkerConfig, register_tasks};
//! # use drover_worker::{Task, TaskClass, TaskContext, TaskError};
//! # use serde::Deserialize;
//! # #[derive(Deserialize)] struct Echo { msg: String }
//! # #[async_trait::async_trait]
//! # impl Task for Echo {
//! #     async fn start(&self, _ctx: &TaskContext) -> Result<serde_json::Value, TaskError> {
//! #         Ok(serde_json::Value::String(self.msg.clone()))
//! #     }
//! # }
//! # impl TaskClass for Echo { const NAME: &'static str = "echo"; }
//! # async fn run() -> Result<(), drover_worker::WorkerError> {
//! let worker = Worker::connect(WorkerConfig::default()).await?;
//! register_tasks!(worker, Echo);
//! worker.run().await
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod task;
pub mod worker;

mod dispatcher;
mod loops;
mod subscriptions;

#[cfg(test)]
mod test_support;

pub use config::WorkerConfig;
pub use engine::{Engine, ExceptionHandler};
pub use error::WorkerError;
pub use registry::{BuildError, Registry};
pub use task::{Task, TaskClass, TaskContext, TaskError, TaskScope};
pub use worker::{ShutdownHandle, Worker};
