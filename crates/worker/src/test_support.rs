// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task classes and helpers shared by the in-crate test suites.

use crate::task::{Task, TaskClass, TaskContext, TaskError, TaskScope};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Opt-in tracing for debugging a test run: `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Poll until `cond` holds. Panics after a generous number of attempts.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Returns its `msg` as the success output.
#[derive(Deserialize)]
pub struct Echo {
    pub msg: String,
}

#[async_trait]
impl Task for Echo {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        Ok(Value::String(self.msg.clone()))
    }
}

impl TaskClass for Echo {
    const NAME: &'static str = "echo";
}

/// Sleeps far longer than any test runs.
#[derive(Deserialize)]
pub struct Sleepy {
    #[serde(default = "default_sleep_secs")]
    pub secs: u64,
}

fn default_sleep_secs() -> u64 {
    3600
}

#[async_trait]
impl Task for Sleepy {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        tokio::time::sleep(Duration::from_secs(self.secs)).await;
        Ok(json!("slept"))
    }
}

impl TaskClass for Sleepy {
    const NAME: &'static str = "sleepy";
}

/// Signals an expected failure with its `msg`.
#[derive(Deserialize)]
pub struct Failing {
    pub msg: String,
}

#[async_trait]
impl Task for Failing {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        Err(TaskError::failed(self.msg.clone()))
    }
}

impl TaskClass for Failing {
    const NAME: &'static str = "failing";
}

/// Fails unexpectedly with a wrapped I/O error.
#[derive(Deserialize)]
pub struct Crashing {}

#[async_trait]
impl Task for Crashing {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        Err(TaskError::unexpected(std::io::Error::other("wires crossed")))
    }
}

impl TaskClass for Crashing {
    const NAME: &'static str = "crashing";
}

/// Panics outright.
#[derive(Deserialize)]
pub struct Panicking {}

#[async_trait]
impl Task for Panicking {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        panic!("boom");
    }
}

impl TaskClass for Panicking {
    const NAME: &'static str = "panicking";
}

/// Emits a custom event, then parks.
#[derive(Deserialize)]
pub struct Emitting {}

#[async_trait]
impl Task for Emitting {
    async fn start(&self, ctx: &TaskContext) -> Result<Value, TaskError> {
        ctx.emit("progress", json!({"pct": 50})).await?;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Value::Null)
    }
}

impl TaskClass for Emitting {
    const NAME: &'static str = "emitting";
}

/// Parks until released; records whether `stop` ran.
///
/// Built through a factory closure so tests can hold the probe's shared
/// state. With `release_on_stop`, the `stop` hook releases the body and
/// yields, letting a natural completion race the stop. With
/// `fail_on_release`, the released body fails instead of returning.
pub struct StopProbe {
    pub gate: Arc<Notify>,
    pub stopped: Arc<AtomicBool>,
    pub release_on_stop: bool,
    pub fail_on_release: bool,
}

impl StopProbe {
    pub fn parts() -> (Arc<Notify>, Arc<AtomicBool>) {
        (Arc::new(Notify::new()), Arc::new(AtomicBool::new(false)))
    }
}

#[async_trait]
impl Task for StopProbe {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        self.gate.notified().await;
        if self.fail_on_release {
            return Err(TaskError::unexpected(std::io::Error::other(
                "released into failure",
            )));
        }
        Ok(json!("released"))
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if self.release_on_stop {
            self.gate.notify_one();
            // Give the released body a chance to finish first
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Records scope enter/exit ordering.
pub struct ScopeProbe {
    pub log: Arc<Mutex<Vec<&'static str>>>,
    pub park: bool,
}

pub struct RecordingScope {
    pub log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl TaskScope for RecordingScope {
    async fn enter(&self) {
        self.log.lock().push("enter");
    }

    async fn exit(&self) {
        self.log.lock().push("exit");
    }
}

#[async_trait]
impl Task for ScopeProbe {
    async fn start(&self, _ctx: &TaskContext) -> Result<Value, TaskError> {
        self.log.lock().push("start");
        if self.park {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(Value::Null)
    }

    async fn stop(&self) {
        self.log.lock().push("stop");
    }

    fn scope(&self) -> Option<Arc<dyn TaskScope>> {
        Some(Arc::new(RecordingScope { log: Arc::clone(&self.log) }))
    }
}
