// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine test suite: state machine, control handling, failure
//! classification, cleanup. Runs against the in-memory coordinator with
//! a fake clock; tokio time is paused so parked bodies cost nothing.

mod cleanup;
mod control;
mod failures;
mod lifecycle;

use super::*;
use crate::subscriptions::SubCommand;
use crate::test_support::*;
use drover_core::{FakeClock, TaskRecord};
use drover_coordinator::MemoryCoordinator;
use serde_json::json;
use tokio::sync::mpsc;

pub(super) struct TestContext {
    pub store: MemoryCoordinator,
    pub keys: KeySchema,
    pub clock: FakeClock,
    pub registry: Arc<Registry>,
    pub handlers: Arc<Mutex<Vec<ExceptionHandler>>>,
    pub local_ids: Arc<Mutex<HashSet<TaskId>>>,
    pub subscriptions: SubscriptionHandle,
    pub engine: Arc<Engine<FakeClock>>,
    // Held open so subscription commands have somewhere to go
    _commands: mpsc::UnboundedReceiver<SubCommand>,
}

pub(super) fn setup() -> TestContext {
    init_tracing();
    let store = MemoryCoordinator::new();
    let keys = KeySchema::default();
    let clock = FakeClock::new();

    let registry = Arc::new(Registry::new());
    registry.register::<Echo>();
    registry.register::<Sleepy>();
    registry.register::<Failing>();
    registry.register::<Crashing>();
    registry.register::<Panicking>();
    registry.register::<Emitting>();

    let handlers = Arc::new(Mutex::new(Vec::new()));
    let local_ids = Arc::new(Mutex::new(HashSet::new()));
    let (subscriptions, commands) = SubscriptionHandle::new();

    let engine = Engine::new(
        Arc::new(store.clone()),
        keys.clone(),
        Arc::clone(&registry),
        Arc::clone(&handlers),
        Arc::clone(&local_ids),
        subscriptions.clone(),
        clock.clone(),
    );

    TestContext {
        store,
        keys,
        clock,
        registry,
        handlers,
        local_ids,
        subscriptions,
        engine,
        _commands: commands,
    }
}

impl TestContext {
    /// Write a task record the way a producer would.
    pub async fn put_task(&self, id: &str, class: &str, data: serde_json::Value) -> TaskId {
        let id = TaskId::from(id);
        self.store
            .hash_set(&self.keys.task_key(&id), &TaskRecord::new(class, data).to_pairs())
            .await
            .unwrap();
        id
    }

    pub fn state_field(&self, id: &TaskId) -> Option<String> {
        self.store.hash_field(&self.keys.task_key(id), "state")
    }

    pub fn output_field(&self, id: &TaskId) -> Option<String> {
        self.store.hash_field(&self.keys.task_key(id), "output")
    }

    pub fn end_queue(&self) -> Vec<String> {
        self.store.list_items(&self.keys.end_queue)
    }

    pub fn in_task_set(&self, id: &TaskId) -> bool {
        self.store.set_members(&self.keys.task_set).contains(id.as_str())
    }

    pub fn events_for(&self, id: &TaskId) -> Vec<serde_json::Value> {
        self.store
            .published_on(&self.keys.event_channel(id))
            .iter()
            .filter_map(|payload| serde_json::from_str(payload).ok())
            .collect()
    }

    /// Wait for the task hash to reach a terminal `state`.
    pub async fn wait_for_state(&self, id: &TaskId, state: &str) {
        let key = self.keys.task_key(id);
        let store = self.store.clone();
        wait_until(&format!("{id} to reach {state}"), || {
            store.hash_field(&key, "state").as_deref() == Some(state)
        })
        .await;
    }
}
