// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task class registry.
//!
//! The record's `task` field is a string resolved against this table;
//! the deserialized `data` object is the construction argument. The
//! table is populated at boot and survives coordinator-loss recovery.

use crate::task::{Task, TaskClass};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failure to materialize a task instance from its record.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("task class not registered: {0}")]
    MissingClass(String),

    #[error("invalid task data: {0}")]
    InvalidData(#[from] serde_json::Error),
}

type Factory = Box<dyn Fn(Value) -> Result<Arc<dyn Task>, BuildError> + Send + Sync>;

/// Mapping from class name to constructor.
#[derive(Default)]
pub struct Registry {
    factories: Mutex<HashMap<String, Factory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task class under its declared `NAME`.
    ///
    /// Registering the same name again replaces the earlier factory.
    pub fn register<T: TaskClass>(&self) {
        self.register_factory(T::NAME, |data| {
            let task: T = serde_json::from_value(data)?;
            Ok(Arc::new(task))
        });
    }

    /// Register an explicit factory, for classes built dynamically.
    pub fn register_factory(
        &self,
        name: &str,
        factory: impl Fn(Value) -> Result<Arc<dyn Task>, BuildError> + Send + Sync + 'static,
    ) {
        self.factories.lock().insert(name.to_string(), Box::new(factory));
    }

    /// Check whether a class name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.lock().contains_key(name)
    }

    /// Registered class names, for startup logging.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Build an instance of `name` from its construction data.
    pub fn build(&self, name: &str, data: Value) -> Result<Arc<dyn Task>, BuildError> {
        let factories = self.factories.lock();
        let factory = factories
            .get(name)
            .ok_or_else(|| BuildError::MissingClass(name.to_string()))?;
        factory(data)
    }
}

impl From<BuildError> for crate::task::TaskError {
    fn from(e: BuildError) -> Self {
        crate::task::TaskError::unexpected(e)
    }
}

/// Register several task classes on a worker in one statement.
///
/// ```ignore
/// register_tasks!(worker, Echo, Monitor, Import);
/// ```
#[macro_export]
macro_rules! register_tasks {
    ($worker:expr, $( $task:ty ),+ $(,)?) => {
        $( $worker.register::<$task>(); )+
    };
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
