// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator and subscriber traits.

use crate::error::CoordinatorError;
use async_trait::async_trait;

/// A pub/sub message delivered to a [`Subscriber`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: String,
    pub payload: String,
}

/// The shared data store workers coordinate through.
///
/// One call is one atomic coordinator operation; no multi-key
/// transactions are offered or needed. Implementations must be cheap to
/// call concurrently from several tasks (`&self` methods, internal
/// cloning or locking).
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Read named fields from a hash. A missing hash yields all-`None`.
    async fn hash_get(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Vec<Option<String>>, CoordinatorError>;

    /// Write field/value pairs into a hash in a single update.
    async fn hash_set(
        &self,
        key: &str,
        pairs: &[(&str, String)],
    ) -> Result<(), CoordinatorError>;

    /// Delete a key outright.
    async fn delete(&self, key: &str) -> Result<(), CoordinatorError>;

    /// Add a member to a set.
    async fn set_add(&self, set: &str, member: &str) -> Result<(), CoordinatorError>;

    /// Remove a member from a set.
    async fn set_remove(&self, set: &str, member: &str) -> Result<(), CoordinatorError>;

    /// Push a value onto the left end of a list.
    async fn push_front(&self, list: &str, value: &str) -> Result<(), CoordinatorError>;

    /// Pop from the right end of a list, waiting until a value arrives.
    async fn pop_back_blocking(&self, list: &str) -> Result<String, CoordinatorError>;

    /// Publish a payload on a channel.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), CoordinatorError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), CoordinatorError>;

    /// Open a fresh pub/sub subscriber.
    async fn subscriber(&self) -> Result<Box<dyn Subscriber>, CoordinatorError>;
}

/// A pub/sub connection polled by the worker's dispatcher.
///
/// `try_next` is a non-blocking drain step: `Ok(None)` means no message
/// is currently pending, not end-of-stream. A dead connection is an
/// error.
#[async_trait]
pub trait Subscriber: Send {
    async fn subscribe(&mut self, channel: &str) -> Result<(), CoordinatorError>;

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), CoordinatorError>;

    async fn try_next(&mut self) -> Result<Option<Message>, CoordinatorError>;
}
