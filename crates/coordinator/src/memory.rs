// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory coordinator for tests.
//!
//! Implements the full seam (hashes, sets, lists, pub/sub, ping) over a
//! single mutex, records every publish for assertions, and supports
//! failure injection: [`MemoryCoordinator::sever`] makes every operation
//! fail like a dropped connection until [`MemoryCoordinator::restore`].

use crate::client::{Coordinator, Message, Subscriber};
use crate::error::CoordinatorError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Default)]
struct Shared {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
    lists: HashMap<String, VecDeque<String>>,
    subscribers: HashMap<u64, SubEntry>,
    published: Vec<Message>,
    next_subscriber: u64,
    severed: bool,
}

#[derive(Default)]
struct SubEntry {
    channels: HashSet<String>,
    queue: VecDeque<Message>,
}

/// Shared in-memory store standing in for Redis.
#[derive(Clone, Default)]
pub struct MemoryCoordinator {
    shared: Arc<Mutex<Shared>>,
    pushed: Arc<Notify>,
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the "connection": every operation fails until [`restore`].
    ///
    /// [`restore`]: MemoryCoordinator::restore
    pub fn sever(&self) {
        self.shared.lock().severed = true;
        // Wake blocked pops so they observe the failure
        self.pushed.notify_waiters();
        self.pushed.notify_one();
    }

    /// Bring the "connection" back.
    pub fn restore(&self) {
        self.shared.lock().severed = false;
    }

    fn check_severed(&self) -> Result<(), CoordinatorError> {
        if self.shared.lock().severed {
            Err(CoordinatorError::Connection("connection severed".to_string()))
        } else {
            Ok(())
        }
    }

    // -- inspection helpers for tests --

    /// Read one hash field.
    pub fn hash_field(&self, key: &str, field: &str) -> Option<String> {
        self.shared.lock().hashes.get(key)?.get(field).cloned()
    }

    /// True when the hash key exists at all.
    pub fn hash_exists(&self, key: &str) -> bool {
        self.shared.lock().hashes.contains_key(key)
    }

    /// Current list contents, front to back.
    pub fn list_items(&self, list: &str) -> Vec<String> {
        self.shared
            .lock()
            .lists
            .get(list)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Current set membership.
    pub fn set_members(&self, set: &str) -> HashSet<String> {
        self.shared.lock().sets.get(set).cloned().unwrap_or_default()
    }

    /// Every payload ever published on `channel`, in order.
    pub fn published_on(&self, channel: &str) -> Vec<String> {
        self.shared
            .lock()
            .published
            .iter()
            .filter(|m| m.channel == channel)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Channels any live subscriber is currently subscribed to.
    pub fn subscribed_channels(&self) -> HashSet<String> {
        let shared = self.shared.lock();
        shared
            .subscribers
            .values()
            .flat_map(|s| s.channels.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn hash_get(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Vec<Option<String>>, CoordinatorError> {
        self.check_severed()?;
        let shared = self.shared.lock();
        let hash = shared.hashes.get(key);
        Ok(fields
            .iter()
            .map(|f| hash.and_then(|h| h.get(*f).cloned()))
            .collect())
    }

    async fn hash_set(
        &self,
        key: &str,
        pairs: &[(&str, String)],
    ) -> Result<(), CoordinatorError> {
        self.check_severed()?;
        let mut shared = self.shared.lock();
        let hash = shared.hashes.entry(key.to_string()).or_default();
        for (field, value) in pairs {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CoordinatorError> {
        self.check_severed()?;
        self.shared.lock().hashes.remove(key);
        Ok(())
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), CoordinatorError> {
        self.check_severed()?;
        self.shared
            .lock()
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), CoordinatorError> {
        self.check_severed()?;
        if let Some(members) = self.shared.lock().sets.get_mut(set) {
            members.remove(member);
        }
        Ok(())
    }

    async fn push_front(&self, list: &str, value: &str) -> Result<(), CoordinatorError> {
        self.check_severed()?;
        self.shared
            .lock()
            .lists
            .entry(list.to_string())
            .or_default()
            .push_front(value.to_string());
        self.pushed.notify_one();
        Ok(())
    }

    async fn pop_back_blocking(&self, list: &str) -> Result<String, CoordinatorError> {
        loop {
            {
                let mut shared = self.shared.lock();
                if shared.severed {
                    return Err(CoordinatorError::Connection(
                        "connection severed".to_string(),
                    ));
                }
                if let Some(value) = shared.lists.get_mut(list).and_then(|l| l.pop_back()) {
                    return Ok(value);
                }
            }
            self.pushed.notified().await;
        }
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), CoordinatorError> {
        self.check_severed()?;
        let message = Message { channel: channel.to_string(), payload: payload.to_string() };
        let mut shared = self.shared.lock();
        shared.published.push(message.clone());
        for entry in shared.subscribers.values_mut() {
            if entry.channels.contains(channel) {
                entry.queue.push_back(message.clone());
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), CoordinatorError> {
        self.check_severed()
    }

    async fn subscriber(&self) -> Result<Box<dyn Subscriber>, CoordinatorError> {
        self.check_severed()?;
        let id = {
            let mut shared = self.shared.lock();
            let id = shared.next_subscriber;
            shared.next_subscriber += 1;
            shared.subscribers.insert(id, SubEntry::default());
            id
        };
        Ok(Box::new(MemorySubscriber { id, shared: Arc::clone(&self.shared) }))
    }
}

/// Subscriber handle into a [`MemoryCoordinator`].
pub struct MemorySubscriber {
    id: u64,
    shared: Arc<Mutex<Shared>>,
}

impl MemorySubscriber {
    fn severed(&self) -> bool {
        self.shared.lock().severed
    }
}

impl Drop for MemorySubscriber {
    fn drop(&mut self) {
        self.shared.lock().subscribers.remove(&self.id);
    }
}

#[async_trait]
impl Subscriber for MemorySubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<(), CoordinatorError> {
        if self.severed() {
            return Err(CoordinatorError::Connection("connection severed".to_string()));
        }
        if let Some(entry) = self.shared.lock().subscribers.get_mut(&self.id) {
            entry.channels.insert(channel.to_string());
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), CoordinatorError> {
        if self.severed() {
            return Err(CoordinatorError::Connection("connection severed".to_string()));
        }
        if let Some(entry) = self.shared.lock().subscribers.get_mut(&self.id) {
            entry.channels.remove(channel);
        }
        Ok(())
    }

    async fn try_next(&mut self) -> Result<Option<Message>, CoordinatorError> {
        let mut shared = self.shared.lock();
        if shared.severed {
            return Err(CoordinatorError::Connection("connection severed".to_string()));
        }
        Ok(shared.subscribers.get_mut(&self.id).and_then(|e| e.queue.pop_front()))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
