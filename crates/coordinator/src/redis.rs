// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis implementation of the coordinator seam.
//!
//! Commands go through a [`ConnectionManager`] (shared, auto-reconnecting);
//! each subscriber gets its own pub/sub connection. Message draining polls
//! the pub/sub stream with a short timeout so the dispatcher's cycle never
//! blocks on a quiet channel.

use crate::client::{Coordinator, Message, Subscriber};
use crate::error::CoordinatorError;
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// How long one drain step waits for a pub/sub message before reporting
/// the stream quiet.
const PUBSUB_POLL: Duration = Duration::from_millis(10);

/// Coordinator backed by a single Redis instance.
///
/// Connection pooling and clustering are the client library's concern;
/// a clustered deployment slots in behind the [`Coordinator`] trait.
pub struct RedisCoordinator {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisCoordinator {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, CoordinatorError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl Coordinator for RedisCoordinator {
    async fn hash_get(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Vec<Option<String>>, CoordinatorError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("HMGET");
        cmd.arg(key);
        for field in fields {
            cmd.arg(field);
        }
        let values: Vec<Option<String>> = cmd.query_async(&mut conn).await?;
        Ok(values)
    }

    async fn hash_set(
        &self,
        key: &str,
        pairs: &[(&str, String)],
    ) -> Result<(), CoordinatorError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(key, pairs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CoordinatorError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), CoordinatorError> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(set, member).await?;
        Ok(())
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), CoordinatorError> {
        let mut conn = self.conn.clone();
        let _: () = conn.srem(set, member).await?;
        Ok(())
    }

    async fn push_front(&self, list: &str, value: &str) -> Result<(), CoordinatorError> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(list, value).await?;
        Ok(())
    }

    async fn pop_back_blocking(&self, list: &str) -> Result<String, CoordinatorError> {
        let mut conn = self.conn.clone();
        loop {
            // Timeout 0 blocks indefinitely server-side; a None reply can
            // still surface around reconnects, in which case we re-issue.
            let popped: Option<(String, String)> = conn.brpop(list, 0.0).await?;
            if let Some((_, value)) = popped {
                return Ok(value);
            }
        }
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), CoordinatorError> {
        let mut conn = self.conn.clone();
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CoordinatorError> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(CoordinatorError::Command(format!("unexpected PING reply: {reply}")))
        }
    }

    async fn subscriber(&self) -> Result<Box<dyn Subscriber>, CoordinatorError> {
        let pubsub = self.client.get_async_pubsub().await?;
        Ok(Box::new(RedisSubscriber { pubsub }))
    }
}

/// Pub/sub connection wrapper.
pub struct RedisSubscriber {
    pubsub: redis::aio::PubSub,
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<(), CoordinatorError> {
        self.pubsub.subscribe(channel).await?;
        Ok(())
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), CoordinatorError> {
        self.pubsub.unsubscribe(channel).await?;
        Ok(())
    }

    async fn try_next(&mut self) -> Result<Option<Message>, CoordinatorError> {
        match tokio::time::timeout(PUBSUB_POLL, self.pubsub.on_message().next()).await {
            Ok(Some(msg)) => {
                let channel = msg.get_channel_name().to_string();
                let payload: String = msg.get_payload()?;
                Ok(Some(Message { channel, payload }))
            }
            // Stream end means the pub/sub connection dropped
            Ok(None) => Err(CoordinatorError::Connection(
                "pub/sub connection closed".to_string(),
            )),
            // Quiet channel
            Err(_) => Ok(None),
        }
    }
}
