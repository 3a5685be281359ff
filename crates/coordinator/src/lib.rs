// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-coordinator: the shared-store seam.
//!
//! Everything a worker does to the outside world goes through the
//! [`Coordinator`] trait (hashes, lists, sets, publish, ping) and the
//! [`Subscriber`] it hands out (pub/sub message polling). The production
//! implementation speaks Redis; the `test-support` feature adds an
//! in-memory implementation with failure injection.

pub mod client;
pub mod error;
pub mod redis;
pub mod submit;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use client::{Coordinator, Message, Subscriber};
pub use error::CoordinatorError;
pub use self::redis::RedisCoordinator;
pub use submit::submit;

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryCoordinator;
