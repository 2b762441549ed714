// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Coalesces concurrent requests for the same key into a single in-flight operation.
//!
//! This crate provides [`Coordinator`], a mechanism for deduplicating concurrent async
//! operations. When multiple callers request the same work (identified by a key), only the
//! first caller (the "leader") invokes its producer, while subsequent callers (the
//! "followers") are attached to the same [`Flight`] and receive a clone of its outcome.
//!
//! # When to Use
//!
//! - **API calls**: deduplicate concurrent requests for the same resource
//! - **Cache population**: prevent a thundering herd when a cache entry is missing or expired
//!
//! # Example
//!
//! ```
//! use coflight::Coordinator;
//!
//! # async fn example() {
//! let group: Coordinator<&str, String> = Coordinator::new();
//!
//! // Both calls share a single execution of the first producer.
//! let first = group.request("user-42", || async { "Alice".to_string() });
//! let second = group.request("user-42", std::future::pending::<String>);
//!
//! assert_eq!(first.await, "Alice");
//! assert_eq!(second.await, "Alice");
//! # }
//! ```
//!
//! # Failures
//!
//! The outcome type is opaque to the coordinator. Use a `Result` outcome to share failures:
//! every attached caller receives the same `Err`, and the key is released as soon as the
//! operation settles so the next request starts over. Nothing is retried.
//!
//! # Cancellation
//!
//! Dropping a [`Flight`] only stops that caller waiting. The operation itself is owned by
//! the coordinator until it settles:
//!
//! - With a [`Spawner`] (see [`Coordinator::with_spawner`]) the operation is driven to
//!   completion in the background even if every caller stopped waiting.
//! - Without one, the operation stays registered and is driven by the next caller that
//!   requests the same key.
//!
//! # Panics
//!
//! A panicking operation settles like any other. Every caller attached to it re-raises the
//! panic (with the original message) when polling its [`Flight`], and the key is released,
//! so the next request invokes its own producer.

mod flight;
mod spawner;

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;

pub use flight::{Flight, Role};
pub use spawner::Spawner;

type Operation<T> = Shared<BoxFuture<'static, Settled<T>>>;
type Settled<T> = Result<T, Panicked>;
type Registrations<K, T> = Arc<Mutex<HashMap<K, Registration<T>>>>;

/// The message of a panic raised by an operation, handed to every attached caller.
#[derive(Debug, Clone)]
struct Panicked(Arc<str>);

impl Panicked {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("operation panicked");
        Self(message.into())
    }

    fn resume(&self) -> ! {
        panic::resume_unwind(Box::new(self.0.to_string()))
    }
}

struct Registration<T> {
    id: u64,
    operation: Operation<T>,
}

/// Guarantees at most one in-flight operation per key.
///
/// The coordinator is `Send` and `Sync` and is usually shared behind an `Arc` or embedded
/// in a longer-lived component such as a cache.
pub struct Coordinator<K, T> {
    registrations: Registrations<K, T>,
    next_id: AtomicU64,
    spawner: Option<Spawner>,
}

impl<K, T> Default for Coordinator<K, T> {
    fn default() -> Self {
        Self {
            registrations: Arc::default(),
            next_id: AtomicU64::new(0),
            spawner: None,
        }
    }
}

impl<K, T> Debug for Coordinator<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("in_flight", &self.registrations.lock().len())
            .field("spawner", &self.spawner)
            .finish()
    }
}

impl<K, T> Coordinator<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Creates a coordinator whose operations are driven by the callers awaiting them.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a coordinator that hands every new operation to `spawner`.
    ///
    /// Operations then run to completion even if all of their callers stop waiting, so side
    /// effects attached to them (such as populating a cache) always happen.
    ///
    /// # Example
    ///
    /// ```
    /// use coflight::{Coordinator, Spawner};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let group: Coordinator<String, u32> = Coordinator::with_spawner(Spawner::new_tokio());
    /// assert_eq!(group.request("key".to_string(), || async { 7 }).await, 7);
    /// # }
    /// ```
    #[must_use]
    pub fn with_spawner(spawner: Spawner) -> Self {
        Self {
            spawner: Some(spawner),
            ..Self::default()
        }
    }

    /// Requests the outcome for `key`.
    ///
    /// If an operation for `key` is already in flight, a follower handle to it is returned
    /// and `producer` is dropped without being invoked. Otherwise `producer` is invoked, its
    /// future is registered as the in-flight operation for `key`, and a leader handle is
    /// returned. The registration is removed when the operation settles, no matter how many
    /// callers are attached or whether any of them are still waiting.
    ///
    /// Lookup and registration happen under a single lock acquisition, so two callers can
    /// never both start an operation for the same key.
    ///
    /// `producer` is invoked while that lock is held and must not call back into this
    /// coordinator synchronously. The future it returns is free to do anything.
    ///
    /// This is [`register`](Self::register) followed by [`launch`](Self::launch).
    pub fn request<F, Fut>(&self, key: K, producer: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = self.register(key, producer);
        self.launch(&flight);
        flight
    }

    /// Same as [`request`](Self::request), except that a new operation is not handed to the
    /// spawner yet.
    ///
    /// Callers that hold locks of their own while registering use this, release those
    /// locks, and then call [`launch`](Self::launch). A spawner may poll the operation
    /// inline, and the operation may need the very locks the caller holds.
    pub fn register<F, Fut>(&self, key: K, producer: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut registrations = self.registrations.lock();

        if let Some(existing) = registrations.get(&key) {
            tracing::trace!(flight.id = existing.id, "joining in-flight operation");
            return Flight::new(existing.operation.clone(), Role::Follower);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let work = producer();
        let operation = settle_then_release(work, Arc::downgrade(&self.registrations), key.clone(), id)
            .boxed()
            .shared();

        registrations.insert(
            key,
            Registration {
                id,
                operation: operation.clone(),
            },
        );
        drop(registrations);
        tracing::trace!(flight.id = id, "started operation");

        Flight::new(operation, Role::Leader)
    }

    /// Hands the operation behind a leader `flight` to the spawner, if one is configured.
    ///
    /// Does nothing for followers or for a coordinator without a spawner. Call it only after
    /// releasing every lock the operation itself takes.
    pub fn launch(&self, flight: &Flight<T>) {
        if flight.is_follower() {
            return;
        }
        if let Some(spawner) = &self.spawner {
            spawner.spawn(flight.operation().map(drop).boxed());
        }
    }

    /// Returns `true` if an operation for `key` is currently in flight.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.registrations.lock().contains_key(key)
    }

    /// Returns the number of operations currently in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    /// Returns `true` if no operation is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.lock().is_empty()
    }
}

async fn settle_then_release<K, T, Fut>(work: Fut, registrations: Weak<Mutex<HashMap<K, Registration<T>>>>, key: K, id: u64) -> Settled<T>
where
    K: Hash + Eq,
    Fut: Future<Output = T>,
{
    // A panic settles the operation like any outcome; each attached caller re-raises it.
    let outcome = AssertUnwindSafe(work)
        .catch_unwind()
        .await
        .map_err(|payload| Panicked::from_payload(&*payload));

    if let Some(registrations) = registrations.upgrade() {
        let mut registrations = registrations.lock();
        if registrations.get(&key).is_some_and(|registration| registration.id == id) {
            registrations.remove(&key);
        }
    }

    match &outcome {
        Ok(_) => tracing::trace!(flight.id = id, "operation settled"),
        Err(panicked) => tracing::debug!(flight.id = id, panic.message = &*panicked.0, "operation panicked"),
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_released_after_settling() {
        let group: Coordinator<&str, u32> = Coordinator::new();
        let flight = group.request("key", || async { 1 });

        assert!(group.contains(&"key"));
        assert_eq!(group.len(), 1);

        assert_eq!(futures_util::FutureExt::now_or_never(flight), Some(1));
        assert!(group.is_empty());
    }

    #[test]
    fn outcome_survives_dropped_coordinator() {
        let group: Coordinator<&str, u32> = Coordinator::new();
        let flight = group.request("key", || async { 5 });
        drop(group);

        assert_eq!(flight.now_or_never(), Some(5));
    }

    #[test]
    fn panic_message_is_kept() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        let formatted: Box<dyn Any + Send> = Box::new(String::from("status 503"));
        let opaque: Box<dyn Any + Send> = Box::new(17_u8);

        assert_eq!(&*Panicked::from_payload(&*literal).0, "boom");
        assert_eq!(&*Panicked::from_payload(&*formatted).0, "status 503");
        assert_eq!(&*Panicked::from_payload(&*opaque).0, "operation panicked");
    }

    #[test]
    fn debug_reports_in_flight_count() {
        let group: Coordinator<&str, u32> = Coordinator::new();
        let _flight = group.request("key", std::future::pending::<u32>);

        let debug = format!("{group:?}");
        assert!(debug.contains("in_flight: 1"), "unexpected debug output: {debug}");
    }
}
