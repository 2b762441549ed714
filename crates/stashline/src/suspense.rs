// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use coflight::{Coordinator, Flight, Role, Spawner};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::builder::SuspenseCacheBuilder;
use crate::stats::ActivityCounts;
use crate::telemetry::{CacheActivity, CacheName, CacheOperation, CacheTelemetry};
use crate::{Error, FetchFailure, Result};

/// The state of an entry in a [`SuspenseCache`].
///
/// An entry only ever moves from `Pending` to one of the settled states. Once settled it
/// stays that way until it is invalidated or the cache is cleared; the next read then
/// starts a new entry at `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    /// A fetch is in flight.
    Pending,
    /// The fetch succeeded and its value is served synchronously.
    Resolved,
    /// The fetch failed and its error is served synchronously.
    Rejected,
}

/// The answer to a [`SuspenseCache::read`].
#[derive(Debug, Clone)]
pub enum Readiness<V> {
    /// The value is available now.
    Ready(V),
    /// The value is not available yet. Await the suspension, then read again.
    Suspended(Suspension),
}

impl<V> Readiness<V> {
    /// Returns the value if it is ready.
    #[must_use]
    pub fn ready(self) -> Option<V> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Suspended(_) => None,
        }
    }

    /// Returns `true` if the read has to wait.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }
}

/// Completes once the entry a read suspended on has settled.
///
/// Every read of the same pending entry receives a clone of the same suspension. It carries
/// no value: once it completes, read the key again.
#[derive(Clone)]
#[must_use = "a suspension does nothing unless awaited"]
pub struct Suspension(Shared<BoxFuture<'static, ()>>);

impl Suspension {
    fn new(settle: BoxFuture<'static, ()>) -> Self {
        Self(settle.shared())
    }

    /// Returns `true` once the entry this suspension belongs to has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.0.peek().is_some()
    }
}

impl Future for Suspension {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

impl Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension").field("settled", &self.is_settled()).finish()
    }
}

/// A read-through cache for hosts that suspend a reader until its data is available.
///
/// The first [`read`](Self::read) of a key starts a fetch and returns
/// [`Readiness::Suspended`]. Reads made while the fetch is in flight get the same
/// suspension and never start another fetch. Once settled, reads answer synchronously:
/// with the value, or with the error, which is remembered until the entry is invalidated
/// or the cache is cleared. Nothing expires on its own.
///
/// # Examples
///
/// ```
/// use stashline::{Readiness, SuspenseCache};
///
/// # futures::executor::block_on(async {
/// let cache = SuspenseCache::new();
/// let fetch_posts = || async { Ok::<_, std::io::Error>(vec![1_u32]) };
///
/// let Readiness::Suspended(suspension) = cache.read("posts-1", fetch_posts)? else {
///     unreachable!("nothing is cached yet");
/// };
/// suspension.await;
///
/// assert_eq!(cache.read("posts-1", fetch_posts)?.ready(), Some(vec![1]));
/// # Ok::<(), stashline::Error>(())
/// # }).unwrap();
/// ```
pub struct SuspenseCache<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    entries: Mutex<HashMap<String, Slot<V>>>,
    coordinator: Coordinator<String, Result<V>>,
    spawner: Option<Spawner>,
    next_id: AtomicU64,
    telemetry: CacheTelemetry,
}

struct Slot<V> {
    id: u64,
    state: State<V>,
}

enum State<V> {
    Pending(Suspension),
    Resolved(V),
    Rejected(Error),
}

impl<V> State<V> {
    fn status(&self) -> EntryStatus {
        match self {
            Self::Pending(_) => EntryStatus::Pending,
            Self::Resolved(_) => EntryStatus::Resolved,
            Self::Rejected(_) => EntryStatus::Rejected,
        }
    }
}

impl<V> Clone for SuspenseCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for SuspenseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<V> SuspenseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Starts configuring a cache.
    pub fn builder() -> SuspenseCacheBuilder<V> {
        SuspenseCacheBuilder::new()
    }

    /// Creates a cache with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn assemble(name: CacheName, spawner: Option<Spawner>, logs: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::default(),
                // The spawner drives suspensions, which in turn drive the fetches.
                coordinator: Coordinator::new(),
                spawner,
                next_id: AtomicU64::new(0),
                telemetry: CacheTelemetry::new(name, logs),
            }),
        }
    }

    /// Reads `key`, starting a fetch with `producer` if the key has no entry.
    ///
    /// `producer` is only invoked when the key has no entry and no fetch for it is in
    /// flight. It runs synchronously while the cache's locks are held, so it must not call
    /// back into this cache; the future it returns may.
    ///
    /// # Errors
    ///
    /// Returns the remembered [`Error::Fetch`] if the entry's fetch failed.
    pub fn read<F, Fut, E>(&self, key: &str, producer: F) -> Result<Readiness<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let inner = &*self.inner;
        let mut entries = inner.entries.lock();

        if let Some(slot) = entries.get(key) {
            let (answer, activity) = match &slot.state {
                State::Pending(suspension) => (Ok(Readiness::Suspended(suspension.clone())), CacheActivity::Joined),
                State::Resolved(value) => (Ok(Readiness::Ready(value.clone())), CacheActivity::Hit),
                State::Rejected(error) => (Err(error.clone()), CacheActivity::Rejected),
            };
            drop(entries);
            inner.telemetry.record(CacheOperation::Read, activity);
            return answer;
        }

        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let flight = inner.coordinator.register(key.to_owned(), || {
            let work = producer();
            async move { work.await.map_err(|cause| Error::from(FetchFailure::new(cause))) }
        });
        // A fetch that outlived a cleared entry is joined rather than repeated.
        let activity = match flight.role() {
            Role::Leader => CacheActivity::Miss,
            Role::Follower => CacheActivity::Joined,
        };

        let suspension = Suspension::new(settle(flight, Arc::downgrade(&self.inner), key.to_owned(), id).boxed());
        entries.insert(
            key.to_owned(),
            Slot {
                id,
                state: State::Pending(suspension.clone()),
            },
        );
        drop(entries);

        inner.telemetry.record(CacheOperation::Read, activity);
        if let Some(spawner) = &inner.spawner {
            spawner.spawn(suspension.clone().boxed());
        }

        Ok(Readiness::Suspended(suspension))
    }

    /// Reads `key` until it settles, awaiting every suspension along the way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if the fetch for `key` failed.
    pub async fn resolve<F, Fut, E>(&self, key: &str, producer: F) -> Result<V>
    where
        F: FnOnce() -> Fut + Clone,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        loop {
            match self.read(key, producer.clone())? {
                Readiness::Ready(value) => return Ok(value),
                Readiness::Suspended(suspension) => suspension.await,
            }
        }
    }

    /// Returns the state of the entry for `key`, if there is one.
    #[must_use]
    pub fn status(&self, key: &str) -> Option<EntryStatus> {
        self.inner.entries.lock().get(key).map(|slot| slot.state.status())
    }

    /// Removes the entry for `key` so the next read fetches again. Returns `false` if there
    /// was none.
    ///
    /// Removing a pending entry does not cancel its fetch, but the fetch no longer settles
    /// anything in this cache.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.inner.entries.lock().remove(key).is_some();
        self.inner
            .telemetry
            .record_many(CacheOperation::Invalidate, CacheActivity::Invalidated, usize::from(removed));
        removed
    }

    /// Removes every entry. Returns how many there were.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut entries = self.inner.entries.lock();
            let removed = entries.len();
            entries.clear();
            removed
        };
        self.inner
            .telemetry
            .record_many(CacheOperation::Clear, CacheActivity::Invalidated, removed);
        removed
    }

    /// Returns the number of entries in any state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns `true` if the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Returns the name the cache reports in its log events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.telemetry.name()
    }

    /// Returns how many reads, settlements and invalidations the cache has seen.
    ///
    /// Reads of a pending entry count as `joined`, reads of a rejected one as `rejected`.
    /// Entries have no TTL, so `expired` and `discarded` stay at zero.
    #[must_use]
    pub fn activity(&self) -> ActivityCounts {
        self.inner.telemetry.counts()
    }
}

/// Moves the entry started as `id` out of `Pending` once its fetch settles.
///
/// A fetch that panicked rejects the entry. Does nothing if the entry was removed or
/// replaced in the meantime.
async fn settle<V>(flight: Flight<Result<V>>, cache: Weak<Inner<V>>, key: String, id: u64)
where
    V: Clone,
{
    let outcome = match AssertUnwindSafe(flight).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload.downcast_ref::<String>().map_or("unknown cause", String::as_str);
            Err(Error::from(FetchFailure::from_message(format!("fetch panicked: {message}"))))
        }
    };

    let Some(inner) = cache.upgrade() else {
        return;
    };
    let mut entries = inner.entries.lock();
    let Some(slot) = entries.get_mut(&key) else {
        return;
    };
    if slot.id != id || !matches!(slot.state, State::Pending(_)) {
        return;
    }

    let activity = match outcome {
        Ok(value) => {
            slot.state = State::Resolved(value);
            CacheActivity::Inserted
        }
        Err(error) => {
            slot.state = State::Rejected(error);
            CacheActivity::Error
        }
    };
    drop(entries);

    inner.telemetry.record(CacheOperation::Insert, activity);
}

impl<V> Debug for SuspenseCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspenseCache")
            .field("name", &self.inner.telemetry.name())
            .field("entries", &self.inner.entries.lock().len())
            .finish_non_exhaustive()
    }
}
