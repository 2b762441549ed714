// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use coflight::{Coordinator, Flight, Role, Spawner};
use futures_util::FutureExt;
use futures_util::future::{Either, Ready, ready};
use parking_lot::Mutex;
use regex::Regex;
use timekeep::Clock;

use crate::builder::TtlCacheBuilder;
use crate::stats::{CacheStats, EntryStats};
use crate::telemetry::{CacheActivity, CacheName, CacheOperation, CacheTelemetry};
use crate::{CacheEntry, Error, FetchFailure, Result};

/// The time-to-live used by [`TtlCache::get_or_fetch`] unless the builder overrides it.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// What an invalidation means for a fetch that is in flight when it happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidationPolicy {
    /// A fetch that completes after its key was invalidated still stores its value.
    #[default]
    LastWriteWins,

    /// Invalidating a key (or clearing the cache) while a fetch for it is in flight keeps
    /// that fetch from storing its value. Callers attached to the fetch still receive it.
    Fenced,
}

/// A memory cache whose entries expire a fixed time after they were stored.
///
/// Missing or stale keys are fetched through a [`Coordinator`], so concurrent reads of the
/// same key share one producer invocation, and the value is stored once by the fetch itself
/// before it is released. Expired entries are dropped by the read that finds them; there is
/// no background sweeper.
///
/// Cloning the cache is cheap and clones share their contents.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use stashline::TtlCache;
/// use timekeep::Clock;
///
/// # futures::executor::block_on(async {
/// let cache = TtlCache::builder(Clock::new_system())
///     .name("users")
///     .default_ttl(Duration::from_secs(30))
///     .build();
///
/// let name = cache
///     .get_or_fetch("user-1", || async { Ok::<_, std::io::Error>("Leanne".to_string()) })
///     .await?;
/// assert_eq!(name, "Leanne");
///
/// // Served from memory, the producer is never invoked.
/// let again = cache
///     .get_or_fetch("user-1", || async { Err(std::io::Error::other("offline")) })
///     .await?;
/// assert_eq!(again, "Leanne");
/// # Ok::<(), stashline::Error>(())
/// # }).unwrap();
/// ```
pub struct TtlCache<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    clock: Clock,
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    coordinator: Coordinator<String, Result<V>>,
    fences: Fences,
    telemetry: CacheTelemetry,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Starts configuring a cache that measures ages with `clock`.
    pub fn builder(clock: Clock) -> TtlCacheBuilder<V> {
        TtlCacheBuilder::new(clock)
    }

    /// Creates a cache with the default configuration.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self::builder(clock).build()
    }

    pub(crate) fn assemble(
        name: CacheName,
        clock: Clock,
        default_ttl: Duration,
        policy: InvalidationPolicy,
        spawner: Option<Spawner>,
        logs: bool,
    ) -> Self {
        let coordinator = spawner.map_or_else(Coordinator::new, Coordinator::with_spawner);
        Self {
            inner: Arc::new(Inner {
                clock,
                default_ttl,
                entries: Mutex::default(),
                coordinator,
                fences: Fences::new(policy),
                telemetry: CacheTelemetry::new(name, logs),
            }),
        }
    }

    /// Returns the value for `key`, fetching it with `producer` unless a fresh entry exists.
    ///
    /// A fresh entry is served without invoking `producer`. Otherwise a stale entry is
    /// discarded and the read attaches to the fetch in flight for `key`, starting one with
    /// `producer` if there is none. When that fetch succeeds its value is stored with `ttl`;
    /// on failure nothing is stored and every attached caller receives the same error.
    ///
    /// Freshness is judged against the TTL the entry was stored with, not against `ttl`. A
    /// read that attaches to a fetch started by another caller stores nothing of its own, so
    /// the value is stored with the first caller's TTL. A zero `ttl` stores a value that no
    /// later read considers fresh.
    ///
    /// The lookup and the decision to fetch happen when `get` is called, not when the
    /// returned future is first polled. `producer` is invoked synchronously while the cache's
    /// locks are held, so it must not call back into this cache; the future it returns may.
    pub fn get<F, Fut, E>(&self, key: impl Into<String>, ttl: Duration, producer: F) -> Lookup<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let key = key.into();
        let inner = &*self.inner;
        let mut entries = inner.entries.lock();
        let now = inner.clock.instant();

        let mut expired = false;
        if let Some(entry) = entries.get(&key) {
            if entry.is_fresh(now) {
                let value = entry.value().clone();
                drop(entries);
                inner.telemetry.record(CacheOperation::Get, CacheActivity::Hit);
                return Lookup::hit(value);
            }
            entries.remove(&key);
            expired = true;
        }

        let store_into = Arc::downgrade(&self.inner);
        let flight = inner.coordinator.register(key.clone(), || {
            let ticket = inner.fences.arm(&key);
            let work = producer();
            fetch_then_store(work, store_into, key.clone(), ttl, ticket)
        });
        drop(entries);
        inner.coordinator.launch(&flight);

        if expired {
            inner.telemetry.record(CacheOperation::Get, CacheActivity::Expired);
        }
        let activity = match flight.role() {
            Role::Leader => CacheActivity::Miss,
            Role::Follower => CacheActivity::Joined,
        };
        inner.telemetry.record(CacheOperation::Get, activity);

        Lookup::fetch(flight)
    }

    /// Same as [`get`](Self::get) with the cache's default TTL.
    pub fn get_or_fetch<F, Fut, E>(&self, key: impl Into<String>, producer: F) -> Lookup<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.get(key, self.inner.default_ttl, producer)
    }

    /// Returns the value for `key` if a fresh entry exists. Never fetches.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = self.inner.clock.instant();
        self.inner
            .entries
            .lock()
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value().clone())
    }

    /// Removes the entry for `key`. Returns `false` if there was none.
    ///
    /// A fetch in flight for `key` is not cancelled. Whether its value is stored afterwards
    /// depends on the cache's [`InvalidationPolicy`].
    pub fn invalidate(&self, key: &str) -> bool {
        let mut entries = self.inner.entries.lock();
        let removed = entries.remove(key).is_some();
        self.inner.fences.revoke(key);
        drop(entries);

        self.inner
            .telemetry
            .record_many(CacheOperation::Invalidate, CacheActivity::Invalidated, usize::from(removed));
        removed
    }

    /// Removes every entry whose key matches `pattern`. Returns how many were removed.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !pattern.is_match(key));
        let removed = before - entries.len();
        self.inner.fences.revoke_matching(pattern);
        drop(entries);

        self.inner
            .telemetry
            .record_many(CacheOperation::Invalidate, CacheActivity::Invalidated, removed);
        removed
    }

    /// Compiles `pattern` as a regular expression and removes every matching entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`] if `pattern` is not a valid regular expression. No entry
    /// is removed in that case.
    pub fn invalidate_matching(&self, pattern: &str) -> Result<usize> {
        let pattern = Regex::new(pattern)?;
        Ok(self.invalidate_pattern(&pattern))
    }

    /// Removes every entry. Returns how many there were.
    pub fn clear(&self) -> usize {
        let mut entries = self.inner.entries.lock();
        let removed = entries.len();
        entries.clear();
        self.inner.fences.revoke_all();
        drop(entries);

        self.inner
            .telemetry
            .record_many(CacheOperation::Clear, CacheActivity::Invalidated, removed);
        removed
    }

    /// Returns a snapshot of the cache's entries and activity.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.entries.lock();
        let now = self.inner.clock.instant();
        let mut rows: Vec<_> = entries
            .iter()
            .map(|(key, entry)| EntryStats {
                key: key.clone(),
                age: entry.age(now),
                ttl: entry.ttl(),
            })
            .collect();
        let size = entries.len();
        drop(entries);
        rows.sort_unstable_by(|a, b| a.key.cmp(&b.key));

        CacheStats {
            size,
            entries: rows,
            in_flight: self.inner.coordinator.len(),
            activity: self.inner.telemetry.counts(),
        }
    }

    /// Returns the number of stored entries, including stale ones no read has dropped yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns `true` if no entry is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Returns the number of fetches in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.coordinator.len()
    }

    /// Returns the name the cache reports in its log events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.telemetry.name()
    }

    /// Returns the TTL used by [`get_or_fetch`](Self::get_or_fetch).
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Returns the cache's invalidation policy.
    #[must_use]
    pub fn invalidation_policy(&self) -> InvalidationPolicy {
        self.inner.fences.policy
    }
}

impl<V> Inner<V>
where
    V: Clone,
{
    fn store(&self, key: &str, ttl: Duration, ticket: Option<u64>, outcome: &Result<V>) {
        let mut entries = self.entries.lock();
        let admitted = self.fences.claim(key, ticket);

        let activity = match outcome {
            Ok(value) if admitted => {
                let entry = CacheEntry::new(value.clone(), self.clock.instant(), ttl);
                entries.insert(key.to_owned(), entry);
                CacheActivity::Inserted
            }
            Ok(_) => CacheActivity::Discarded,
            Err(_) => CacheActivity::Error,
        };
        drop(entries);

        self.telemetry.record(CacheOperation::Insert, activity);
    }
}

async fn fetch_then_store<V, Fut, E>(work: Fut, store_into: Weak<Inner<V>>, key: String, ttl: Duration, ticket: Option<u64>) -> Result<V>
where
    V: Clone,
    Fut: Future<Output = std::result::Result<V, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let outcome = work.await.map_err(|cause| Error::from(FetchFailure::new(cause)));

    if let Some(inner) = store_into.upgrade() {
        inner.store(&key, ttl, ticket, &outcome);
    }

    outcome
}

impl<V> Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.inner.telemetry.name())
            .field("size", &self.inner.entries.lock().len())
            .field("default_ttl", &self.inner.default_ttl)
            .field("invalidation", &self.inner.fences.policy)
            .finish_non_exhaustive()
    }
}

/// Per-key tickets that let an invalidation veto the store of a fetch in flight.
///
/// A ticket is armed when a fetch starts and revoked by any invalidation covering its key.
/// The fetch stores its value only if its ticket is still the armed one.
#[derive(Debug)]
struct Fences {
    policy: InvalidationPolicy,
    tickets: Mutex<HashMap<String, u64>>,
    next_ticket: AtomicU64,
}

impl Fences {
    fn new(policy: InvalidationPolicy) -> Self {
        Self {
            policy,
            tickets: Mutex::default(),
            next_ticket: AtomicU64::new(0),
        }
    }

    fn arm(&self, key: &str) -> Option<u64> {
        match self.policy {
            InvalidationPolicy::LastWriteWins => None,
            InvalidationPolicy::Fenced => {
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                self.tickets.lock().insert(key.to_owned(), ticket);
                Some(ticket)
            }
        }
    }

    fn claim(&self, key: &str, ticket: Option<u64>) -> bool {
        let Some(ticket) = ticket else {
            return true;
        };

        let mut tickets = self.tickets.lock();
        if tickets.get(key) == Some(&ticket) {
            tickets.remove(key);
            true
        } else {
            false
        }
    }

    fn revoke(&self, key: &str) {
        if self.policy == InvalidationPolicy::Fenced {
            self.tickets.lock().remove(key);
        }
    }

    fn revoke_matching(&self, pattern: &Regex) {
        if self.policy == InvalidationPolicy::Fenced {
            self.tickets.lock().retain(|key, _| !pattern.is_match(key));
        }
    }

    fn revoke_all(&self) {
        if self.policy == InvalidationPolicy::Fenced {
            self.tickets.lock().clear();
        }
    }
}

/// The future returned by [`TtlCache::get`].
///
/// Resolves immediately for a cache hit, otherwise when the fetch it is attached to settles.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Lookup<V> {
    state: Either<Ready<Result<V>>, Flight<Result<V>>>,
}

impl<V> Lookup<V> {
    fn hit(value: V) -> Self {
        Self {
            state: Either::Left(ready(Ok(value))),
        }
    }

    fn fetch(flight: Flight<Result<V>>) -> Self {
        Self {
            state: Either::Right(flight),
        }
    }

    /// Returns `true` if the value was served from a fresh entry.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self.state, Either::Left(_))
    }

    /// Returns how this read relates to the fetch it waits on, or `None` for a cache hit.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        match &self.state {
            Either::Left(_) => None,
            Either::Right(flight) => Some(flight.role()),
        }
    }
}

impl<V> Future for Lookup<V>
where
    V: Clone,
{
    type Output = Result<V>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.state.poll_unpin(cx)
    }
}

impl<V> Debug for Lookup<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup")
            .field("hit", &self.is_hit())
            .field("role", &self.role())
            .finish()
    }
}
