// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builders for [`TtlCache`] and [`SuspenseCache`].

use std::marker::PhantomData;
use std::time::Duration;

use coflight::Spawner;
use timekeep::Clock;

use crate::telemetry::CacheName;
use crate::{DEFAULT_TTL, InvalidationPolicy, SuspenseCache, TtlCache};

const DEFAULT_TTL_CACHE_NAME: CacheName = "ttl_cache";
const DEFAULT_SUSPENSE_CACHE_NAME: CacheName = "suspense_cache";

/// Configures a [`TtlCache`].
///
/// Created by [`TtlCache::builder`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use stashline::{InvalidationPolicy, TtlCache};
/// use timekeep::Clock;
///
/// let cache: TtlCache<String> = TtlCache::builder(Clock::new_system())
///     .name("posts")
///     .default_ttl(Duration::from_secs(5))
///     .invalidation(InvalidationPolicy::Fenced)
///     .logs(false)
///     .build();
///
/// assert_eq!(cache.name(), "posts");
/// assert_eq!(cache.default_ttl(), Duration::from_secs(5));
/// ```
#[derive(Debug)]
#[must_use = "builders do nothing unless you call `build`"]
pub struct TtlCacheBuilder<V> {
    name: CacheName,
    clock: Clock,
    default_ttl: Duration,
    invalidation: InvalidationPolicy,
    spawner: Option<Spawner>,
    logs: bool,
    _phantom: PhantomData<fn() -> V>,
}

impl<V> TtlCacheBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            name: DEFAULT_TTL_CACHE_NAME,
            clock,
            default_ttl: DEFAULT_TTL,
            invalidation: InvalidationPolicy::default(),
            spawner: None,
            logs: true,
            _phantom: PhantomData,
        }
    }

    /// Sets the name reported in log events. Defaults to `ttl_cache`.
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Sets the TTL used by [`TtlCache::get_or_fetch`]. Defaults to [`DEFAULT_TTL`].
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets what invalidations mean for fetches in flight.
    pub fn invalidation(mut self, policy: InvalidationPolicy) -> Self {
        self.invalidation = policy;
        self
    }

    /// Drives every fetch to completion on `spawner`, even if all of its readers stop waiting.
    ///
    /// The fetch is handed over after the cache released its locks, so the spawner may
    /// poll it inline.
    pub fn spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Enables or disables log events. Activity counters are kept either way.
    pub fn logs(mut self, enabled: bool) -> Self {
        self.logs = enabled;
        self
    }

    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> TtlCache<V> {
        TtlCache::assemble(self.name, self.clock, self.default_ttl, self.invalidation, self.spawner, self.logs)
    }
}

/// Configures a [`SuspenseCache`].
///
/// Created by [`SuspenseCache::builder`].
///
/// # Examples
///
/// ```
/// use stashline::SuspenseCache;
///
/// let cache: SuspenseCache<Vec<u32>> = SuspenseCache::builder().name("comments").build();
/// assert!(cache.is_empty());
/// ```
#[derive(Debug)]
#[must_use = "builders do nothing unless you call `build`"]
pub struct SuspenseCacheBuilder<V> {
    name: CacheName,
    spawner: Option<Spawner>,
    logs: bool,
    _phantom: PhantomData<fn() -> V>,
}

impl<V> SuspenseCacheBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            name: DEFAULT_SUSPENSE_CACHE_NAME,
            spawner: None,
            logs: true,
            _phantom: PhantomData,
        }
    }

    /// Sets the name reported in log events. Defaults to `suspense_cache`.
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Settles pending entries on `spawner` without waiting for a reader to await them.
    ///
    /// The work is handed over after the cache released its locks, so the spawner may poll
    /// it inline.
    pub fn spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Enables or disables log events.
    pub fn logs(mut self, enabled: bool) -> Self {
        self.logs = enabled;
        self
    }

    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> SuspenseCache<V> {
        SuspenseCache::assemble(self.name, self.spawner, self.logs)
    }
}
