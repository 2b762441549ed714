// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    ops::Deref,
    time::{Duration, Instant},
};

/// A cached value with the metadata needed to judge its freshness.
///
/// An entry is fresh while its age is strictly below its TTL. The TTL is fixed when the
/// entry is created; refetching a key replaces the entry wholesale.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
///
/// use stashline::CacheEntry;
///
/// let cached_at = Instant::now();
/// let entry = CacheEntry::new("Leanne Graham", cached_at, Duration::from_secs(60));
///
/// assert!(entry.is_fresh(cached_at + Duration::from_secs(59)));
/// assert!(!entry.is_fresh(cached_at + Duration::from_secs(60)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    cached_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Creates an entry that was cached at `cached_at` and lives for `ttl`.
    pub fn new(value: V, cached_at: Instant, ttl: Duration) -> Self {
        Self { value, cached_at, ttl }
    }

    /// Returns a reference to the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry and returns the inner value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns the instant the value was stored.
    #[must_use]
    pub fn cached_at(&self) -> Instant {
        self.cached_at
    }

    /// Returns the entry's time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns how long the entry has been cached as of `now`.
    ///
    /// An instant before `cached_at` yields zero.
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.cached_at)
    }

    /// Returns `true` if the entry may still be served as of `now`.
    #[must_use]
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.age(now) < self.ttl
    }
}

impl<V> Deref for CacheEntry<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}
