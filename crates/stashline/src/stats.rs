// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Point-in-time views of a cache's contents and activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::telemetry::CacheActivity;

/// A snapshot of a [`TtlCache`](crate::TtlCache).
///
/// Stale entries that no read has touched yet are still listed; use
/// [`EntryStats::is_expired`] to tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CacheStats {
    /// Number of stored entries, fresh or not.
    pub size: usize,
    /// One row per stored entry, ordered by key.
    pub entries: Vec<EntryStats>,
    /// Number of fetches currently in flight.
    pub in_flight: usize,
    /// Activity since the cache was built.
    pub activity: ActivityCounts,
}

/// Age and lifetime of a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct EntryStats {
    /// The entry's key.
    pub key: String,
    /// Time since the value was stored.
    pub age: Duration,
    /// The entry's time-to-live.
    pub ttl: Duration,
}

impl EntryStats {
    /// Returns how long the entry stays fresh, or zero once it has expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.age)
    }

    /// Returns `true` if the entry would be treated as absent by the next read.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.age >= self.ttl
    }
}

/// Activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ActivityCounts {
    /// Reads served from a fresh entry.
    pub hits: u64,
    /// Reads that started a fetch.
    pub misses: u64,
    /// Reads that attached to a fetch already in flight.
    pub joined: u64,
    /// Stale entries dropped by the read that found them.
    pub expired: u64,
    /// Values stored by a completed fetch.
    pub inserted: u64,
    /// Completed fetches whose value was not stored because the key was invalidated meanwhile.
    pub discarded: u64,
    /// Entries removed by invalidation or clearing.
    pub invalidated: u64,
    /// Reads answered with a failure remembered from an earlier fetch.
    pub rejected: u64,
    /// Fetches whose producer failed.
    pub fetch_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct ActivityCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    joined: AtomicU64,
    expired: AtomicU64,
    inserted: AtomicU64,
    discarded: AtomicU64,
    invalidated: AtomicU64,
    rejected: AtomicU64,
    fetch_failures: AtomicU64,
}

impl ActivityCounters {
    pub(crate) fn add(&self, activity: CacheActivity, count: usize) {
        let counter = match activity {
            CacheActivity::Hit => &self.hits,
            CacheActivity::Miss => &self.misses,
            CacheActivity::Joined => &self.joined,
            CacheActivity::Expired => &self.expired,
            CacheActivity::Inserted => &self.inserted,
            CacheActivity::Discarded => &self.discarded,
            CacheActivity::Invalidated => &self.invalidated,
            CacheActivity::Rejected => &self.rejected,
            CacheActivity::Error => &self.fetch_failures,
        };
        counter.fetch_add(u64::try_from(count).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ActivityCounts {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        ActivityCounts {
            hits: load(&self.hits),
            misses: load(&self.misses),
            joined: load(&self.joined),
            expired: load(&self.expired),
            inserted: load(&self.inserted),
            discarded: load(&self.discarded),
            invalidated: load(&self.invalidated),
            rejected: load(&self.rejected),
            fetch_failures: load(&self.fetch_failures),
        }
    }
}
