// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Memory caches that fetch missing data once, however many readers ask for it.
//!
//! Two caches are provided, both built on [`coflight::Coordinator`] so that concurrent
//! reads of the same key share a single fetch:
//!
//! - [`TtlCache`] stores each fetched value for a time-to-live and serves it from memory
//!   until it goes stale. Entries can be invalidated one at a time, by regular expression,
//!   or all at once.
//! - [`SuspenseCache`] answers reads synchronously with either the value or a
//!   [`Suspension`] to await before reading again, for hosts that pause a reader until its
//!   data is available.
//!
//! Time is read from an injected [`timekeep::Clock`], so expiry can be tested without
//! sleeping.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use stashline::TtlCache;
//! use timekeep::Clock;
//!
//! # futures::executor::block_on(async {
//! let cache = TtlCache::new(Clock::new_system());
//!
//! let user = cache
//!     .get("user-1", Duration::from_secs(60), || async {
//!         Ok::<_, std::io::Error>("Leanne Graham".to_string())
//!     })
//!     .await?;
//!
//! assert_eq!(user, "Leanne Graham");
//! assert_eq!(cache.peek("user-1").as_deref(), Some("Leanne Graham"));
//! # Ok::<(), stashline::Error>(())
//! # }).unwrap();
//! ```
//!
//! # Failures
//!
//! A producer's error reaches every reader attached to the fetch as a cloned
//! [`Error::Fetch`]. The TTL cache stores nothing on failure, so the next read fetches
//! again. The suspense cache remembers the failure until the entry is invalidated.
//!
//! # Logging
//!
//! Cache activity is reported through `tracing` events named `cache.event`, carrying the
//! fields `cache.name`, `cache.operation`, `cache.activity` and `cache.count`. Hits and
//! misses are logged at `DEBUG`, stores and invalidations at `INFO`, and failed fetches at
//! `ERROR`.

mod builder;
mod entry;
mod error;
mod stats;
mod suspense;
mod telemetry;
mod ttl;

pub use builder::{SuspenseCacheBuilder, TtlCacheBuilder};
pub use coflight::{Role, Spawner};
pub use entry::CacheEntry;
pub use error::{Error, FetchFailure, Result};
pub use stats::{ActivityCounts, CacheStats, EntryStats};
pub use suspense::{EntryStatus, Readiness, SuspenseCache, Suspension};
pub use ttl::{DEFAULT_TTL, InvalidationPolicy, Lookup, TtlCache};
