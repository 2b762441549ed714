// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache activity recording.
//!
//! Every cache activity bumps a counter (surfaced through [`CacheStats`](crate::CacheStats))
//! and, unless disabled in the builder, emits a `tracing` event with the fields
//! `cache.name`, `cache.operation`, `cache.activity` and `cache.count`.

use crate::stats::{ActivityCounters, ActivityCounts};

pub(crate) type CacheName = &'static str;

#[cfg(test)]
const CACHE_NAME: &str = "cache.name";
#[cfg(test)]
const CACHE_OPERATION_NAME: &str = "cache.operation";
#[cfg(test)]
const CACHE_ACTIVITY_NAME: &str = "cache.activity";

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheOperation {
    Get,
    Read,
    Insert,
    Invalidate,
    Clear,
}

impl CacheOperation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Read => "cache.read",
            Self::Insert => "cache.insert",
            Self::Invalidate => "cache.invalidate",
            Self::Clear => "cache.clear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Joined,
    Expired,
    Inserted,
    Discarded,
    Invalidated,
    Rejected,
    Error,
}

impl CacheActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Joined => "cache.joined",
            Self::Expired => "cache.expired",
            Self::Inserted => "cache.inserted",
            Self::Discarded => "cache.discarded",
            Self::Invalidated => "cache.invalidated",
            Self::Rejected => "cache.rejected",
            Self::Error => "cache.error",
        }
    }

    fn severity(self) -> Severity {
        match self {
            Self::Hit | Self::Miss | Self::Joined | Self::Rejected => Severity::Debug,
            Self::Expired | Self::Inserted | Self::Discarded | Self::Invalidated => Severity::Info,
            Self::Error => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Debug,
    Info,
    Error,
}

#[derive(Debug)]
pub(crate) struct CacheTelemetry {
    name: CacheName,
    logging_enabled: bool,
    counters: ActivityCounters,
}

impl CacheTelemetry {
    pub(crate) fn new(name: CacheName, logging_enabled: bool) -> Self {
        Self {
            name,
            logging_enabled,
            counters: ActivityCounters::default(),
        }
    }

    pub(crate) fn name(&self) -> CacheName {
        self.name
    }

    #[inline]
    pub(crate) fn record(&self, operation: CacheOperation, activity: CacheActivity) {
        self.record_many(operation, activity, 1);
    }

    /// Records `count` occurrences of `activity` as a single event. Nothing is recorded for zero.
    pub(crate) fn record_many(&self, operation: CacheOperation, activity: CacheActivity, count: usize) {
        if count == 0 {
            return;
        }

        self.counters.add(activity, count);

        if self.logging_enabled {
            Self::emit(self.name, operation, activity, count);
        }
    }

    pub(crate) fn counts(&self) -> ActivityCounts {
        self.counters.snapshot()
    }

    fn emit(cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, count: usize) {
        let op = operation.as_str();
        let ac = activity.as_str();

        // Tracing levels must be constant, hence one expansion per level.
        // Field names must match the constants above; see emit_contains_all_fields_and_values.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = ac,
                    cache.count = count,
                    "cache.event"
                )
            };
        }

        match activity.severity() {
            Severity::Error => emit_event!(error),
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
        }
    }
}
