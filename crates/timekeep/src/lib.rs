// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! An injectable source of time.
//!
//! Code that needs the current time takes a [`Clock`] instead of calling [`Instant::now`]
//! directly. In production the clock reads the operating system; in tests a
//! [`ClockControl`] (available with the `test-util` feature) freezes time and lets the
//! test move it forward deterministically.
//!
//! Only monotonic time is exposed: [`Clock::instant`] is what cache ages and TTLs are
//! measured with.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use timekeep::Clock;
//!
//! let clock = Clock::new_system();
//! let stopwatch = clock.stopwatch();
//! // Perform some operation...
//! let elapsed: Duration = stopwatch.elapsed();
//! # let _ = elapsed;
//! ```
//!
//! [`Instant::now`]: std::time::Instant::now

mod clock;
#[cfg(any(feature = "test-util", test))]
mod clock_control;
mod stopwatch;

pub use clock::Clock;
#[cfg(any(feature = "test-util", test))]
pub use clock_control::ClockControl;
pub use stopwatch::Stopwatch;
