// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::Clock;

/// Controls the flow of time in tests.
///
/// Every [`Clock`] created through [`to_clock`](Self::to_clock) observes the time of this
/// control. Time starts frozen and only moves when [`advance`](Self::advance) is called.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use timekeep::ClockControl;
///
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let before = clock.instant();
/// control.advance(Duration::from_secs(1));
///
/// assert_eq!(clock.instant() - before, Duration::from_secs(1));
/// ```
///
/// # Production code and `ClockControl`
///
/// `ClockControl` exists only with the `test-util` feature, which should only be enabled
/// for `dev-dependencies`:
///
/// ```toml
/// timekeep = { version = "*", features = ["test-util"] }
/// ```
#[derive(Debug, Clone)]
pub struct ClockControl {
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
struct State {
    origin: Instant,
    offset: Duration,
}

impl Default for ClockControl {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                origin: Instant::now(),
                offset: Duration::ZERO,
            })),
        }
    }
}

impl ClockControl {
    /// Creates a control with time frozen at the moment of the call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clock that observes this control.
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock::with_control(self)
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.lock().offset += duration;
    }

    pub(crate) fn instant(&self) -> Instant {
        let state = self.lock();
        state.origin + state.offset
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not take every other clone down with it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
