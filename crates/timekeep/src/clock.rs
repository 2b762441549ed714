// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Instant;

use crate::Stopwatch;
#[cfg(any(feature = "test-util", test))]
use crate::ClockControl;

/// Provides the current time.
///
/// Cloning a clock is cheap. Clones of a controlled clock share the same
/// [`ClockControl`](crate::ClockControl) state, so advancing time through the control is
/// observed by every clone.
///
/// # Examples
///
/// ```
/// use timekeep::Clock;
///
/// let clock = Clock::new_system();
/// let earlier = clock.instant();
/// let later = clock.instant();
///
/// assert!(later >= earlier);
/// ```
#[derive(Debug, Clone)]
pub struct Clock(ClockRepr);

#[derive(Debug, Clone)]
enum ClockRepr {
    System,
    #[cfg(any(feature = "test-util", test))]
    Controlled(ClockControl),
}

impl Clock {
    /// Creates a clock that reads the operating system clock.
    #[must_use]
    pub fn new_system() -> Self {
        Self(ClockRepr::System)
    }

    /// Creates a frozen clock.
    ///
    /// This is a shortcut for `ClockControl::new().to_clock()`. Time never moves on its own,
    /// and since the control is dropped here, it never moves at all.
    ///
    /// # Examples
    ///
    /// ```
    /// use timekeep::Clock;
    ///
    /// let clock = Clock::new_frozen();
    /// assert_eq!(clock.instant(), clock.instant());
    /// ```
    #[cfg(any(feature = "test-util", test))]
    #[must_use]
    pub fn new_frozen() -> Self {
        ClockControl::new().to_clock()
    }

    #[cfg(any(feature = "test-util", test))]
    pub(crate) fn with_control(control: &ClockControl) -> Self {
        Self(ClockRepr::Controlled(control.clone()))
    }

    /// Returns the current monotonic instant.
    #[must_use]
    pub fn instant(&self) -> Instant {
        match &self.0 {
            ClockRepr::System => Instant::now(),
            #[cfg(any(feature = "test-util", test))]
            ClockRepr::Controlled(control) => control.instant(),
        }
    }

    /// Starts a [`Stopwatch`] driven by this clock.
    #[must_use]
    pub fn stopwatch(&self) -> Stopwatch {
        Stopwatch::new(self)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new_system()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = Clock::new_system();
        let first = clock.instant();
        let second = clock.instant();
        assert!(second >= first);
    }

    #[test]
    fn default_is_system() {
        assert!(matches!(Clock::default().0, ClockRepr::System));
    }

    #[test]
    fn frozen_clock_does_not_move() {
        let clock = Clock::new_frozen();
        let first = clock.instant();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.instant(), first);
    }
}
