//! # Ticket Resale Testing
//!
//! Testing utilities for the ticket resale engine.
//!
//! This crate provides:
//! - [`FixedClock`]: a deterministic clock that tests can move forward
//! - [`ReducerTest`]: a Given/When/Then builder for reducers
//! - [`assertions`]: helpers for checking returned effects
//!
//! ## Example
//!
//! ```ignore
//! use ticket_resale_testing::{test_clock, ReducerTest};
//!
//! let clock = test_clock();
//! ReducerTest::new(TicketReducer::new())
//!     .with_env(environment_with(clock.clone()))
//!     .given_state(TicketState::new())
//!     .when_action(issue_command())
//!     .then_state(|state| assert_eq!(state.issued_count(), 1))
//!     .run();
//! ```


pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of Environment traits
pub mod mocks {
    use chrono::{DateTime, Duration, Utc};
    use std::sync::{Arc, PoisonError, RwLock};
    use ticket_resale_core::environment::Clock;

    /// Deterministic clock for tests
    ///
    /// Returns the same instant until moved with [`advance`](Self::advance) or
    /// [`set`](Self::set). Clones share the same instant, so a test can keep a
    /// handle and move the clock it injected into an environment.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_resale_testing::mocks::FixedClock;
    /// use ticket_resale_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let before = clock.now();
    /// assert_eq!(before, clock.now());
    ///
    /// clock.advance(Duration::hours(25));
    /// assert_eq!(clock.now() - before, Duration::hours(25));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock at the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward
        ///
        /// Negative durations are ignored; a clock never runs backwards.
        pub fn advance(&self, by: Duration) {
            if by < Duration::zero() {
                return;
            }
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to `time` if it is not earlier than the current instant
        pub fn set(&self, time: DateTime<Utc>) {
            let mut current = self.time.write().unwrap_or_else(PoisonError::into_inner);
            if time > *current {
                *current = time;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock};
