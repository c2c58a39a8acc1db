//! # Shopkeep Testing
//!
//! Testing utilities and helpers for Shopkeep stores.
//!
//! This crate provides:
//! - Deterministic clocks for the store environments
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - Assertion helpers for effects
//! - [`settle_effects`], which runs effects to their feedback actions without a store
//!
//! ## Example
//!
//! ```ignore
//! use shopkeep_testing::{settle_effects, test_clock};
//!
//! #[tokio::test]
//! async fn test_fetch_settles() {
//!     let env = ProductEnvironment::new(InMemoryProductRepository::shared(), Arc::new(test_clock()));
//!     let mut state = ProductState::default();
//!
//!     let effects = ProductReducer::new().reduce(&mut state, ProductAction::fetch_all(), &env);
//!     let actions = settle_effects(effects).await;
//!
//!     assert!(matches!(actions[0], ProductAction::ProductsLoaded { .. }));
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use shopkeep_core::effect::Effect;
use shopkeep_core::environment::Clock;
use std::sync::Mutex;

pub mod reducer_test;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Mutex, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use shopkeep_testing::mocks::FixedClock;
    /// use shopkeep_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to
    ///
    /// Products created at different instants get different ids, so tests
    /// that create several products advance this between creations.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
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

/// Run every effect to completion and collect the actions they settle into
///
/// Effects run concurrently, like they would in a store. Results come back in
/// effect order and effects that produce nothing are skipped.
pub async fn settle_effects<A, I>(effects: I) -> Vec<A>
where
    I: IntoIterator<Item = Effect<A>>,
{
    futures::future::join_all(effects.into_iter().map(Effect::into_action))
        .await
        .into_iter()
        .flatten()
        .collect()
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock, ManualClock};
pub use reducer_test::{assertions, ReducerTest};
