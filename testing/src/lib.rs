//! # Event Roster Testing
//!
//! Testing utilities and helpers for event roster admission.
//!
//! This crate provides:
//! - In-memory implementations of the store capabilities
//! - Deterministic clocks
//! - A roster harness wiring a controller to in-memory stores
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use event_roster_testing::RosterHarness;
//!
//! #[tokio::test]
//! async fn test_waitlist() {
//!     let harness = RosterHarness::with_capacity(1);
//!
//!     harness.register("Ana").await.unwrap();
//!     let second = harness.register("Luis").await.unwrap();
//!
//!     assert!(second.is_waitlisted());
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use event_roster_core::environment::Clock;

mod store_mocks;

pub use store_mocks::{InMemoryEventStore, InMemoryParticipantStore};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use event_roster_testing::mocks::FixedClock;
    /// use event_roster_core::environment::Clock;
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

    /// Clock that advances by a fixed step on every reading
    ///
    /// Sequential registrations get strictly increasing timestamps, so FIFO
    /// ordering in tests does not depend on tie-breaking.
    ///
    /// ```
    /// use event_roster_testing::mocks::SteppingClock;
    /// use event_roster_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = SteppingClock::new(Utc::now(), Duration::seconds(1));
    /// let first = clock.now();
    /// assert_eq!(clock.now() - first, Duration::seconds(1));
    /// ```
    #[derive(Debug)]
    pub struct SteppingClock {
        next: Mutex<DateTime<Utc>>,
        step: Duration,
    }

    impl SteppingClock {
        /// Create a clock starting at `start`, advancing `step` per reading
        #[must_use]
        pub const fn new(start: DateTime<Utc>, step: Duration) -> Self {
            Self {
                next: Mutex::new(start),
                step,
            }
        }
    }

    impl Clock for SteppingClock {
        #[allow(clippy::unwrap_used)] // A poisoned clock means a test already panicked
        fn now(&self) -> DateTime<Utc> {
            let mut next = self.next.lock().unwrap();
            let current = *next;
            *next = current + self.step;
            current
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// Create a stepping clock starting at 2025-01-01 00:00:00 UTC, one second per reading
    #[must_use]
    pub fn stepping_clock() -> SteppingClock {
        SteppingClock::new(test_epoch(), Duration::seconds(1))
    }

    #[allow(clippy::expect_used)]
    fn test_epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }
}

/// Test helpers and utilities
///
/// Builders for common admission scenarios.
pub mod helpers {
    use super::mocks::stepping_clock;
    use super::{Clock, InMemoryEventStore, InMemoryParticipantStore};
    use event_roster_core::admission::{AdmissionController, AdmissionEnvironment, Registration};
    use event_roster_core::error::AdmissionError;
    use event_roster_core::types::{AdmissionStatus, Capacity, Event, EventStatus};
    use std::sync::Arc;

    /// An active event with the given capacity
    #[must_use]
    pub fn active_event(capacity: u32) -> Event {
        Event::new("Test event", Capacity::new(capacity))
    }

    /// An event with the given capacity and status
    #[must_use]
    pub fn event_with_status(capacity: u32, status: EventStatus) -> Event {
        active_event(capacity).with_status(status)
    }

    /// Controller wired to in-memory stores holding one event.
    ///
    /// Uses a stepping clock, so registrations made one after another are
    /// strictly ordered in time.
    pub struct RosterHarness {
        /// The controller under test
        pub controller: AdmissionController,
        /// Backing event store
        pub events: InMemoryEventStore,
        /// Backing participant store
        pub participants: InMemoryParticipantStore,
        /// The event registrations go to
        pub event: Event,
    }

    impl RosterHarness {
        /// Harness around an active event with the given capacity
        #[must_use]
        pub fn with_capacity(capacity: u32) -> Self {
            Self::with_event(active_event(capacity))
        }

        /// Harness around the given event
        #[must_use]
        pub fn with_event(event: Event) -> Self {
            Self::with_stores(event, InMemoryParticipantStore::new())
        }

        /// Harness around the given event and participant store
        #[must_use]
        pub fn with_stores(event: Event, participants: InMemoryParticipantStore) -> Self {
            Self::with_parts(event, participants, Arc::new(stepping_clock()))
        }

        /// Harness around the given event, reading time from `clock`
        ///
        /// A [`FixedClock`](super::mocks::FixedClock) gives every registration
        /// the same timestamp.
        #[must_use]
        pub fn with_clock(event: Event, clock: Arc<dyn Clock>) -> Self {
            Self::with_parts(event, InMemoryParticipantStore::new(), clock)
        }

        fn with_parts(
            event: Event,
            participants: InMemoryParticipantStore,
            clock: Arc<dyn Clock>,
        ) -> Self {
            let events = InMemoryEventStore::new();
            events.insert_event(event.clone());

            let controller = AdmissionController::new(AdmissionEnvironment::new(
                clock,
                Arc::new(events.clone()),
                Arc::new(participants.clone()),
            ));

            Self {
                controller,
                events,
                participants,
                event,
            }
        }

        /// Register `name` with a derived email (`name@example.com`, lowercased)
        ///
        /// # Errors
        ///
        /// Same as [`AdmissionController::register`].
        pub async fn register(&self, name: &str) -> Result<Registration, AdmissionError> {
            let email = format!("{}@example.com", name.to_lowercase());
            self.controller.register(self.event.id, name, &email).await
        }

        /// Register each name in order and collect the resulting statuses
        ///
        /// # Errors
        ///
        /// Stops at the first failed registration.
        pub async fn register_all(
            &self,
            names: &[&str],
        ) -> Result<Vec<AdmissionStatus>, AdmissionError> {
            let mut statuses = Vec::with_capacity(names.len());
            for name in names {
                statuses.push(self.register(name).await?.status);
            }
            Ok(statuses)
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Non-blank display names
    pub fn name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z ]{0,15}"
    }

    /// Capacities between 1 and 20
    pub fn capacity() -> impl Strategy<Value = u32> {
        1u32..=20
    }

    /// Strings that are empty after trimming
    pub fn blank() -> impl Strategy<Value = String> {
        "[ \t]{0,4}"
    }
}

/// Install a `tracing` subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use helpers::RosterHarness;
pub use mocks::{FixedClock, SteppingClock, stepping_clock, test_clock};
