//! # Event Roster Core
//!
//! Capacity and waitlist admission control for event registrations.
//!
//! Every registration attempt against an event either receives one of the
//! event's confirmed seats or lands on its waitlist. Managers mark attendance
//! of confirmed participants and promote waitlisted ones by hand.
//!
//! ## Core Concepts
//!
//! - **Capacity**: Fixed maximum number of confirmed participants of an event
//! - **Confirmed**: Holds a seat within capacity
//! - **Waitlisted**: Registered after capacity was reached, holds no seat
//! - **Promotion**: Manual move from waitlisted to confirmed
//! - **Environment**: Clock and stores injected as trait objects
//!
//! ## Architecture
//!
//! - The controller holds no mutable state and reads fresh on every call
//! - Stores are capabilities (`EventStore`, `ParticipantStore`), not a database
//! - Stored representations are decoded once at the store boundary
//! - UI layers call plain async functions returning `Result`
//!
//! ## Example
//!
//! ```ignore
//! use event_roster_core::*;
//!
//! let controller = AdmissionController::new(AdmissionEnvironment::new(
//!     Arc::new(SystemClock),
//!     events,
//!     participants,
//! ));
//!
//! let registration = controller.register(event_id, "Ana", "ana@example.com").await?;
//! if registration.is_waitlisted() {
//!     println!("You are on the waitlist");
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod admission;
pub mod error;
pub mod session;
pub mod store;
pub mod types;

pub use admission::{
    AdmissionController, AdmissionEnvironment, Promotion, Registration, RegistrationSource,
};
pub use error::{AdmissionError, Operation};
pub use session::RosterSession;
pub use store::{EventStore, ParticipantStore, StoreError, StoreFuture};
pub use types::{
    AdmissionCandidate, AdmissionStatus, Capacity, Event, EventId, EventStatus, NewParticipant,
    Participant, ParticipantId, RosterStats, Suggestion, SuggestionField,
};

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via [`AdmissionEnvironment`].
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Registration timestamps come from the clock, and the waitlist is
    /// ordered by them, so tests inject a deterministic clock.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use environment::{Clock, SystemClock};
