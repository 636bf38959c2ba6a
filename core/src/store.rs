//! Store capabilities consumed by the admission controller.
//!
//! Events and participants live in an external relational store shared by every
//! client. This module describes the minimal capabilities the controller needs
//! from it, nothing more:
//!
//! - [`EventStore`]: read an event by ID
//! - [`ParticipantStore`]: filtered counts and reads, insert, status and
//!   attendance updates, registrant lookup for form suggestions
//!
//! # Implementations
//!
//! - `PostgresEventStore` / `PostgresParticipantStore` (in `event-roster-postgres`)
//! - `InMemoryEventStore` / `InMemoryParticipantStore` (in `event-roster-testing`)
//!
//! # Dyn Compatibility
//!
//! Both traits return explicit `Pin<Box<dyn Future>>` values instead of using
//! `async fn` so they can be shared as `Arc<dyn EventStore>` and
//! `Arc<dyn ParticipantStore>` inside the controller's environment.

use crate::types::{
    AdmissionCandidate, AdmissionStatus, Capacity, Event, EventId, NewParticipant, Participant,
    ParticipantId, Suggestion, SuggestionField,
};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors reported by a store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or the call failed for infrastructure reasons.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded into a domain type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The row targeted by an update does not exist.
    #[error("Row not found: {0}")]
    NotFound(String),
}

/// Read access to events.
pub trait EventStore: Send + Sync {
    /// Load an event by ID.
    ///
    /// Returns `Ok(None)` when no event has this ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend call fails, or
    /// [`StoreError::Decode`] if the stored row is malformed.
    fn get_by_id(&self, id: EventId) -> StoreFuture<'_, Option<Event>>;
}

/// Participant persistence for admission control.
///
/// No method here is transactional with any other. Callers that need the
/// count-then-insert sequence to be atomic go through [`ParticipantStore::admit`],
/// which backends with transactions override.
pub trait ParticipantStore: Send + Sync {
    /// Count participants of an event, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend call fails.
    fn count(&self, event_id: EventId, status: Option<AdmissionStatus>) -> StoreFuture<'_, u32>;

    /// List all participants of an event, most recent registration first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend call fails, or
    /// [`StoreError::Decode`] if a stored row is malformed.
    fn list_by_event(&self, event_id: EventId) -> StoreFuture<'_, Vec<Participant>>;

    /// Find the participant of an event registered with exactly this email.
    ///
    /// The match is case-sensitive on the stored value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend call fails.
    fn find_by_event_and_email<'a>(
        &'a self,
        event_id: EventId,
        email: &'a str,
    ) -> StoreFuture<'a, Option<Participant>>;

    /// Load a participant by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend call fails.
    fn find_by_id(&self, id: ParticipantId) -> StoreFuture<'_, Option<Participant>>;

    /// Insert a participant row and return it with its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniqueViolation`] if the event already has a
    /// participant with this email, or [`StoreError::Unavailable`] if the
    /// backend call fails.
    fn insert(&self, participant: NewParticipant) -> StoreFuture<'_, Participant>;

    /// Set a participant's admission status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no row was updated, or
    /// [`StoreError::Unavailable`] if the backend call fails.
    fn update_status(&self, id: ParticipantId, status: AdmissionStatus) -> StoreFuture<'_, ()>;

    /// Set a participant's attendance flag. The store does not check status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no row was updated, or
    /// [`StoreError::Unavailable`] if the backend call fails.
    fn update_attendance(&self, id: ParticipantId, attended: bool) -> StoreFuture<'_, ()>;

    /// Past registrants, across every event, whose `field` contains `query`
    /// ignoring case. At most `limit` rows, most recent registration first.
    ///
    /// Rows are returned as stored; the same email may appear more than once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend call fails.
    fn suggest<'a>(
        &'a self,
        field: SuggestionField,
        query: &'a str,
        limit: u32,
    ) -> StoreFuture<'a, Vec<Suggestion>>;

    /// Count confirmed seats, decide the candidate's status, and insert it.
    ///
    /// The provided implementation issues a fresh confirmed count followed by
    /// an insert, with nothing serializing the two: concurrent candidates
    /// racing for the last seat can all be confirmed. Backends that can lock
    /// or use a transaction should override this and keep the same result.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ParticipantStore::count`] and
    /// [`ParticipantStore::insert`]. Nothing is written if the count fails.
    /// Overrides that re-check the event return [`StoreError::NotFound`] when
    /// it no longer exists.
    fn admit(
        &self,
        candidate: AdmissionCandidate,
        capacity: Capacity,
    ) -> StoreFuture<'_, Participant> {
        Box::pin(async move {
            let confirmed = self
                .count(candidate.event_id, Some(AdmissionStatus::Confirmed))
                .await?;
            let status = AdmissionStatus::for_new_participant(confirmed, capacity);
            self.insert(candidate.into_new_participant(status)).await
        })
    }
}
