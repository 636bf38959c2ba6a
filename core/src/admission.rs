//! Admission controller for event registrations.
//!
//! Decides, for every registration attempt, whether the participant gets a
//! confirmed seat or goes to the waitlist, and persists the outcome. Managers
//! use the same controller to mark attendance and to promote waitlisted
//! participants by hand.
//!
//! # Capacity Race
//!
//! Registration reads the confirmed count and inserts in two separate store
//! calls unless the participant store overrides [`ParticipantStore::admit`].
//! Against such a store, concurrent registrants competing for the last seat
//! can all be confirmed, so the confirmed count may exceed capacity by the
//! number of racing requests. The `PostgreSQL` backend serializes admission
//! per event and does not have this window.
//!
//! # Promotion
//!
//! Promotion is a manual override and is never gated on capacity. It may push
//! the confirmed count above capacity; the controller reports and logs that
//! but does not refuse.

use crate::environment::Clock;
use crate::error::{AdmissionError, Operation};
use crate::store::{EventStore, ParticipantStore, StoreError};
use crate::types::{
    AdmissionCandidate, AdmissionStatus, Capacity, Event, EventId, Participant, ParticipantId,
    RosterStats, Suggestion, SuggestionField,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Shortest trimmed query, in characters, that produces registrant suggestions
pub const SUGGESTION_MIN_CHARS: usize = 2;

/// Most rows fetched for one suggestion lookup
pub const SUGGESTION_LIMIT: u32 = 5;

/// Who initiated a registration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationSource {
    /// Public registration form
    Public,
    /// Direct add by the event's manager
    Manager,
}

impl RegistrationSource {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Manager => "manager",
        }
    }
}

/// Result of a successful registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// The inserted participant
    pub participant: Participant,
    /// Whether a seat was granted or the participant was waitlisted
    pub status: AdmissionStatus,
}

impl Registration {
    /// Whether the registrant ended up on the waitlist
    #[must_use]
    pub fn is_waitlisted(&self) -> bool {
        self.status == AdmissionStatus::Waitlisted
    }
}

/// Result of a successful promotion
///
/// The capacity figures are advisory, read after the promotion was written.
/// They are `None` when that read failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Promotion {
    /// The promoted participant
    pub participant_id: ParticipantId,
    /// Confirmed participants after the promotion
    pub confirmed_count: Option<u32>,
    /// Capacity of the event
    pub capacity: Option<Capacity>,
}

impl Promotion {
    /// Whether the promotion left the event with more confirmed participants than seats.
    #[must_use]
    pub fn exceeds_capacity(&self) -> bool {
        match (self.confirmed_count, self.capacity) {
            (Some(confirmed), Some(capacity)) => confirmed > capacity.value(),
            _ => false,
        }
    }
}

/// Environment dependencies for the admission controller
#[derive(Clone)]
pub struct AdmissionEnvironment {
    /// Clock for registration timestamps
    pub clock: Arc<dyn Clock>,
    /// Event reads
    pub events: Arc<dyn EventStore>,
    /// Participant persistence
    pub participants: Arc<dyn ParticipantStore>,
}

impl AdmissionEnvironment {
    /// Creates a new `AdmissionEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventStore>,
        participants: Arc<dyn ParticipantStore>,
    ) -> Self {
        Self {
            clock,
            events,
            participants,
        }
    }
}

/// Admission controller
///
/// Holds no mutable state: every operation reads fresh from the stores.
#[derive(Clone)]
pub struct AdmissionController {
    env: AdmissionEnvironment,
}

impl AdmissionController {
    /// Creates a new `AdmissionController`
    #[must_use]
    pub const fn new(env: AdmissionEnvironment) -> Self {
        Self { env }
    }

    /// Access the injected environment
    #[must_use]
    pub const fn environment(&self) -> &AdmissionEnvironment {
        &self.env
    }

    /// Register a participant through the public form.
    ///
    /// Validation runs in this order: the event exists, the event is active,
    /// name and email are non-blank, the email is not yet registered for the
    /// event. Then a fresh confirmed count decides between a confirmed seat
    /// and the waitlist, and the participant is inserted.
    ///
    /// Emails are trimmed but not case-normalized: `Ana@x.org` and `ana@x.org`
    /// are different registrants.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::EventNotFound`]: no such event
    /// - [`AdmissionError::EventClosed`]: the event is finished or cancelled
    /// - [`AdmissionError::Validation`]: blank name or email
    /// - [`AdmissionError::DuplicateRegistration`]: email already registered
    /// - [`AdmissionError::StoreUnavailable`]: a store call failed; nothing was inserted
    pub async fn register(
        &self,
        event_id: EventId,
        name: &str,
        email: &str,
    ) -> Result<Registration, AdmissionError> {
        self.admit(event_id, name, email, RegistrationSource::Public)
            .await
    }

    /// Add a participant directly from the manager's roster.
    ///
    /// Applies exactly the same rules as [`AdmissionController::register`].
    ///
    /// # Errors
    ///
    /// Same as [`AdmissionController::register`].
    pub async fn add_participant(
        &self,
        event_id: EventId,
        name: &str,
        email: &str,
    ) -> Result<Registration, AdmissionError> {
        self.admit(event_id, name, email, RegistrationSource::Manager)
            .await
    }

    #[tracing::instrument(skip(self, name, email, source), fields(source = source.as_str()))]
    async fn admit(
        &self,
        event_id: EventId,
        name: &str,
        email: &str,
        source: RegistrationSource,
    ) -> Result<Registration, AdmissionError> {
        let result = self.try_admit(event_id, name, email).await;

        match &result {
            Ok(registration) => {
                tracing::info!(
                    participant_id = %registration.participant.id,
                    status = %registration.status,
                    "Participant registered"
                );
                metrics::counter!(
                    "roster.registrations",
                    "status" => registration.status.to_string(),
                    "source" => source.as_str()
                )
                .increment(1);
            }
            Err(error) => {
                if let AdmissionError::StoreUnavailable(store_error) = error {
                    tracing::warn!(error = %store_error, "Registration aborted by store failure");
                } else {
                    tracing::debug!(reason = error.reason(), "Registration rejected");
                }
                metrics::counter!("roster.registrations_rejected", "reason" => error.reason())
                    .increment(1);
            }
        }

        result
    }

    async fn try_admit(
        &self,
        event_id: EventId,
        name: &str,
        email: &str,
    ) -> Result<Registration, AdmissionError> {
        let event = self.load_event(event_id).await?;

        if !event.status.accepts_registrations() {
            return Err(AdmissionError::EventClosed {
                event_id,
                status: event.status,
            });
        }

        let candidate = self.validate_candidate(event_id, name, email)?;

        if let Some(existing) = self
            .env
            .participants
            .find_by_event_and_email(event_id, &candidate.email)
            .await?
        {
            return Err(AdmissionError::DuplicateRegistration {
                email: candidate.email,
                existing_status: Some(existing.status),
            });
        }

        let email = candidate.email.clone();
        let participant = self
            .env
            .participants
            .admit(candidate, event.capacity)
            .await
            .map_err(|error| match error {
                // Lost the race against a concurrent registration with the same email
                StoreError::UniqueViolation(_) => AdmissionError::DuplicateRegistration {
                    email,
                    existing_status: None,
                },
                // The event was deleted after it was loaded
                StoreError::NotFound(_) => AdmissionError::EventNotFound(event_id),
                other => AdmissionError::StoreUnavailable(other),
            })?;

        Ok(Registration {
            status: participant.status,
            participant,
        })
    }

    /// Trim and check the registration form fields.
    fn validate_candidate(
        &self,
        event_id: EventId,
        name: &str,
        email: &str,
    ) -> Result<AdmissionCandidate, AdmissionError> {
        let name = name.trim();
        let email = email.trim();

        if name.is_empty() {
            return Err(AdmissionError::Validation("name is required".to_string()));
        }
        if email.is_empty() {
            return Err(AdmissionError::Validation("email is required".to_string()));
        }

        Ok(AdmissionCandidate {
            event_id,
            name: name.to_string(),
            email: email.to_string(),
            requested_at: self.env.clock.now(),
        })
    }

    /// Set the attendance flag of a confirmed participant.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::ParticipantNotFound`]: no such participant
    /// - [`AdmissionError::InvalidState`]: the participant is waitlisted; nothing is written
    /// - [`AdmissionError::StoreUnavailable`]: a store call failed
    #[tracing::instrument(skip(self))]
    pub async fn toggle_attendance(
        &self,
        participant_id: ParticipantId,
        attended: bool,
    ) -> Result<(), AdmissionError> {
        let participant = self.load_participant(participant_id).await?;

        if participant.status != AdmissionStatus::Confirmed {
            tracing::debug!(status = %participant.status, "Attendance toggle rejected");
            return Err(AdmissionError::InvalidState {
                participant_id,
                status: participant.status,
                operation: Operation::ToggleAttendance,
            });
        }

        self.env
            .participants
            .update_attendance(participant_id, attended)
            .await
            .map_err(Self::write_error(participant_id))?;

        tracing::info!(event_id = %participant.event_id, "Attendance updated");
        metrics::counter!("roster.attendance_updates").increment(1);

        Ok(())
    }

    /// Move a waitlisted participant to confirmed.
    ///
    /// Capacity is not checked before the update: promotion is a manual
    /// override. The returned [`Promotion`] tells whether the event is now
    /// over capacity.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::ParticipantNotFound`]: no such participant
    /// - [`AdmissionError::InvalidState`]: the participant is already confirmed
    /// - [`AdmissionError::StoreUnavailable`]: the read or the update failed
    #[tracing::instrument(skip(self))]
    pub async fn promote(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Promotion, AdmissionError> {
        let participant = self.load_participant(participant_id).await?;

        if participant.status != AdmissionStatus::Waitlisted {
            tracing::debug!(status = %participant.status, "Promotion rejected");
            return Err(AdmissionError::InvalidState {
                participant_id,
                status: participant.status,
                operation: Operation::Promote,
            });
        }

        self.env
            .participants
            .update_status(participant_id, AdmissionStatus::Confirmed)
            .await
            .map_err(Self::write_error(participant_id))?;

        metrics::counter!("roster.promotions").increment(1);

        let promotion = self.capacity_after_promotion(participant_id, participant.event_id).await;

        if promotion.exceeds_capacity() {
            tracing::warn!(
                event_id = %participant.event_id,
                confirmed = ?promotion.confirmed_count,
                capacity = ?promotion.capacity.map(|c| c.value()),
                "Promotion pushed event over capacity"
            );
        } else {
            tracing::info!(event_id = %participant.event_id, "Participant promoted");
        }

        Ok(promotion)
    }

    /// Advisory capacity read after a promotion has been written.
    async fn capacity_after_promotion(
        &self,
        participant_id: ParticipantId,
        event_id: EventId,
    ) -> Promotion {
        let capacity = match self.env.events.get_by_id(event_id).await {
            Ok(event) => event.map(|event| event.capacity),
            Err(error) => {
                tracing::warn!(%error, "Could not read event after promotion");
                None
            }
        };

        let confirmed_count = match self
            .env
            .participants
            .count(event_id, Some(AdmissionStatus::Confirmed))
            .await
        {
            Ok(count) => Some(count),
            Err(error) => {
                tracing::warn!(%error, "Could not count confirmed participants after promotion");
                None
            }
        };

        Promotion {
            participant_id,
            confirmed_count,
            capacity,
        }
    }

    /// List all participants of an event, most recent registration first.
    ///
    /// Always reads fresh from the store.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::StoreUnavailable`] if the read fails.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Participant>, AdmissionError> {
        let participants = self.env.participants.list_by_event(event_id).await?;
        tracing::debug!(count = participants.len(), "Participants listed");
        Ok(participants)
    }

    /// Derived statistics for an event's roster.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::EventNotFound`]: no such event
    /// - [`AdmissionError::StoreUnavailable`]: a read failed
    #[tracing::instrument(skip(self))]
    pub async fn stats(&self, event_id: EventId) -> Result<RosterStats, AdmissionError> {
        let event = self.load_event(event_id).await?;
        let participants = self.list_for_event(event_id).await?;
        Ok(RosterStats::from_participants(event.capacity, &participants))
    }

    /// Suggest past registrants to prefill the manager's add form.
    ///
    /// Queries shorter than [`SUGGESTION_MIN_CHARS`] characters after trimming
    /// return nothing without touching the store. Otherwise up to
    /// [`SUGGESTION_LIMIT`] matching rows are fetched from every event and
    /// repeated emails are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::StoreUnavailable`] if the lookup fails.
    #[tracing::instrument(skip(self, query))]
    pub async fn suggest(
        &self,
        field: SuggestionField,
        query: &str,
    ) -> Result<Vec<Suggestion>, AdmissionError> {
        let query = query.trim();
        if query.chars().count() < SUGGESTION_MIN_CHARS {
            return Ok(Vec::new());
        }

        let found = self
            .env
            .participants
            .suggest(field, query, SUGGESTION_LIMIT)
            .await?;

        let mut seen = HashSet::new();
        let suggestions: Vec<Suggestion> = found
            .into_iter()
            .filter(|suggestion| seen.insert(suggestion.email.clone()))
            .collect();

        tracing::debug!(count = suggestions.len(), "Registrant suggestions found");
        Ok(suggestions)
    }

    /// Load an event or fail with `EventNotFound`.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::EventNotFound`]: no such event
    /// - [`AdmissionError::StoreUnavailable`]: the read failed
    pub async fn load_event(&self, event_id: EventId) -> Result<Event, AdmissionError> {
        self.env
            .events
            .get_by_id(event_id)
            .await?
            .ok_or(AdmissionError::EventNotFound(event_id))
    }

    async fn load_participant(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Participant, AdmissionError> {
        self.env
            .participants
            .find_by_id(participant_id)
            .await?
            .ok_or(AdmissionError::ParticipantNotFound(participant_id))
    }

    /// Map an update failure: a vanished row is reported as not found.
    fn write_error(participant_id: ParticipantId) -> impl FnOnce(StoreError) -> AdmissionError {
        move |error| match error {
            StoreError::NotFound(_) => AdmissionError::ParticipantNotFound(participant_id),
            other => AdmissionError::StoreUnavailable(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_over_capacity() {
        let promotion = Promotion {
            participant_id: ParticipantId::new(),
            confirmed_count: Some(3),
            capacity: Some(Capacity::new(2)),
        };
        assert!(promotion.exceeds_capacity());
    }

    #[test]
    fn promotion_at_capacity_is_not_over() {
        let promotion = Promotion {
            participant_id: ParticipantId::new(),
            confirmed_count: Some(2),
            capacity: Some(Capacity::new(2)),
        };
        assert!(!promotion.exceeds_capacity());
    }

    #[test]
    fn promotion_without_advisory_read_is_not_over() {
        let promotion = Promotion {
            participant_id: ParticipantId::new(),
            confirmed_count: None,
            capacity: Some(Capacity::new(2)),
        };
        assert!(!promotion.exceeds_capacity());
    }
}
