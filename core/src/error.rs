//! Errors returned by admission operations.

use crate::store::StoreError;
use crate::types::{AdmissionStatus, EventId, EventStatus, ParticipantId};
use thiserror::Error;

/// Operation attempted on a participant in the wrong status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Setting the attendance flag
    ToggleAttendance,
    /// Moving a participant off the waitlist
    Promote,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToggleAttendance => f.write_str("toggle attendance"),
            Self::Promote => f.write_str("promote"),
        }
    }
}

/// Errors returned to the caller of an admission operation.
///
/// None of these are retried. Capacity being reached is not an error: it is the
/// waitlisted success path of registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// The event does not exist.
    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// The participant does not exist.
    #[error("Participant {0} not found")]
    ParticipantNotFound(ParticipantId),

    /// The event no longer accepts registrations.
    #[error("Event {event_id} is {status} and no longer accepts registrations")]
    EventClosed {
        /// The event that rejected the registration
        event_id: EventId,
        /// Its current status
        status: EventStatus,
    },

    /// A required field was missing or blank.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The email is already registered for this event.
    #[error(
        "{email} is already registered for this event{}",
        existing_suffix(.existing_status.as_ref())
    )]
    DuplicateRegistration {
        /// The rejected email
        email: String,
        /// Status of the existing registration, when it could be read
        existing_status: Option<AdmissionStatus>,
    },

    /// The participant's status does not allow the operation.
    #[error("Cannot {operation} participant {participant_id} while {status}")]
    InvalidState {
        /// The participant
        participant_id: ParticipantId,
        /// Its current status
        status: AdmissionStatus,
        /// What was attempted
        operation: Operation,
    },

    /// The underlying store call failed.
    #[error(transparent)]
    StoreUnavailable(StoreError),
}

fn existing_suffix(status: Option<&AdmissionStatus>) -> String {
    status.map_or_else(String::new, |status| format!(" ({status})"))
}

impl AdmissionError {
    /// Whether this is one of the not-found errors.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::EventNotFound(_) | Self::ParticipantNotFound(_))
    }

    /// Short machine-readable reason, used as a metrics label.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::EventNotFound(_) | Self::ParticipantNotFound(_) => "not_found",
            Self::EventClosed { .. } => "event_closed",
            Self::Validation(_) => "validation",
            Self::DuplicateRegistration { .. } => "duplicate",
            Self::InvalidState { .. } => "invalid_state",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<StoreError> for AdmissionError {
    fn from(error: StoreError) -> Self {
        Self::StoreUnavailable(error)
    }
}
