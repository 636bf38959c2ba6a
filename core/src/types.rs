//! Domain types for event registration and admission.
//!
//! This module contains the identifiers, value objects and records shared by the
//! admission controller and every store backend. Stored representations are
//! decoded here exactly once, so the rest of the crate only ever sees typed
//! statuses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a participant row
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    /// Creates a new random `ParticipantId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ParticipantId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Maximum number of confirmed participants an event accepts
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capacity(u32);

impl Capacity {
    /// Creates a new `Capacity` without validation.
    ///
    /// Use [`Capacity::try_new`] for values coming from user input or storage.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Creates a `Capacity`, rejecting zero.
    #[must_use]
    pub const fn try_new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    /// Returns the capacity value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Whether `confirmed` participants leave at least one seat open.
    #[must_use]
    pub const fn has_room_for(&self, confirmed: u32) -> bool {
        confirmed < self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// Registrations are open
    Active,
    /// Event has taken place
    Finished,
    /// Event was cancelled
    Cancelled,
}

impl EventStatus {
    /// Only active events accept new registrations.
    #[must_use]
    pub const fn accepts_registrations(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Human-readable label, as shown to registrants.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        }
    }

    /// Stored form used by the relational backend.
    #[must_use]
    pub const fn as_stored(&self) -> &'static str {
        match self {
            Self::Active => "Activo",
            Self::Finished => "Finalizado",
            Self::Cancelled => "Cancelado",
        }
    }

    /// Parse a stored status value.
    ///
    /// Accepts the stored Spanish forms and the English labels, ignoring case.
    /// Returns `None` for anything else.
    #[must_use]
    pub fn from_stored(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "activo" | "active" => Some(Self::Active),
            "finalizado" | "finished" => Some(Self::Finished),
            "cancelado" | "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of admission for a single participant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdmissionStatus {
    /// Holds a seat within capacity
    Confirmed,
    /// Registered after capacity was reached
    Waitlisted,
}

impl AdmissionStatus {
    /// Decide the status of a new participant from a fresh confirmed count.
    #[must_use]
    pub const fn for_new_participant(confirmed: u32, capacity: Capacity) -> Self {
        if capacity.has_room_for(confirmed) {
            Self::Confirmed
        } else {
            Self::Waitlisted
        }
    }

    /// Stored form used by the relational backend.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmado",
            Self::Waitlisted => "lista_espera",
        }
    }

    /// Decode a stored, possibly absent status column.
    ///
    /// Rows written before waitlisting existed carry no status and were all
    /// admitted, so an absent value decodes as `Confirmed`. Unknown values
    /// decode as `None`.
    #[must_use]
    pub fn from_stored(value: Option<&str>) -> Option<Self> {
        let Some(value) = value else {
            return Some(Self::Confirmed);
        };

        let value = value.trim().to_lowercase();
        [Self::Confirmed, Self::Waitlisted]
            .into_iter()
            .find(|status| status.stored_aliases().contains(&value.as_str()))
    }

    /// Trimmed, lowercased stored values that decode to this status.
    ///
    /// Backends that filter on status server-side match against these, with
    /// an absent value treated as `""`.
    #[must_use]
    pub const fn stored_aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Confirmed => &["", "confirmado", "confirmed"],
            Self::Waitlisted => &["espera", "lista_espera", "waitlisted"],
        }
    }
}

impl fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => f.write_str("confirmed"),
            Self::Waitlisted => f.write_str("waitlisted"),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// An event accepting registrations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// Display title
    pub title: String,
    /// Maximum confirmed participants
    pub capacity: Capacity,
    /// Lifecycle status
    pub status: EventStatus,
    /// Creator of the event, if recorded
    pub created_by: Option<String>,
}

impl Event {
    /// Creates a new active `Event`
    #[must_use]
    pub fn new(title: impl Into<String>, capacity: Capacity) -> Self {
        Self {
            id: EventId::new(),
            title: title.into(),
            capacity,
            status: EventStatus::Active,
            created_by: None,
        }
    }

    /// Returns the event with the given status
    #[must_use]
    pub const fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }
}

/// A registered participant of one event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant ID
    pub id: ParticipantId,
    /// Owning event
    pub event_id: EventId,
    /// Display name
    pub name: String,
    /// Email, unique within the event
    pub email: String,
    /// Admission status
    pub status: AdmissionStatus,
    /// Whether the participant attended (confirmed participants only)
    pub attended: bool,
    /// Registration time, used for FIFO ordering
    pub created_at: DateTime<Utc>,
}

impl Participant {
    /// Whether this participant holds a confirmed seat
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status == AdmissionStatus::Confirmed
    }

    /// Whether this participant is on the waitlist
    #[must_use]
    pub fn is_waitlisted(&self) -> bool {
        self.status == AdmissionStatus::Waitlisted
    }
}

/// A participant row about to be inserted. The store assigns the ID.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParticipant {
    /// Owning event
    pub event_id: EventId,
    /// Display name (trimmed)
    pub name: String,
    /// Email (trimmed, case preserved)
    pub email: String,
    /// Computed admission status
    pub status: AdmissionStatus,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

/// A validated registration whose admission status is not decided yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionCandidate {
    /// Event being registered for
    pub event_id: EventId,
    /// Display name (trimmed)
    pub name: String,
    /// Email (trimmed, case preserved)
    pub email: String,
    /// Registration time
    pub requested_at: DateTime<Utc>,
}

impl AdmissionCandidate {
    /// Turn the candidate into an insertable row with the decided status.
    #[must_use]
    pub fn into_new_participant(self, status: AdmissionStatus) -> NewParticipant {
        NewParticipant {
            event_id: self.event_id,
            name: self.name,
            email: self.email,
            status,
            created_at: self.requested_at,
        }
    }
}

// ============================================================================
// Suggestions
// ============================================================================

/// Form field a registrant suggestion is matched against
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuggestionField {
    /// Display name
    Name,
    /// Email
    Email,
}

impl SuggestionField {
    /// Whether `participant`'s value for this field contains `needle`.
    ///
    /// `needle` must already be lowercased.
    #[must_use]
    pub fn matches(&self, participant: &Participant, needle: &str) -> bool {
        let value = match self {
            Self::Name => &participant.name,
            Self::Email => &participant.email,
        };
        value.to_lowercase().contains(needle)
    }
}

/// A past registrant offered to prefill the manager's add-participant form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Display name as registered
    pub name: String,
    /// Email as registered
    pub email: String,
}

impl From<&Participant> for Suggestion {
    fn from(participant: &Participant) -> Self {
        Self {
            name: participant.name.clone(),
            email: participant.email.clone(),
        }
    }
}

// ============================================================================
// Derived Statistics
// ============================================================================

/// Roster statistics derived from a participant listing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterStats {
    /// All participants
    pub total: u32,
    /// Confirmed participants
    pub confirmed: u32,
    /// Waitlisted participants
    pub waitlisted: u32,
    /// Confirmed participants marked as attended
    pub attended: u32,
    /// Event capacity
    pub capacity: u32,
}

impl RosterStats {
    /// Compute statistics by filtering a participant listing by status.
    #[must_use]
    pub fn from_participants(capacity: Capacity, participants: &[Participant]) -> Self {
        let mut stats = Self {
            capacity: capacity.value(),
            ..Self::default()
        };

        for participant in participants {
            stats.total = stats.total.saturating_add(1);
            match participant.status {
                AdmissionStatus::Confirmed => {
                    stats.confirmed = stats.confirmed.saturating_add(1);
                    if participant.attended {
                        stats.attended = stats.attended.saturating_add(1);
                    }
                }
                AdmissionStatus::Waitlisted => {
                    stats.waitlisted = stats.waitlisted.saturating_add(1);
                }
            }
        }

        stats
    }

    /// Capacity-exceeded display state: confirmed count reached capacity.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.confirmed >= self.capacity
    }

    /// Open confirmed seats (zero once full or over capacity)
    #[must_use]
    pub const fn remaining_seats(&self) -> u32 {
        self.capacity.saturating_sub(self.confirmed)
    }

    /// Confirmed participants beyond capacity (after manual promotions)
    #[must_use]
    pub const fn over_capacity(&self) -> u32 {
        self.confirmed.saturating_sub(self.capacity)
    }
}
