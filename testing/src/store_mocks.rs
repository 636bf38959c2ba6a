//! In-memory store testing utilities
//!
//! Provides fast, deterministic stand-ins for the relational store:
//! - [`InMemoryEventStore`]: HashMap-based event reads
//! - [`InMemoryParticipantStore`]: participant rows with `(event, email)`
//!   uniqueness, failure injection and an optional serialized admission mode

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use event_roster_core::store::{EventStore, ParticipantStore, StoreError, StoreFuture};
use event_roster_core::types::{
    AdmissionCandidate, AdmissionStatus, Capacity, Event, EventId, EventStatus, NewParticipant,
    Participant, ParticipantId, Suggestion, SuggestionField,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Failure switches shared by the in-memory stores.
#[derive(Debug, Default)]
struct Faults {
    reads: AtomicBool,
    writes: AtomicBool,
}

impl Faults {
    fn check_read(&self) -> Result<(), StoreError> {
        if self.reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

/// In-memory event store for fast, deterministic testing.
///
/// # Example
///
/// ```
/// use event_roster_testing::InMemoryEventStore;
/// use event_roster_core::store::EventStore;
/// use event_roster_core::types::{Capacity, Event};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryEventStore::new();
/// let event = Event::new("Workshop", Capacity::new(20));
/// store.insert_event(event.clone());
///
/// let loaded = store.get_by_id(event.id).await?;
/// assert_eq!(loaded, Some(event));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<HashMap<EventId, Event>>>,
    faults: Arc<Faults>,
}

impl InMemoryEventStore {
    /// Create a new empty in-memory event store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an event
    pub fn insert_event(&self, event: Event) {
        self.events.write().unwrap().insert(event.id, event);
    }

    /// Change an event's lifecycle status
    ///
    /// Returns `false` if the event does not exist.
    pub fn set_status(&self, event_id: EventId, status: EventStatus) -> bool {
        self.events
            .write()
            .unwrap()
            .get_mut(&event_id)
            .map(|event| event.status = status)
            .is_some()
    }

    /// Make every subsequent read fail with `StoreError::Unavailable`
    pub fn fail_reads(&self, fail: bool) {
        self.faults.reads.store(fail, Ordering::SeqCst);
    }
}

impl EventStore for InMemoryEventStore {
    fn get_by_id(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            self.faults.check_read()?;
            Ok(self.events.read().unwrap().get(&id).cloned())
        })
    }
}

#[derive(Debug, Default)]
struct Rows {
    /// Insertion order doubles as a tie-breaker for equal timestamps
    rows: Vec<Participant>,
}

impl Rows {
    fn position(&self, id: ParticipantId) -> Option<usize> {
        self.rows.iter().position(|p| p.id == id)
    }
}

/// In-memory participant store for fast, deterministic testing.
///
/// Behaves like the relational backend the controller is written against:
/// inserts are rejected with [`StoreError::UniqueViolation`] when the event
/// already has a participant with the same email, and listings are ordered by
/// registration time, most recent first.
///
/// By default admission goes through the provided, unserialized
/// count-then-insert. [`InMemoryParticipantStore::serialized`] builds a store
/// whose admissions for the same store instance run one at a time.
#[derive(Clone, Debug, Default)]
pub struct InMemoryParticipantStore {
    data: Arc<RwLock<Rows>>,
    faults: Arc<Faults>,
    yield_after_count: Arc<AtomicBool>,
    admission_lock: Option<Arc<tokio::sync::Mutex<()>>>,
}

impl InMemoryParticipantStore {
    /// Create a new empty store using unserialized admission
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store that serializes count-then-insert
    #[must_use]
    pub fn serialized() -> Self {
        Self {
            admission_lock: Some(Arc::new(tokio::sync::Mutex::new(()))),
            ..Self::default()
        }
    }

    /// Yield to the scheduler after every count, before returning it.
    ///
    /// Widens the window between reading the confirmed count and inserting,
    /// so concurrent registrations interleave deterministically.
    pub fn yield_after_count(&self, enabled: bool) {
        self.yield_after_count.store(enabled, Ordering::SeqCst);
    }

    /// Make every subsequent read fail with `StoreError::Unavailable`
    pub fn fail_reads(&self, fail: bool) {
        self.faults.reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with `StoreError::Unavailable`
    pub fn fail_writes(&self, fail: bool) {
        self.faults.writes.store(fail, Ordering::SeqCst);
    }

    /// Insert a row as-is, bypassing admission (for seeding tests)
    pub fn seed(&self, participant: Participant) {
        self.data.write().unwrap().rows.push(participant);
    }

    /// All rows in insertion order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Participant> {
        self.data.read().unwrap().rows.clone()
    }

    /// Get the number of stored participants
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap().rows.len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().rows.is_empty()
    }

    /// Participants of one event in insertion order
    #[must_use]
    pub fn rows_for(&self, event_id: EventId) -> Vec<Participant> {
        self.data
            .read()
            .unwrap()
            .rows
            .iter()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect()
    }

    /// Rows matching `keep`, most recent first, insertion order breaking ties
    fn newest_first(&self, keep: impl Fn(&Participant) -> bool) -> Vec<Participant> {
        let data = self.data.read().unwrap();
        let mut rows: Vec<(usize, &Participant)> =
            data.rows.iter().enumerate().filter(|(_, p)| keep(*p)).collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        rows.into_iter().map(|(_, p)| p.clone()).collect()
    }

    fn count_now(&self, event_id: EventId, status: Option<AdmissionStatus>) -> u32 {
        let count = self
            .data
            .read()
            .unwrap()
            .rows
            .iter()
            .filter(|p| p.event_id == event_id && status.is_none_or(|s| p.status == s))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn insert_now(&self, participant: NewParticipant) -> Result<Participant, StoreError> {
        let mut data = self.data.write().unwrap();

        if data
            .rows
            .iter()
            .any(|p| p.event_id == participant.event_id && p.email == participant.email)
        {
            return Err(StoreError::UniqueViolation(format!(
                "participant email already registered for event {}",
                participant.event_id
            )));
        }

        let row = Participant {
            id: ParticipantId::new(),
            event_id: participant.event_id,
            name: participant.name,
            email: participant.email,
            status: participant.status,
            attended: false,
            created_at: participant.created_at,
        };
        data.rows.push(row.clone());
        Ok(row)
    }

    fn update_row(
        &self,
        id: ParticipantId,
        apply: impl FnOnce(&mut Participant),
    ) -> Result<(), StoreError> {
        let mut data = self.data.write().unwrap();
        let index = data
            .position(id)
            .ok_or_else(|| StoreError::NotFound(format!("participant {id}")))?;
        apply(&mut data.rows[index]);
        Ok(())
    }
}

impl ParticipantStore for InMemoryParticipantStore {
    fn count(&self, event_id: EventId, status: Option<AdmissionStatus>) -> StoreFuture<'_, u32> {
        Box::pin(async move {
            self.faults.check_read()?;
            let count = self.count_now(event_id, status);
            if self.yield_after_count.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
            Ok(count)
        })
    }

    fn list_by_event(&self, event_id: EventId) -> StoreFuture<'_, Vec<Participant>> {
        Box::pin(async move {
            self.faults.check_read()?;
            Ok(self.newest_first(|p| p.event_id == event_id))
        })
    }

    fn find_by_event_and_email<'a>(
        &'a self,
        event_id: EventId,
        email: &'a str,
    ) -> StoreFuture<'a, Option<Participant>> {
        Box::pin(async move {
            self.faults.check_read()?;
            Ok(self
                .data
                .read()
                .unwrap()
                .rows
                .iter()
                .find(|p| p.event_id == event_id && p.email == email)
                .cloned())
        })
    }

    fn find_by_id(&self, id: ParticipantId) -> StoreFuture<'_, Option<Participant>> {
        Box::pin(async move {
            self.faults.check_read()?;
            let data = self.data.read().unwrap();
            Ok(data.position(id).map(|index| data.rows[index].clone()))
        })
    }

    fn insert(&self, participant: NewParticipant) -> StoreFuture<'_, Participant> {
        Box::pin(async move {
            self.faults.check_write()?;
            self.insert_now(participant)
        })
    }

    fn update_status(&self, id: ParticipantId, status: AdmissionStatus) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.faults.check_write()?;
            self.update_row(id, |p| p.status = status)
        })
    }

    fn update_attendance(&self, id: ParticipantId, attended: bool) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.faults.check_write()?;
            self.update_row(id, |p| p.attended = attended)
        })
    }

    fn suggest<'a>(
        &'a self,
        field: SuggestionField,
        query: &'a str,
        limit: u32,
    ) -> StoreFuture<'a, Vec<Suggestion>> {
        Box::pin(async move {
            self.faults.check_read()?;
            let needle = query.to_lowercase();
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            Ok(self
                .newest_first(|p| field.matches(p, &needle))
                .iter()
                .take(limit)
                .map(Suggestion::from)
                .collect())
        })
    }

    fn admit(
        &self,
        candidate: AdmissionCandidate,
        capacity: Capacity,
    ) -> StoreFuture<'_, Participant> {
        Box::pin(async move {
            let _guard = match &self.admission_lock {
                Some(lock) => Some(lock.lock().await),
                None => None,
            };
            let confirmed = self
                .count(candidate.event_id, Some(AdmissionStatus::Confirmed))
                .await?;
            let status = AdmissionStatus::for_new_participant(confirmed, capacity);
            self.insert(candidate.into_new_participant(status)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn new_participant(event_id: EventId, email: &str, minute: i64) -> NewParticipant {
        NewParticipant {
            event_id,
            name: "Test".to_string(),
            email: email.to_string(),
            status: AdmissionStatus::Confirmed,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_email_per_event() {
        let store = InMemoryParticipantStore::new();
        let event_id = EventId::new();

        store.insert(new_participant(event_id, "a@x.org", 0)).await.unwrap();
        let result = store.insert(new_participant(event_id, "a@x.org", 1)).await;

        assert!(matches!(result, Err(StoreError::UniqueViolation(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn same_email_allowed_across_events() {
        let store = InMemoryParticipantStore::new();

        store.insert(new_participant(EventId::new(), "a@x.org", 0)).await.unwrap();
        store.insert(new_participant(EventId::new(), "a@x.org", 0)).await.unwrap();

        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn lists_most_recent_first() {
        let store = InMemoryParticipantStore::new();
        let event_id = EventId::new();

        store.insert(new_participant(event_id, "first@x.org", 0)).await.unwrap();
        store.insert(new_participant(event_id, "second@x.org", 5)).await.unwrap();
        store.insert(new_participant(event_id, "third@x.org", 5)).await.unwrap();

        let listed = store.list_by_event(event_id).await.unwrap();
        let emails: Vec<&str> = listed.iter().map(|p| p.email.as_str()).collect();

        assert_eq!(emails, vec!["third@x.org", "second@x.org", "first@x.org"]);
    }

    #[tokio::test]
    async fn suggest_matches_across_events_ignoring_case() {
        let store = InMemoryParticipantStore::new();

        let mut first = new_participant(EventId::new(), "ana.lopez@x.org", 0);
        first.name = "Ana López".to_string();
        store.insert(first).await.unwrap();
        let mut second = new_participant(EventId::new(), "mariana@x.org", 1);
        second.name = "Mariana".to_string();
        store.insert(second).await.unwrap();
        store.insert(new_participant(EventId::new(), "bruno@x.org", 2)).await.unwrap();

        let by_name = store.suggest(SuggestionField::Name, "ANA", 5).await.unwrap();
        let emails: Vec<&str> = by_name.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(emails, vec!["mariana@x.org", "ana.lopez@x.org"]);

        let by_email = store.suggest(SuggestionField::Email, "bruno", 5).await.unwrap();
        assert_eq!(by_email.len(), 1);

        let limited = store.suggest(SuggestionField::Email, "x.org", 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_unavailable() {
        let store = InMemoryParticipantStore::new();
        let event_id = EventId::new();

        store.fail_writes(true);
        let result = store.insert(new_participant(event_id, "a@x.org", 0)).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.is_empty());

        store.fail_reads(true);
        assert!(matches!(
            store.count(event_id, None).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let store = InMemoryParticipantStore::new();
        let result = store
            .update_status(ParticipantId::new(), AdmissionStatus::Confirmed)
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn event_status_can_change() {
        let store = InMemoryEventStore::new();
        let event = Event::new("Talk", Capacity::new(1));
        store.insert_event(event.clone());

        assert!(store.set_status(event.id, EventStatus::Cancelled));
        assert!(!store.set_status(EventId::new(), EventStatus::Cancelled));

        let loaded = store.get_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, EventStatus::Cancelled);
    }
}
