//! Admission controller tests against in-memory stores.
//!
//! Covers registration ordering, duplicate detection, closed events, manual
//! promotion, attendance rules, registrant suggestions and store failures.
//!
//! Run with: `cargo test -p event-roster-core --test admission_tests`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use event_roster_core::admission::{AdmissionController, AdmissionEnvironment, SUGGESTION_LIMIT};
use event_roster_core::error::{AdmissionError, Operation};
use event_roster_core::store::{ParticipantStore, StoreError, StoreFuture};
use event_roster_core::types::{
    AdmissionCandidate, AdmissionStatus, Capacity, EventId, EventStatus, NewParticipant,
    Participant, ParticipantId, Suggestion, SuggestionField,
};
use event_roster_testing::helpers::{active_event, event_with_status};
use event_roster_testing::{
    InMemoryEventStore, InMemoryParticipantStore, RosterHarness, init_tracing, test_clock,
};
use std::sync::Arc;

/// Participant store whose event disappears between the event read and admission
struct EventDeletedBeforeAdmit(InMemoryParticipantStore);

impl ParticipantStore for EventDeletedBeforeAdmit {
    fn count(&self, event_id: EventId, status: Option<AdmissionStatus>) -> StoreFuture<'_, u32> {
        self.0.count(event_id, status)
    }

    fn list_by_event(&self, event_id: EventId) -> StoreFuture<'_, Vec<Participant>> {
        self.0.list_by_event(event_id)
    }

    fn find_by_event_and_email<'a>(
        &'a self,
        event_id: EventId,
        email: &'a str,
    ) -> StoreFuture<'a, Option<Participant>> {
        self.0.find_by_event_and_email(event_id, email)
    }

    fn find_by_id(&self, id: ParticipantId) -> StoreFuture<'_, Option<Participant>> {
        self.0.find_by_id(id)
    }

    fn insert(&self, participant: NewParticipant) -> StoreFuture<'_, Participant> {
        self.0.insert(participant)
    }

    fn update_status(&self, id: ParticipantId, status: AdmissionStatus) -> StoreFuture<'_, ()> {
        self.0.update_status(id, status)
    }

    fn update_attendance(&self, id: ParticipantId, attended: bool) -> StoreFuture<'_, ()> {
        self.0.update_attendance(id, attended)
    }

    fn suggest<'a>(
        &'a self,
        field: SuggestionField,
        query: &'a str,
        limit: u32,
    ) -> StoreFuture<'a, Vec<Suggestion>> {
        self.0.suggest(field, query, limit)
    }

    fn admit(
        &self,
        candidate: AdmissionCandidate,
        _capacity: Capacity,
    ) -> StoreFuture<'_, Participant> {
        Box::pin(async move { Err(StoreError::NotFound(format!("event {}", candidate.event_id))) })
    }
}

#[tokio::test]
async fn first_registrations_fill_capacity_then_waitlist() {
    init_tracing();
    let harness = RosterHarness::with_capacity(2);

    let statuses = harness
        .register_all(&["Ana", "Bruno", "Carla", "Diego"])
        .await
        .expect("registrations should succeed");

    assert_eq!(
        statuses,
        vec![
            AdmissionStatus::Confirmed,
            AdmissionStatus::Confirmed,
            AdmissionStatus::Waitlisted,
            AdmissionStatus::Waitlisted,
        ]
    );
    assert_eq!(harness.participants.len(), 4);
}

#[tokio::test]
async fn promotion_can_exceed_capacity() {
    let harness = RosterHarness::with_capacity(2);

    harness.register("Ana").await.unwrap();
    harness.register("Bruno").await.unwrap();
    let carla = harness.register("Carla").await.unwrap();
    assert_eq!(carla.status, AdmissionStatus::Waitlisted);

    let promotion = harness
        .controller
        .promote(carla.participant.id)
        .await
        .expect("promotion should succeed");

    assert_eq!(promotion.confirmed_count, Some(3));
    assert!(promotion.exceeds_capacity());

    let stats = harness.controller.stats(harness.event.id).await.unwrap();
    assert_eq!(stats.confirmed, 3);
    assert_eq!(stats.waitlisted, 0);
    assert_eq!(stats.over_capacity(), 1);
}

#[tokio::test]
async fn promotion_changes_only_the_promoted_participant() {
    let harness = RosterHarness::with_capacity(1);

    harness
        .register_all(&["Ana", "Bruno", "Carla"])
        .await
        .unwrap();
    let before = harness.participants.snapshot();
    let bruno = before.iter().find(|p| p.name == "Bruno").unwrap().id;

    harness.controller.promote(bruno).await.unwrap();

    let after = harness.participants.snapshot();
    for (old, new) in before.iter().zip(after.iter()) {
        if old.id == bruno {
            assert_eq!(new.status, AdmissionStatus::Confirmed);
        } else {
            assert_eq!(old, new);
        }
    }
}

#[tokio::test]
async fn promoting_a_confirmed_participant_is_rejected() {
    let harness = RosterHarness::with_capacity(1);
    let ana = harness.register("Ana").await.unwrap();

    let result = harness.controller.promote(ana.participant.id).await;

    assert!(matches!(
        result,
        Err(AdmissionError::InvalidState {
            status: AdmissionStatus::Confirmed,
            operation: Operation::Promote,
            ..
        })
    ));
}

#[tokio::test]
async fn promoting_unknown_participant_is_not_found() {
    let harness = RosterHarness::with_capacity(1);
    let missing = ParticipantId::new();

    let result = harness.controller.promote(missing).await;

    assert_eq!(result, Err(AdmissionError::ParticipantNotFound(missing)));
}

#[tokio::test]
async fn duplicate_registration_is_rejected_without_new_row() {
    let harness = RosterHarness::with_capacity(5);
    harness.register("Ana").await.unwrap();

    let result = harness
        .controller
        .register(harness.event.id, "Ana Again", "ana@example.com")
        .await;

    assert_eq!(
        result,
        Err(AdmissionError::DuplicateRegistration {
            email: "ana@example.com".to_string(),
            existing_status: Some(AdmissionStatus::Confirmed),
        })
    );
    assert_eq!(harness.participants.len(), 1);
}

#[tokio::test]
async fn duplicate_reports_waitlisted_status() {
    let harness = RosterHarness::with_capacity(1);
    harness.register_all(&["Ana", "Bruno"]).await.unwrap();

    let result = harness
        .controller
        .register(harness.event.id, "Bruno", "bruno@example.com")
        .await;

    assert!(matches!(
        result,
        Err(AdmissionError::DuplicateRegistration {
            existing_status: Some(AdmissionStatus::Waitlisted),
            ..
        })
    ));
}

#[tokio::test]
async fn email_match_is_case_sensitive_and_trimmed() {
    let harness = RosterHarness::with_capacity(5);
    let event_id = harness.event.id;

    let first = harness
        .controller
        .register(event_id, "  Ana  ", "  ana@example.com ")
        .await
        .unwrap();
    assert_eq!(first.participant.name, "Ana");
    assert_eq!(first.participant.email, "ana@example.com");

    // Trimmed duplicate is caught
    let trimmed = harness
        .controller
        .register(event_id, "Ana", "ana@example.com   ")
        .await;
    assert!(matches!(
        trimmed,
        Err(AdmissionError::DuplicateRegistration { .. })
    ));

    // Different case is a different registrant
    let upper = harness
        .controller
        .register(event_id, "Ana", "ANA@example.com")
        .await;
    assert!(upper.is_ok());
    assert_eq!(harness.participants.len(), 2);
}

#[tokio::test]
async fn blank_fields_fail_validation() {
    let harness = RosterHarness::with_capacity(5);
    let event_id = harness.event.id;

    let blank_name = harness
        .controller
        .register(event_id, "   ", "ana@example.com")
        .await;
    let blank_email = harness.controller.register(event_id, "Ana", "\t").await;

    assert!(matches!(blank_name, Err(AdmissionError::Validation(_))));
    assert!(matches!(blank_email, Err(AdmissionError::Validation(_))));
    assert!(harness.participants.is_empty());
}

#[tokio::test]
async fn closed_events_reject_registration() {
    for status in [EventStatus::Finished, EventStatus::Cancelled] {
        let harness = RosterHarness::with_event(event_with_status(1, status));

        let result = harness.register("Diego").await;

        assert_eq!(
            result,
            Err(AdmissionError::EventClosed {
                event_id: harness.event.id,
                status,
            })
        );
        assert!(harness.participants.is_empty());
        let message = result.unwrap_err().to_string();
        assert!(message.contains(status.label()));
    }
}

#[tokio::test]
async fn closed_event_checked_before_field_validation() {
    let harness = RosterHarness::with_event(event_with_status(1, EventStatus::Cancelled));

    let result = harness.controller.register(harness.event.id, "", "").await;

    assert!(matches!(result, Err(AdmissionError::EventClosed { .. })));
}

#[tokio::test]
async fn unknown_event_is_not_found() {
    let harness = RosterHarness::with_capacity(1);
    let missing = EventId::new();

    let result = harness
        .controller
        .register(missing, "Ana", "ana@example.com")
        .await;

    assert_eq!(result, Err(AdmissionError::EventNotFound(missing)));
    assert!(result.unwrap_err().is_not_found());
}

#[tokio::test]
async fn event_closed_after_registrations_stops_new_ones() {
    let harness = RosterHarness::with_capacity(3);
    harness.register("Ana").await.unwrap();

    harness
        .events
        .set_status(harness.event.id, EventStatus::Finished);

    let result = harness.register("Bruno").await;
    assert!(matches!(result, Err(AdmissionError::EventClosed { .. })));
    assert_eq!(harness.participants.len(), 1);
}

#[tokio::test]
async fn manager_add_follows_the_same_rules() {
    let harness = RosterHarness::with_capacity(1);
    harness.register("Ana").await.unwrap();

    let added = harness
        .controller
        .add_participant(harness.event.id, "Bruno", "bruno@example.com")
        .await
        .unwrap();
    assert!(added.is_waitlisted());

    let duplicate = harness
        .controller
        .add_participant(harness.event.id, "Ana", "ana@example.com")
        .await;
    assert!(matches!(
        duplicate,
        Err(AdmissionError::DuplicateRegistration { .. })
    ));
}

#[tokio::test]
async fn attendance_toggles_for_confirmed() {
    let harness = RosterHarness::with_capacity(1);
    let ana = harness.register("Ana").await.unwrap();

    harness
        .controller
        .toggle_attendance(ana.participant.id, true)
        .await
        .unwrap();
    let stored = harness.participants.snapshot();
    assert!(stored[0].attended);

    harness
        .controller
        .toggle_attendance(ana.participant.id, false)
        .await
        .unwrap();
    let stored = harness.participants.snapshot();
    assert!(!stored[0].attended);
}

#[tokio::test]
async fn attendance_rejected_for_waitlisted() {
    let harness = RosterHarness::with_capacity(1);
    harness.register("Ana").await.unwrap();
    let bruno = harness.register("Bruno").await.unwrap();

    let result = harness
        .controller
        .toggle_attendance(bruno.participant.id, true)
        .await;

    assert_eq!(
        result,
        Err(AdmissionError::InvalidState {
            participant_id: bruno.participant.id,
            status: AdmissionStatus::Waitlisted,
            operation: Operation::ToggleAttendance,
        })
    );
    let stored = harness
        .participants
        .find_by_id(bruno.participant.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.attended);
}

#[tokio::test]
async fn listing_is_most_recent_first_and_fresh() {
    let harness = RosterHarness::with_capacity(1);
    harness
        .register_all(&["Ana", "Bruno", "Carla"])
        .await
        .unwrap();

    let listed = harness
        .controller
        .list_for_event(harness.event.id)
        .await
        .unwrap();
    let names: Vec<&str> = listed.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Carla", "Bruno", "Ana"]);

    harness.register("Diego").await.unwrap();
    let listed_again = harness
        .controller
        .list_for_event(harness.event.id)
        .await
        .unwrap();
    assert_eq!(listed_again.len(), 4);
    assert_eq!(listed_again[0].name, "Diego");
}

#[tokio::test]
async fn failed_count_aborts_without_insert() {
    let harness = RosterHarness::with_capacity(2);
    harness.participants.fail_reads(true);

    let result = harness.register("Ana").await;

    assert!(matches!(result, Err(AdmissionError::StoreUnavailable(_))));
    harness.participants.fail_reads(false);
    assert!(harness.participants.is_empty());
}

#[tokio::test]
async fn failed_insert_reports_store_unavailable() {
    let harness = RosterHarness::with_capacity(2);
    harness.participants.fail_writes(true);

    let result = harness.register("Ana").await;

    assert!(matches!(result, Err(AdmissionError::StoreUnavailable(_))));
    assert!(harness.participants.is_empty());
}

#[tokio::test]
async fn failed_promotion_write_leaves_status() {
    let harness = RosterHarness::with_capacity(1);
    harness.register("Ana").await.unwrap();
    let bruno = harness.register("Bruno").await.unwrap();

    harness.participants.fail_writes(true);
    let result = harness.controller.promote(bruno.participant.id).await;

    assert!(matches!(result, Err(AdmissionError::StoreUnavailable(_))));
    let stored = harness
        .participants
        .find_by_id(bruno.participant.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, AdmissionStatus::Waitlisted);
}

#[tokio::test]
async fn unserialized_store_can_overbook_concurrent_registrations() {
    let participants = InMemoryParticipantStore::new();
    participants.yield_after_count(true);
    let harness = RosterHarness::with_stores(
        event_roster_testing::helpers::active_event(1),
        participants,
    );
    let event_id = harness.event.id;

    let (first, second) = tokio::join!(
        harness.controller.register(event_id, "Ana", "ana@example.com"),
        harness.controller.register(event_id, "Bruno", "bruno@example.com"),
    );

    // Both read a confirmed count of zero before either inserted
    assert_eq!(first.unwrap().status, AdmissionStatus::Confirmed);
    assert_eq!(second.unwrap().status, AdmissionStatus::Confirmed);
}

#[tokio::test]
async fn serialized_store_keeps_capacity_under_concurrency() {
    let participants = InMemoryParticipantStore::serialized();
    participants.yield_after_count(true);
    let harness = RosterHarness::with_stores(
        event_roster_testing::helpers::active_event(1),
        participants,
    );
    let event_id = harness.event.id;

    let (first, second) = tokio::join!(
        harness.controller.register(event_id, "Ana", "ana@example.com"),
        harness.controller.register(event_id, "Bruno", "bruno@example.com"),
    );

    let mut statuses = vec![first.unwrap().status, second.unwrap().status];
    statuses.sort_by_key(|s| *s == AdmissionStatus::Waitlisted);
    assert_eq!(
        statuses,
        vec![AdmissionStatus::Confirmed, AdmissionStatus::Waitlisted]
    );
}

#[tokio::test]
async fn concurrent_duplicate_loses_on_unique_constraint() {
    let participants = InMemoryParticipantStore::new();
    participants.yield_after_count(true);
    let harness = RosterHarness::with_stores(
        event_roster_testing::helpers::active_event(5),
        participants,
    );
    let event_id = harness.event.id;

    let (first, second) = tokio::join!(
        harness.controller.register(event_id, "Ana", "ana@example.com"),
        harness.controller.register(event_id, "Ana", "ana@example.com"),
    );

    let (winner, loser) = if first.is_ok() {
        (first, second)
    } else {
        (second, first)
    };
    assert!(winner.is_ok());
    assert_eq!(
        loser,
        Err(AdmissionError::DuplicateRegistration {
            email: "ana@example.com".to_string(),
            existing_status: None,
        })
    );
    assert_eq!(harness.participants.len(), 1);
}

#[tokio::test]
async fn event_deleted_during_admission_is_not_found() {
    let event = active_event(3);
    let events = InMemoryEventStore::new();
    events.insert_event(event.clone());
    let participants = InMemoryParticipantStore::new();
    let controller = AdmissionController::new(AdmissionEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(events),
        Arc::new(EventDeletedBeforeAdmit(participants.clone())),
    ));

    let result = controller.register(event.id, "Ana", "ana@example.com").await;

    assert_eq!(result, Err(AdmissionError::EventNotFound(event.id)));
    assert_eq!(result.unwrap_err().reason(), "not_found");
    assert!(participants.is_empty());
}

#[tokio::test]
async fn suggestions_need_two_characters() {
    let harness = RosterHarness::with_capacity(3);
    harness.register("Ana").await.unwrap();

    // Short queries never reach the store
    harness.participants.fail_reads(true);
    for query in ["", "a", "  a  "] {
        let suggestions = harness
            .controller
            .suggest(SuggestionField::Name, query)
            .await
            .unwrap();
        assert!(suggestions.is_empty(), "query {query:?} should not suggest");
    }
    harness.participants.fail_reads(false);

    let suggestions = harness
        .controller
        .suggest(SuggestionField::Name, " an ")
        .await
        .unwrap();
    assert_eq!(
        suggestions,
        vec![Suggestion {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
        }]
    );
}

#[tokio::test]
async fn suggestions_are_limited_to_most_recent() {
    let harness = RosterHarness::with_capacity(3);
    harness
        .register_all(&["Guest1", "Guest2", "Guest3", "Guest4", "Guest5", "Guest6", "Guest7"])
        .await
        .unwrap();

    let suggestions = harness
        .controller
        .suggest(SuggestionField::Email, "GUEST")
        .await
        .unwrap();

    assert_eq!(suggestions.len(), SUGGESTION_LIMIT as usize);
    let names: Vec<&str> = suggestions.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Guest7", "Guest6", "Guest5", "Guest4", "Guest3"]);
}

#[tokio::test]
async fn suggestions_drop_repeated_emails() {
    let harness = RosterHarness::with_capacity(3);
    let other = RosterHarness::with_stores(active_event(3), harness.participants.clone());
    harness.register("Ana").await.unwrap();
    other.register("Ana").await.unwrap();
    other.register("Anabel").await.unwrap();

    let suggestions = harness
        .controller
        .suggest(SuggestionField::Name, "ana")
        .await
        .unwrap();

    let emails: Vec<&str> = suggestions.iter().map(|s| s.email.as_str()).collect();
    assert_eq!(emails, vec!["anabel@example.com", "ana@example.com"]);
}

#[tokio::test]
async fn failed_suggestion_lookup_reports_store_unavailable() {
    let harness = RosterHarness::with_capacity(3);
    harness.participants.fail_reads(true);

    let result = harness.controller.suggest(SuggestionField::Email, "ana").await;

    assert!(matches!(result, Err(AdmissionError::StoreUnavailable(_))));
}
