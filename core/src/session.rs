//! Request-scoped roster context for an event's management view.
//!
//! A [`RosterSession`] holds the event being managed and the participant list
//! last fetched for it. The list is a read-through cache: every successful
//! mutation made through the session re-fetches it whole instead of patching
//! it in place.

use crate::admission::{AdmissionController, Promotion, Registration};
use crate::error::AdmissionError;
use crate::types::{
    Event, EventId, Participant, ParticipantId, RosterStats, Suggestion, SuggestionField,
};

/// The management view of one event
#[derive(Clone, Debug)]
pub struct RosterSession {
    event: Event,
    participants: Vec<Participant>,
    last_error: Option<AdmissionError>,
}

impl RosterSession {
    /// Open a session for an event and fetch its participants.
    ///
    /// A failed participant listing does not fail the session: it opens with
    /// an empty list and the failure is kept in [`RosterSession::last_error`].
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::EventNotFound`]: no such event
    /// - [`AdmissionError::StoreUnavailable`]: the event read failed
    pub async fn open(
        controller: &AdmissionController,
        event_id: EventId,
    ) -> Result<Self, AdmissionError> {
        let event = controller.load_event(event_id).await?;
        let mut session = Self {
            event,
            participants: Vec::new(),
            last_error: None,
        };
        session.refresh(controller).await;
        Ok(session)
    }

    /// Re-fetch the participant list.
    ///
    /// On failure the list is emptied and the error is recorded.
    pub async fn refresh(&mut self, controller: &AdmissionController) {
        match controller.list_for_event(self.event.id).await {
            Ok(participants) => {
                self.participants = participants;
                self.last_error = None;
            }
            Err(error) => {
                tracing::warn!(event_id = %self.event.id, %error, "Roster listing failed");
                self.participants.clear();
                self.last_error = Some(error);
            }
        }
    }

    /// The event being managed
    #[must_use]
    pub const fn event(&self) -> &Event {
        &self.event
    }

    /// Participants as last fetched, most recent first
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// The error from the last listing, if it failed
    #[must_use]
    pub const fn last_error(&self) -> Option<&AdmissionError> {
        self.last_error.as_ref()
    }

    /// Statistics over the cached list
    #[must_use]
    pub fn stats(&self) -> RosterStats {
        RosterStats::from_participants(self.event.capacity, &self.participants)
    }

    /// Confirmed participants, most recent first
    pub fn confirmed(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_confirmed())
    }

    /// Waitlisted participants in FIFO order, oldest registration first.
    ///
    /// Registrations with the same timestamp keep the store's listing order,
    /// reversed, so the store's own tie-break decides who is first.
    #[must_use]
    pub fn waitlist(&self) -> Vec<&Participant> {
        let mut waitlist: Vec<&Participant> = self
            .participants
            .iter()
            .rev()
            .filter(|p| p.is_waitlisted())
            .collect();
        waitlist.sort_by_key(|p| p.created_at);
        waitlist
    }

    /// Filter the cached list by name or email.
    ///
    /// Case-insensitive substring match; a blank query matches everyone.
    /// List order is preserved.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Participant> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.participants.iter().collect();
        }

        self.participants
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle) || p.email.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Suggest past registrants for the add-participant form.
    ///
    /// Looks across every event, not only the cached roster.
    ///
    /// # Errors
    ///
    /// Same as [`AdmissionController::suggest`].
    pub async fn suggest(
        &self,
        controller: &AdmissionController,
        field: SuggestionField,
        query: &str,
    ) -> Result<Vec<Suggestion>, AdmissionError> {
        controller.suggest(field, query).await
    }

    /// Register through the public path, then refresh.
    ///
    /// # Errors
    ///
    /// Same as [`AdmissionController::register`]. The list is not refreshed on error.
    pub async fn register(
        &mut self,
        controller: &AdmissionController,
        name: &str,
        email: &str,
    ) -> Result<Registration, AdmissionError> {
        let registration = controller.register(self.event.id, name, email).await?;
        self.refresh(controller).await;
        Ok(registration)
    }

    /// Add a participant as the event's manager, then refresh.
    ///
    /// # Errors
    ///
    /// Same as [`AdmissionController::add_participant`].
    pub async fn add_participant(
        &mut self,
        controller: &AdmissionController,
        name: &str,
        email: &str,
    ) -> Result<Registration, AdmissionError> {
        let registration = controller
            .add_participant(self.event.id, name, email)
            .await?;
        self.refresh(controller).await;
        Ok(registration)
    }

    /// Set attendance, then refresh.
    ///
    /// # Errors
    ///
    /// Same as [`AdmissionController::toggle_attendance`].
    pub async fn toggle_attendance(
        &mut self,
        controller: &AdmissionController,
        participant_id: ParticipantId,
        attended: bool,
    ) -> Result<(), AdmissionError> {
        controller
            .toggle_attendance(participant_id, attended)
            .await?;
        self.refresh(controller).await;
        Ok(())
    }

    /// Promote a waitlisted participant, then refresh.
    ///
    /// # Errors
    ///
    /// Same as [`AdmissionController::promote`].
    pub async fn promote(
        &mut self,
        controller: &AdmissionController,
        participant_id: ParticipantId,
    ) -> Result<Promotion, AdmissionError> {
        let promotion = controller.promote(participant_id).await?;
        self.refresh(controller).await;
        Ok(promotion)
    }

    /// Promote the participant at the head of the waitlist, if any.
    ///
    /// # Errors
    ///
    /// Same as [`AdmissionController::promote`].
    pub async fn promote_next(
        &mut self,
        controller: &AdmissionController,
    ) -> Result<Option<Promotion>, AdmissionError> {
        let Some(next) = self.waitlist().first().map(|p| p.id) else {
            return Ok(None);
        };
        self.promote(controller, next).await.map(Some)
    }
}
