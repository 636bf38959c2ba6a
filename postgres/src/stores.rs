//! `PostgreSQL` implementations of the event and participant stores.
//!
//! Rows are read with runtime-checked queries and decoded into domain types at
//! this boundary: event status through [`EventStatus::from_stored`] and
//! participant status through [`AdmissionStatus::from_stored`], so a missing
//! `estatus` column value is read as confirmed here and nowhere else.

use chrono::{DateTime, Utc};
use event_roster_core::store::{EventStore, ParticipantStore, StoreError, StoreFuture};
use event_roster_core::types::{
    AdmissionCandidate, AdmissionStatus, Capacity, Event, EventId, EventStatus, NewParticipant,
    Participant, ParticipantId, Suggestion, SuggestionField,
};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Raw `eventos` row
type EventRow = (Uuid, String, i32, String, Option<String>);

/// Raw `participantes` row
type ParticipantRow = (Uuid, Uuid, String, String, Option<String>, bool, DateTime<Utc>);

const PARTICIPANT_COLUMNS: &str =
    "id, evento_id, nombre, correo, estatus, asistio, created_at";

fn unavailable(context: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::Unavailable(format!("{context}: {e}"))
}

fn decode_event(row: EventRow) -> Result<Event, StoreError> {
    let (id, title, capacity, status, created_by) = row;

    let capacity = u32::try_from(capacity)
        .ok()
        .and_then(Capacity::try_new)
        .ok_or_else(|| StoreError::Decode(format!("Invalid capacity {capacity} for event {id}")))?;
    let status = EventStatus::from_stored(&status)
        .ok_or_else(|| StoreError::Decode(format!("Invalid status '{status}' for event {id}")))?;

    Ok(Event {
        id: EventId::from_uuid(id),
        title,
        capacity,
        status,
        created_by,
    })
}

fn decode_status(id: Uuid, stored: Option<&str>) -> Result<AdmissionStatus, StoreError> {
    AdmissionStatus::from_stored(stored).ok_or_else(|| {
        StoreError::Decode(format!(
            "Invalid status '{}' for participant {id}",
            stored.unwrap_or_default()
        ))
    })
}

fn decode_participant(row: ParticipantRow) -> Result<Participant, StoreError> {
    let (id, event_id, name, email, status, attended, created_at) = row;
    let status = decode_status(id, status.as_deref())?;

    Ok(Participant {
        id: ParticipantId::from_uuid(id),
        event_id: EventId::from_uuid(event_id),
        name,
        email,
        status,
        attended,
        created_at,
    })
}

/// `PostgreSQL`-backed event reads.
#[derive(Clone, Debug)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert an event row.
    ///
    /// Event management lives outside this crate; this exists for seeding and
    /// for tools that share the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the insert fails.
    pub async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO eventos (id, titulo, cupo_maximo, estado, creado_por)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(event.id.as_uuid())
        .bind(&event.title)
        .bind(i32::try_from(event.capacity.value()).unwrap_or(i32::MAX))
        .bind(event.status.as_stored())
        .bind(event.created_by.as_deref())
        .execute(&self.pool)
        .await
        .map_err(unavailable("Failed to insert event"))?;

        Ok(())
    }

    /// Change an event's lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the event does not exist, or
    /// [`StoreError::Unavailable`] if the update fails.
    pub async fn set_status(
        &self,
        event_id: EventId,
        status: EventStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE eventos SET estado = $2 WHERE id = $1")
            .bind(event_id.as_uuid())
            .bind(status.as_stored())
            .execute(&self.pool)
            .await
            .map_err(unavailable("Failed to update event status"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("event {event_id}")));
        }

        tracing::info!(%event_id, status = status.as_stored(), "Event status updated");
        Ok(())
    }
}

impl EventStore for PostgresEventStore {
    fn get_by_id(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            let row: Option<EventRow> = sqlx::query_as(
                "SELECT id, titulo, cupo_maximo, estado, creado_por FROM eventos WHERE id = $1",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable("Failed to query event"))?;

            row.map(decode_event).transpose()
        })
    }
}

/// `PostgreSQL`-backed participant persistence.
///
/// Admission is serialized per event: [`ParticipantStore::admit`] locks the
/// event row for the duration of the count-and-insert transaction, so
/// concurrent registrations for the last seat are decided one after another.
#[derive(Clone, Debug)]
pub struct PostgresParticipantStore {
    pool: PgPool,
}

impl PostgresParticipantStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Participants of an event, optionally only those whose stored status
/// decodes to `status`.
///
/// The filter runs in SQL against [`AdmissionStatus::stored_aliases`], so a
/// row with an unrecognized status is left out of a filtered count instead of
/// failing it.
async fn count_participants<'e>(
    executor: impl PgExecutor<'e>,
    event_id: EventId,
    status: Option<AdmissionStatus>,
) -> Result<u32, StoreError> {
    let (count,) = match status {
        None => {
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM participantes WHERE evento_id = $1")
                .bind(event_id.as_uuid())
                .fetch_one(executor)
                .await
        }
        Some(status) => {
            sqlx::query_as::<_, (i64,)>(
                r"
                SELECT COUNT(*) FROM participantes
                WHERE evento_id = $1
                  AND lower(trim(COALESCE(estatus, ''))) = ANY($2)
                ",
            )
            .bind(event_id.as_uuid())
            .bind(status.stored_aliases())
            .fetch_one(executor)
            .await
        }
    }
    .map_err(unavailable("Failed to count participants"))?;

    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

/// `ILIKE` pattern matching `query` anywhere, with wildcards in it escaped.
fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

const fn suggestion_column(field: SuggestionField) -> &'static str {
    match field {
        SuggestionField::Name => "nombre",
        SuggestionField::Email => "correo",
    }
}

async fn insert_participant<'e>(
    executor: impl PgExecutor<'e>,
    participant: NewParticipant,
) -> Result<Participant, StoreError> {
    let id = ParticipantId::new();

    sqlx::query(
        r"
        INSERT INTO participantes (id, evento_id, nombre, correo, estatus, asistio, created_at)
        VALUES ($1, $2, $3, $4, $5, false, $6)
        ",
    )
    .bind(id.as_uuid())
    .bind(participant.event_id.as_uuid())
    .bind(&participant.name)
    .bind(&participant.email)
    .bind(participant.status.as_str())
    .bind(participant.created_at)
    .execute(executor)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                metrics::counter!("roster.store.unique_violations").increment(1);
                return StoreError::UniqueViolation(format!(
                    "email already registered for event {}",
                    participant.event_id
                ));
            }
        }
        StoreError::Unavailable(format!("Failed to insert participant: {e}"))
    })?;

    Ok(Participant {
        id,
        event_id: participant.event_id,
        name: participant.name,
        email: participant.email,
        status: participant.status,
        attended: false,
        created_at: participant.created_at,
    })
}

impl ParticipantStore for PostgresParticipantStore {
    fn count(&self, event_id: EventId, status: Option<AdmissionStatus>) -> StoreFuture<'_, u32> {
        Box::pin(async move { count_participants(&self.pool, event_id, status).await })
    }

    fn list_by_event(&self, event_id: EventId) -> StoreFuture<'_, Vec<Participant>> {
        Box::pin(async move {
            let rows: Vec<ParticipantRow> = sqlx::query_as(&format!(
                "SELECT {PARTICIPANT_COLUMNS} FROM participantes
                 WHERE evento_id = $1
                 ORDER BY created_at DESC"
            ))
            .bind(event_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable("Failed to list participants"))?;

            rows.into_iter().map(decode_participant).collect()
        })
    }

    fn find_by_event_and_email<'a>(
        &'a self,
        event_id: EventId,
        email: &'a str,
    ) -> StoreFuture<'a, Option<Participant>> {
        Box::pin(async move {
            let row: Option<ParticipantRow> = sqlx::query_as(&format!(
                "SELECT {PARTICIPANT_COLUMNS} FROM participantes
                 WHERE evento_id = $1 AND correo = $2"
            ))
            .bind(event_id.as_uuid())
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable("Failed to query participant by email"))?;

            row.map(decode_participant).transpose()
        })
    }

    fn find_by_id(&self, id: ParticipantId) -> StoreFuture<'_, Option<Participant>> {
        Box::pin(async move {
            let row: Option<ParticipantRow> = sqlx::query_as(&format!(
                "SELECT {PARTICIPANT_COLUMNS} FROM participantes WHERE id = $1"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable("Failed to query participant"))?;

            row.map(decode_participant).transpose()
        })
    }

    fn insert(&self, participant: NewParticipant) -> StoreFuture<'_, Participant> {
        Box::pin(async move { insert_participant(&self.pool, participant).await })
    }

    fn update_status(&self, id: ParticipantId, status: AdmissionStatus) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query("UPDATE participantes SET estatus = $2 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(status.as_str())
                .execute(&self.pool)
                .await
                .map_err(unavailable("Failed to update participant status"))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("participant {id}")));
            }
            Ok(())
        })
    }

    fn update_attendance(&self, id: ParticipantId, attended: bool) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query("UPDATE participantes SET asistio = $2 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(attended)
                .execute(&self.pool)
                .await
                .map_err(unavailable("Failed to update attendance"))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("participant {id}")));
            }
            Ok(())
        })
    }

    fn suggest<'a>(
        &'a self,
        field: SuggestionField,
        query: &'a str,
        limit: u32,
    ) -> StoreFuture<'a, Vec<Suggestion>> {
        Box::pin(async move {
            let column = suggestion_column(field);
            let rows: Vec<(String, String)> = sqlx::query_as(&format!(
                "SELECT nombre, correo FROM participantes
                 WHERE {column} ILIKE $1
                 ORDER BY created_at DESC
                 LIMIT $2"
            ))
            .bind(contains_pattern(query))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable("Failed to look up registrant suggestions"))?;

            Ok(rows
                .into_iter()
                .map(|(name, email)| Suggestion { name, email })
                .collect())
        })
    }

    fn admit(
        &self,
        candidate: AdmissionCandidate,
        capacity: Capacity,
    ) -> StoreFuture<'_, Participant> {
        Box::pin(async move {
            let event_id = candidate.event_id;
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(unavailable("Failed to begin admission transaction"))?;

            // Concurrent admissions for the same event queue on this row lock
            let locked: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM eventos WHERE id = $1 FOR UPDATE")
                    .bind(event_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(unavailable("Failed to lock event"))?;
            if locked.is_none() {
                return Err(StoreError::NotFound(format!("event {event_id}")));
            }

            let confirmed =
                count_participants(&mut *tx, event_id, Some(AdmissionStatus::Confirmed)).await?;
            let status = AdmissionStatus::for_new_participant(confirmed, capacity);

            let participant =
                insert_participant(&mut *tx, candidate.into_new_participant(status)).await?;

            tx.commit()
                .await
                .map_err(unavailable("Failed to commit admission"))?;

            tracing::debug!(%event_id, confirmed, %status, "Admission committed");
            Ok(participant)
        })
    }
}
