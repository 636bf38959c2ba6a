//! `PostgreSQL` stores for event roster admission.
//!
//! This crate implements the `EventStore` and `ParticipantStore` capabilities
//! from `event-roster-core` on top of sqlx:
//!
//! - Participant rows keyed by a unique `(evento_id, correo)` constraint
//! - Admission serialized per event with a row lock on the event
//! - Connection pooling configured from the environment
//! - Embedded schema migrations
//!
//! # Example
//!
//! ```ignore
//! use event_roster_core::admission::{AdmissionController, AdmissionEnvironment};
//! use event_roster_core::environment::SystemClock;
//! use event_roster_postgres::{PostgresConfig, PostgresEventStore, PostgresParticipantStore};
//! use std::sync::Arc;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PostgresConfig::from_env().connect().await?;
//!     event_roster_postgres::run_migrations(&pool).await?;
//!
//!     let controller = AdmissionController::new(AdmissionEnvironment::new(
//!         Arc::new(SystemClock),
//!         Arc::new(PostgresEventStore::from_pool(pool.clone())),
//!         Arc::new(PostgresParticipantStore::from_pool(pool)),
//!     ));
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod stores;

pub use config::PostgresConfig;
pub use stores::{PostgresEventStore, PostgresParticipantStore};

use event_roster_core::store::StoreError;
use sqlx::PgPool;

/// Apply the embedded schema migrations.
///
/// # Errors
///
/// Returns [`StoreError::Unavailable`] if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Migration failed: {e}")))?;

    tracing::info!("Roster migrations applied");
    Ok(())
}
