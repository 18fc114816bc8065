//! `PostgreSQL` document store for Slotbook.
//!
//! Implements every persistence trait of `slotbook-core` on top of sqlx:
//!
//! - booking buckets as JSONB documents keyed by `(service, pax, year-month)`
//! - atomic per-slot appends via `INSERT … ON CONFLICT DO UPDATE` with a JSONB
//!   path append, so concurrent bookings into one bucket never lose entries
//! - [`BookingLedger`](slotbook_core::store::BookingLedger) and
//!   [`ReviewStore`](slotbook_core::store::ReviewStore) commits in a single
//!   transaction
//! - a notification outbox and a dead-letter table
//!
//! # Example
//!
//! ```ignore
//! use slotbook_postgres::PostgresStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresStore::connect("postgres://localhost/slotbook", 10).await?;
//!     store.run_migrations().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookings;
mod catalog;
pub mod dead_letter_queue;
mod inquiries;
mod ledger;
pub mod migrations;
mod outbox;
mod reviews;

pub use dead_letter_queue::{DLQStatus, DeadLetterQueue, FailedMessage};

use slotbook_core::store::StoreError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// `PostgreSQL` implementation of the Slotbook stores.
///
/// Cheap to clone; all clones share the pool.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if a statement fails.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        migrations::run_migrations(&self.pool).await
    }

    /// Check connectivity with a trivial query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the query fails.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

pub(crate) fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}

pub(crate) fn json_error(e: serde_json::Error) -> StoreError {
    StoreError::SerializationError(e.to_string())
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
