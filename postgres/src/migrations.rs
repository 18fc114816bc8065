//! Schema for the `PostgreSQL` document store.
//!
//! Documents live in JSONB columns; the columns next to them are the keys the
//! store filters or locks on.

use slotbook_core::store::StoreError;
use sqlx::PgPool;

/// DDL statements, applied in order. Every statement is idempotent.
pub const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS services (
        id TEXT PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        data JSONB NOT NULL,
        total_score BIGINT NOT NULL DEFAULT 0,
        review_count BIGINT NOT NULL DEFAULT 0
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS inquiries (
        id TEXT PRIMARY KEY,
        service_id TEXT NOT NULL,
        status SMALLINT NOT NULL,
        data JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_inquiries_service ON inquiries(service_id)",
    r"
    CREATE TABLE IF NOT EXISTS service_bookings (
        id TEXT NOT NULL UNIQUE,
        service_id TEXT NOT NULL,
        variant_pax BIGINT NOT NULL,
        year_month TEXT NOT NULL,
        bookings_by_date JSONB NOT NULL DEFAULT '{}'::jsonb,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (service_id, variant_pax, year_month)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS reviews (
        id TEXT PRIMARY KEY,
        service_id TEXT NOT NULL,
        inquiry_id TEXT NOT NULL UNIQUE,
        user_id TEXT NOT NULL,
        content TEXT NOT NULL,
        score SMALLINT NOT NULL CHECK (score BETWEEN 1 AND 5),
        created_at TIMESTAMPTZ NOT NULL
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_reviews_service_score
        ON reviews(service_id, score DESC, created_at DESC)
    ",
    r"
    CREATE TABLE IF NOT EXISTS notification_outbox (
        id BIGSERIAL PRIMARY KEY,
        audience TEXT NOT NULL,
        destination TEXT NOT NULL,
        body TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        sent_at TIMESTAMPTZ
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_outbox_pending
        ON notification_outbox(id) WHERE sent_at IS NULL
    ",
    r"
    CREATE TABLE IF NOT EXISTS failed_messages (
        id BIGSERIAL PRIMARY KEY,
        topic TEXT NOT NULL,
        payload BYTEA NOT NULL,
        error_message TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        first_failed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        resolved_at TIMESTAMPTZ,
        resolution_notes TEXT
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_failed_messages_status
        ON failed_messages(status, first_failed_at)
    ",
];

/// Apply [`SCHEMA`].
///
/// # Errors
///
/// Returns [`StoreError::DatabaseError`] if any statement fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
    }

    tracing::info!(statements = SCHEMA.len(), "Database schema up to date");
    Ok(())
}
