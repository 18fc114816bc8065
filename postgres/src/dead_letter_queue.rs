//! Dead Letter Queue (DLQ) for bus messages that could not be processed.
//!
//! The booking consumer records a message here when it is malformed or when
//! processing fails permanently, then commits its offset so the partition
//! keeps moving. Operators list, resolve or discard entries afterwards.

use crate::{PostgresStore, db_error};
use chrono::{DateTime, Utc};
use slotbook_core::store::{DeadLetterStore, StoreError};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// Status of a failed message in the Dead Letter Queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DLQStatus {
    /// Waiting for investigation or reprocessing
    Pending,
    /// Reprocessed successfully
    Resolved,
    /// Permanently dropped
    Discarded,
}

impl DLQStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Discarded => "discarded",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns error if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "discarded" => Ok(Self::Discarded),
            _ => Err(StoreError::SerializationError(format!("Invalid DLQ status: {s}"))),
        }
    }
}

/// An entry in the Dead Letter Queue.
#[derive(Debug, Clone)]
pub struct FailedMessage {
    /// Unique identifier for this DLQ entry
    pub id: i64,
    /// Topic the message was consumed from
    pub topic: String,
    /// Raw message payload
    pub payload: Vec<u8>,
    /// Error message from the failure
    pub error_message: String,
    /// Current status
    pub status: DLQStatus,
    /// When the message was recorded
    pub first_failed_at: DateTime<Utc>,
    /// When the entry was resolved or discarded
    pub resolved_at: Option<DateTime<Utc>>,
    /// Resolution notes
    pub resolution_notes: Option<String>,
}

/// `PostgreSQL`-based Dead Letter Queue.
///
/// # Example
///
/// ```no_run
/// use slotbook_postgres::DeadLetterQueue;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let dlq = DeadLetterQueue::new(pool);
/// let pending = dlq.list_pending(100).await?;
/// println!("Pending failures: {}", pending.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DeadLetterQueue {
    pool: PgPool,
}

impl DeadLetterQueue {
    /// Create a new Dead Letter Queue with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a failed message. Returns the id of the new entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the insert fails.
    pub async fn add_entry(
        &self,
        topic: &str,
        payload: &[u8],
        error_message: &str,
    ) -> Result<i64, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO failed_messages (topic, payload, error_message)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(topic)
        .bind(payload)
        .bind(error_message)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        tracing::warn!(
            dlq_id = id,
            topic = topic,
            error = error_message,
            "Message added to Dead Letter Queue"
        );

        metrics::counter!("slotbook_dead_letters_total", "topic" => topic.to_string()).increment(1);

        Ok(id)
    }

    /// List pending entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the query fails.
    pub async fn list_pending(&self, limit: usize) -> Result<Vec<FailedMessage>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, topic, payload, error_message, status,
                   first_failed_at, resolved_at, resolution_notes
            FROM failed_messages
            WHERE status = 'pending'
            ORDER BY first_failed_at ASC
            LIMIT $1
            ",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(Self::row_to_failed_message).collect()
    }

    /// Mark an entry as reprocessed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the update fails.
    pub async fn mark_resolved(&self, id: i64, notes: Option<&str>) -> Result<(), StoreError> {
        self.close(id, DLQStatus::Resolved, notes).await?;
        tracing::info!(dlq_id = id, "DLQ entry marked as resolved");
        metrics::counter!("slotbook_dead_letters_resolved_total").increment(1);
        Ok(())
    }

    /// Mark an entry as permanently dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the update fails.
    pub async fn mark_discarded(&self, id: i64, reason: &str) -> Result<(), StoreError> {
        self.close(id, DLQStatus::Discarded, Some(reason)).await?;
        tracing::warn!(dlq_id = id, reason = reason, "DLQ entry marked as discarded");
        metrics::counter!("slotbook_dead_letters_discarded_total").increment(1);
        Ok(())
    }

    /// Number of pending entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the query fails.
    pub async fn count_pending(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM failed_messages WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(count)
    }

    async fn close(
        &self,
        id: i64,
        status: DLQStatus,
        notes: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE failed_messages
            SET status = $1, resolved_at = NOW(), resolution_notes = $2
            WHERE id = $3
            ",
        )
        .bind(status.as_str())
        .bind(notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("DLQ entry {id}")));
        }
        Ok(())
    }

    fn row_to_failed_message(row: &sqlx::postgres::PgRow) -> Result<FailedMessage, StoreError> {
        let status: String = row.try_get("status").map_err(db_error)?;
        Ok(FailedMessage {
            id: row.try_get("id").map_err(db_error)?,
            topic: row.try_get("topic").map_err(db_error)?,
            payload: row.try_get("payload").map_err(db_error)?,
            error_message: row.try_get("error_message").map_err(db_error)?,
            status: DLQStatus::parse(&status)?,
            first_failed_at: row.try_get("first_failed_at").map_err(db_error)?,
            resolved_at: row.try_get("resolved_at").map_err(db_error)?,
            resolution_notes: row.try_get("resolution_notes").map_err(db_error)?,
        })
    }
}

impl DeadLetterStore for DeadLetterQueue {
    fn record(
        &self,
        topic: &str,
        payload: &[u8],
        error: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let topic = topic.to_string();
        let payload = payload.to_vec();
        let error = error.to_string();
        Box::pin(async move { self.add_entry(&topic, &payload, &error).await.map(|_| ()) })
    }
}

impl PostgresStore {
    /// A Dead Letter Queue sharing this store's pool.
    #[must_use]
    pub fn dead_letter_queue(&self) -> DeadLetterQueue {
        DeadLetterQueue::new(self.pool.clone())
    }
}
