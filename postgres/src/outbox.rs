//! Notification outbox.

use crate::{PostgresStore, db_error};
use chrono::{DateTime, Utc};
use slotbook_core::notification::{Audience, Notification, OutboxEntry};
use slotbook_core::store::{NotificationOutbox, StoreError};
use sqlx::PgConnection;
use std::future::Future;
use std::pin::Pin;

const fn audience_str(audience: Audience) -> &'static str {
    match audience {
        Audience::Guest => "guest",
        Audience::Host => "host",
    }
}

fn parse_audience(s: &str) -> Result<Audience, StoreError> {
    match s {
        "guest" => Ok(Audience::Guest),
        "host" => Ok(Audience::Host),
        other => Err(StoreError::SerializationError(format!("unknown audience {other}"))),
    }
}

/// Insert outbox rows inside an open transaction.
pub(crate) async fn insert_notifications(
    conn: &mut PgConnection,
    notifications: &[Notification],
) -> Result<(), StoreError> {
    for notification in notifications {
        sqlx::query(
            r"
            INSERT INTO notification_outbox (audience, destination, body)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(audience_str(notification.audience))
        .bind(&notification.destination)
        .bind(&notification.text)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }
    Ok(())
}

type OutboxRow = (i64, String, String, String, i32, Option<String>, DateTime<Utc>);

impl NotificationOutbox for PostgresStore {
    fn enqueue(
        &self,
        notifications: Vec<Notification>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_error)?;
            insert_notifications(&mut tx, &notifications).await?;
            tx.commit().await.map_err(db_error)
        })
    }

    fn pending(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<OutboxEntry>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let rows: Vec<OutboxRow> = sqlx::query_as(
                r"
                SELECT id, audience, destination, body, attempts, last_error, created_at
                FROM notification_outbox
                WHERE sent_at IS NULL AND attempts < $1
                ORDER BY id ASC
                LIMIT $2
                ",
            )
            .bind(i32::try_from(max_attempts).unwrap_or(i32::MAX))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

            rows.into_iter()
                .map(|(id, audience, destination, body, attempts, last_error, created_at)| {
                    Ok(OutboxEntry {
                        id,
                        notification: Notification {
                            audience: parse_audience(&audience)?,
                            destination,
                            text: body,
                        },
                        attempts: u32::try_from(attempts).unwrap_or_default(),
                        last_error,
                        created_at,
                    })
                })
                .collect()
        })
    }

    fn mark_sent(
        &self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query(
                r"
                UPDATE notification_outbox
                SET sent_at = now(), attempts = attempts + 1
                WHERE id = $1
                ",
            )
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
            Ok(())
        })
    }

    fn mark_failed(
        &self,
        id: i64,
        error: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let error = error.to_string();
        Box::pin(async move {
            sqlx::query(
                r"
                UPDATE notification_outbox
                SET attempts = attempts + 1, last_error = $2
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(&error)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
            Ok(())
        })
    }
}
