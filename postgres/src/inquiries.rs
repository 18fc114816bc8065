//! Inquiry documents.

use crate::{PostgresStore, db_error, is_unique_violation};
use slotbook_core::ids::InquiryId;
use slotbook_core::inquiry::{Inquiry, InquiryStatus};
use slotbook_core::store::{InquiryStore, StoreError};
use sqlx::PgConnection;
use sqlx::types::Json;
use std::future::Future;
use std::pin::Pin;

/// Overwrite an inquiry whose stored status is still `expected`.
///
/// The row lock taken by the `UPDATE` is held until the surrounding
/// transaction ends, so a concurrent writer re-evaluates the status predicate
/// against the committed row and matches nothing.
pub(crate) async fn update_inquiry(
    conn: &mut PgConnection,
    inquiry: &Inquiry,
    expected: InquiryStatus,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r"
        UPDATE inquiries
        SET status = $2, data = $3, updated_at = $4
        WHERE id = $1 AND status = $5
        ",
    )
    .bind(inquiry.id.as_str())
    .bind(i16::from(inquiry.status.code()))
    .bind(Json(inquiry))
    .bind(inquiry.updated_at)
    .bind(i16::from(expected.code()))
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let exists: Option<(i16,)> = sqlx::query_as("SELECT status FROM inquiries WHERE id = $1")
        .bind(inquiry.id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;

    match exists {
        None => Err(StoreError::NotFound(inquiry.id.to_string())),
        Some((status,)) => {
            tracing::debug!(inquiry_id = %inquiry.id, status, ?expected, "Inquiry status moved on");
            Err(StoreError::StatusConflict {
                inquiry_id: inquiry.id.clone(),
                expected,
            })
        }
    }
}

impl InquiryStore for PostgresStore {
    fn get(
        &self,
        id: &InquiryId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Inquiry>, StoreError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move {
            let row: Option<(Json<Inquiry>,)> =
                sqlx::query_as("SELECT data FROM inquiries WHERE id = $1")
                    .bind(id.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_error)?;

            Ok(row.map(|(Json(inquiry),)| inquiry))
        })
    }

    fn insert(
        &self,
        inquiry: Inquiry,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO inquiries (id, service_id, status, data, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(inquiry.id.as_str())
            .bind(inquiry.service_id.as_str())
            .bind(i16::from(inquiry.status.code()))
            .bind(Json(&inquiry))
            .bind(inquiry.created_at)
            .bind(inquiry.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate(inquiry.id.to_string())
                } else {
                    db_error(e)
                }
            })?;

            tracing::debug!(inquiry_id = %inquiry.id, "Inquiry inserted");
            Ok(())
        })
    }

    fn update(
        &self,
        inquiry: Inquiry,
        expected: InquiryStatus,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(db_error)?;
            update_inquiry(&mut conn, &inquiry, expected).await
        })
    }
}
