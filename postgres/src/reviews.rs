//! Reviews and service score totals.

use crate::inquiries::update_inquiry;
use crate::{PostgresStore, db_error, is_unique_violation};
use chrono::{DateTime, Utc};
use slotbook_core::ids::{InquiryId, ReviewId, ServiceId};
use slotbook_core::review::{Review, Score};
use slotbook_core::store::{ReviewCommit, ReviewStore, StoreError};
use std::future::Future;
use std::pin::Pin;

impl ReviewStore for PostgresStore {
    fn commit(
        &self,
        commit: ReviewCommit,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let ReviewCommit { review, inquiry } = commit;
            let mut tx = self.pool.begin().await.map_err(db_error)?;

            sqlx::query(
                r"
                INSERT INTO reviews
                    (id, service_id, inquiry_id, user_id, content, score, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(review.id.as_str())
            .bind(review.service_id.as_str())
            .bind(review.inquiry_id.as_str())
            .bind(&review.user_id)
            .bind(&review.content)
            .bind(i16::from(review.score.value()))
            .bind(review.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate(format!("review for inquiry {}", review.inquiry_id))
                } else {
                    db_error(e)
                }
            })?;

            let updated = sqlx::query(
                r"
                UPDATE services
                SET total_score = total_score + $2, review_count = review_count + 1
                WHERE id = $1
                ",
            )
            .bind(review.service_id.as_str())
            .bind(i64::from(review.score.value()))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

            if updated.rows_affected() == 0 {
                return Err(StoreError::NotFound(review.service_id.to_string()));
            }

            update_inquiry(&mut tx, &inquiry, inquiry.status).await?;
            tx.commit().await.map_err(db_error)?;

            tracing::info!(
                review_id = %review.id,
                service_id = %review.service_id,
                score = review.score.value(),
                "Review committed"
            );
            Ok(())
        })
    }

    fn top_for_service(
        &self,
        service_id: &ServiceId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Review>, StoreError>> + Send + '_>> {
        let service_id = service_id.clone();
        Box::pin(async move {
            let row: Option<(String, String, String, String, i16, DateTime<Utc>)> = sqlx::query_as(
                r"
                SELECT id, inquiry_id, user_id, content, score, created_at
                FROM reviews
                WHERE service_id = $1
                ORDER BY score DESC, created_at DESC
                LIMIT 1
                ",
            )
            .bind(service_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

            row.map(|(id, inquiry_id, user_id, content, score, created_at)| {
                Ok(Review {
                    id: ReviewId::from_string(id),
                    service_id: service_id.clone(),
                    inquiry_id: InquiryId::from_string(inquiry_id),
                    user_id,
                    content,
                    score: Score::try_from(i64::from(score))
                        .map_err(|e| StoreError::SerializationError(e.to_string()))?,
                    created_at,
                })
            })
            .transpose()
        })
    }
}
