//! Service catalog.
//!
//! The service document is stored whole; review totals live in their own
//! columns so they can be incremented in place and are copied over the
//! document on read.

use crate::{PostgresStore, db_error};
use slotbook_core::ids::ServiceId;
use slotbook_core::service::Service;
use slotbook_core::store::{ServiceCatalog, StoreError};
use sqlx::types::Json;
use std::future::Future;
use std::pin::Pin;

type ServiceRow = (Json<Service>, i64, i64);

fn row_to_service((Json(mut service), total_score, review_count): ServiceRow) -> Service {
    service.total_score = u64::try_from(total_score).unwrap_or_default();
    service.review_count = u64::try_from(review_count).unwrap_or_default();
    service
}

impl PostgresStore {
    /// Insert or replace a service document. Review totals are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the write fails.
    pub async fn upsert_service(&self, service: &Service) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO services (id, slug, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET slug = EXCLUDED.slug, data = EXCLUDED.data
            ",
        )
        .bind(service.id.as_str())
        .bind(&service.slug)
        .bind(Json(service))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

impl ServiceCatalog for PostgresStore {
    fn get(
        &self,
        id: &ServiceId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Service>, StoreError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move {
            let row: Option<ServiceRow> =
                sqlx::query_as("SELECT data, total_score, review_count FROM services WHERE id = $1")
                    .bind(id.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_error)?;
            Ok(row.map(row_to_service))
        })
    }

    fn get_by_slug(
        &self,
        slug: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Service>, StoreError>> + Send + '_>> {
        let slug = slug.to_string();
        Box::pin(async move {
            let row: Option<ServiceRow> = sqlx::query_as(
                r"
                SELECT data, total_score, review_count
                FROM services
                WHERE slug = $1
                ",
            )
            .bind(&slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
            Ok(row.map(row_to_service))
        })
    }
}
