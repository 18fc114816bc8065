//! Booking bucket documents.

use crate::{PostgresStore, db_error, json_error};
use slotbook_core::aggregate::{BookingsByHour, BucketKey, ServiceBookings, SlotAppend};
use slotbook_core::ids::{BookingsId, ServiceId};
use slotbook_core::slot::{DayKey, YearMonth};
use slotbook_core::store::{BookingStore, StoreError};
use sqlx::PgConnection;
use sqlx::types::Json;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

type BucketRow = (String, String, i64, String, Json<BTreeMap<DayKey, BookingsByHour>>);

fn row_to_document(row: BucketRow) -> Result<ServiceBookings, StoreError> {
    let (id, service_id, variant_pax, year_month, Json(bookings_by_date)) = row;
    Ok(ServiceBookings {
        id: BookingsId::from_string(id),
        service_id: ServiceId::from_string(service_id),
        variant_pax: u32::try_from(variant_pax)
            .map_err(|e| StoreError::SerializationError(format!("variant_pax: {e}")))?,
        year_month: year_month.parse().map_err(|e: slotbook_core::slot::SlotError| {
            StoreError::SerializationError(e.to_string())
        })?,
        bookings_by_date,
    })
}

/// Push one entry onto its slot, creating the bucket and the day/hour levels
/// as needed. The conflicting row is locked by `ON CONFLICT DO UPDATE`, so
/// concurrent appends to the same bucket are applied one after the other.
#[tracing::instrument(
    skip(conn, append),
    fields(bucket = %append.bucket, day = %append.day, hour = %append.hour)
)]
pub(crate) async fn append_slot(
    conn: &mut PgConnection,
    append: &SlotAppend,
) -> Result<(), StoreError> {
    let booking = serde_json::to_value(&append.booking).map_err(json_error)?;

    sqlx::query(
        r"
        INSERT INTO service_bookings (id, service_id, variant_pax, year_month, bookings_by_date)
        VALUES (
            $1, $2, $3, $4,
            jsonb_build_object($5::text, jsonb_build_object($6::text, jsonb_build_array($7::jsonb)))
        )
        ON CONFLICT (service_id, variant_pax, year_month) DO UPDATE
        SET bookings_by_date = jsonb_set(
                service_bookings.bookings_by_date,
                ARRAY[$5::text],
                COALESCE(service_bookings.bookings_by_date -> $5::text, '{}'::jsonb)
                    || jsonb_build_object(
                        $6::text,
                        COALESCE(
                            service_bookings.bookings_by_date -> $5::text -> $6::text,
                            '[]'::jsonb
                        )
                            || jsonb_build_array($7::jsonb)
                    ),
                true
            ),
            updated_at = now()
        ",
    )
    .bind(append.bucket_id.as_str())
    .bind(append.bucket.service_id.as_str())
    .bind(i64::from(append.bucket.variant_pax))
    .bind(append.bucket.year_month.to_string())
    .bind(append.day.to_string())
    .bind(append.hour.as_str())
    .bind(booking)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(())
}

/// Number of entries on one day of a bucket, across every hour slot.
pub(crate) async fn day_count(
    conn: &mut PgConnection,
    bucket: &BucketKey,
    day: DayKey,
) -> Result<usize, StoreError> {
    let row: Option<(Option<Json<BookingsByHour>>,)> = sqlx::query_as(
        r"
        SELECT bookings_by_date -> $4::text
        FROM service_bookings
        WHERE service_id = $1 AND variant_pax = $2 AND year_month = $3
        ",
    )
    .bind(bucket.service_id.as_str())
    .bind(i64::from(bucket.variant_pax))
    .bind(bucket.year_month.to_string())
    .bind(day.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(row
        .and_then(|(hours,)| hours)
        .map_or(0, |Json(hours)| hours.values().map(Vec::len).sum()))
}

impl BookingStore for PostgresStore {
    fn fetch(
        &self,
        service_id: &ServiceId,
        variant_pax: u32,
        year_months: &[YearMonth],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ServiceBookings>, StoreError>> + Send + '_>> {
        let service_id = service_id.clone();
        let year_months: Vec<String> = year_months.iter().map(ToString::to_string).collect();

        Box::pin(async move {
            let rows: Vec<BucketRow> = sqlx::query_as(
                r"
                SELECT id, service_id, variant_pax, year_month, bookings_by_date
                FROM service_bookings
                WHERE service_id = $1 AND variant_pax = $2 AND year_month = ANY($3)
                ",
            )
            .bind(service_id.as_str())
            .bind(i64::from(variant_pax))
            .bind(&year_months)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

            rows.into_iter().map(row_to_document).collect()
        })
    }

    fn upsert_batch(
        &self,
        documents: Vec<ServiceBookings>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_error)?;

            for doc in &documents {
                sqlx::query(
                    r"
                    INSERT INTO service_bookings
                        (id, service_id, variant_pax, year_month, bookings_by_date)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (service_id, variant_pax, year_month) DO UPDATE
                    SET bookings_by_date = EXCLUDED.bookings_by_date,
                        updated_at = now()
                    ",
                )
                .bind(doc.id.as_str())
                .bind(doc.service_id.as_str())
                .bind(i64::from(doc.variant_pax))
                .bind(doc.year_month.to_string())
                .bind(Json(&doc.bookings_by_date))
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
            }

            tx.commit().await.map_err(db_error)?;
            tracing::debug!(documents = documents.len(), "Bucket documents upserted");
            Ok(())
        })
    }

    fn append_slots(
        &self,
        appends: Vec<SlotAppend>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_error)?;
            for append in &appends {
                append_slot(&mut tx, append).await?;
            }
            tx.commit().await.map_err(db_error)?;
            Ok(())
        })
    }
}
