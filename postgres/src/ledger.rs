//! Booking unit of work.

use crate::bookings::{append_slot, day_count};
use crate::inquiries::update_inquiry;
use crate::outbox::insert_notifications;
use crate::{PostgresStore, db_error};
use slotbook_core::store::{BookingCommit, BookingLedger, StoreError};
use std::future::Future;
use std::pin::Pin;

impl BookingLedger for PostgresStore {
    fn commit(
        &self,
        commit: BookingCommit,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let BookingCommit {
                appends,
                day_limit,
                inquiry,
                expected_status,
                notifications,
            } = commit;

            let mut tx = self.pool.begin().await.map_err(db_error)?;

            // Taken first: a concurrent commit for the same inquiry waits here
            // and then fails the status predicate before touching any bucket.
            update_inquiry(&mut tx, &inquiry, expected_status).await?;

            for append in &appends {
                append_slot(&mut tx, append).await?;

                // The bucket row stays locked until commit, so the count is exact.
                if let Some(limit) = day_limit {
                    let count = day_count(&mut tx, &append.bucket, append.day).await?;
                    if count > limit as usize {
                        metrics::counter!("slotbook_capacity_rejected_total").increment(1);
                        return Err(StoreError::CapacityExceeded {
                            bucket: append.bucket.clone(),
                            day: append.day,
                            limit,
                        });
                    }
                }
            }

            insert_notifications(&mut tx, &notifications).await?;
            tx.commit().await.map_err(db_error)?;

            tracing::info!(
                inquiry_id = %inquiry.id,
                slots = appends.len(),
                notifications = notifications.len(),
                "Booking committed"
            );
            Ok(())
        })
    }
}
