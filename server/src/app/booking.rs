//! Booking creation: the `Paid → Confirmed` transition.
//!
//! ```text
//! load inquiry ──▶ fetch buckets ──▶ merge ──▶ load service ──▶ commit (one tx)
//!                                                               ├─ slot appends
//!                                                               ├─ inquiry: Confirmed + code
//!                                                               └─ outbox: guest + host messages
//! ```
//!
//! Nothing is written before the commit, so any earlier failure leaves the
//! inquiry `Paid` and the buckets untouched. A request for an inquiry that is
//! already `Confirmed` is a no-op, which makes redelivered messages harmless.
//! The commit only applies while the stored inquiry is still `Paid`; a worker
//! that loses a race on the same inquiry gets the winner's outcome back.

use crate::app::Repositories;
use crate::app::messages::booking_notifications;
use crate::metrics;
use slotbook_core::environment::Clock;
use slotbook_core::ids::{ConfirmationCode, InquiryId, ServiceId};
use slotbook_core::inquiry::{InquiryStatus, TransitionError};
use slotbook_core::merge::{CapacityPolicy, MergeError, merge_inquiry};
use slotbook_core::slot::derive_year_months;
use slotbook_core::store::{
    BookingCommit, BookingLedger, BookingStore, InquiryStore, ServiceCatalog, StoreError,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from booking creation.
#[derive(Error, Debug)]
pub enum BookingError {
    /// The inquiry named by the request does not exist
    #[error("Inquiry {0} not found")]
    InquiryNotFound(InquiryId),

    /// The inquiry has not been paid
    #[error("Inquiry {inquiry_id} has not been paid (status {status:?})")]
    NotPaid {
        /// Inquiry concerned
        inquiry_id: InquiryId,
        /// Its current status
        status: InquiryStatus,
    },

    /// The inquiry's service does not exist
    #[error("Service {0} not found")]
    ServiceNotFound(ServiceId),

    /// Merging failed
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Illegal lifecycle transition
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Unavailable(_) | StoreError::DatabaseError(_))
        )
    }
}

/// Result of a booking request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingOutcome {
    /// Slots were appended and the inquiry confirmed.
    Created {
        /// Inquiry confirmed
        inquiry_id: InquiryId,
        /// Code shared by every appended slot
        confirmation_code: ConfirmationCode,
        /// Slot entries appended
        slots: usize,
        /// Buckets that did not exist before
        buckets_created: usize,
    },
    /// The inquiry was already confirmed; nothing was written.
    AlreadyConfirmed {
        /// Inquiry concerned
        inquiry_id: InquiryId,
        /// Its existing code
        confirmation_code: Option<ConfirmationCode>,
    },
}

/// Booking use case.
#[derive(Clone)]
pub struct BookingService {
    inquiries: Arc<dyn InquiryStore>,
    bookings: Arc<dyn BookingStore>,
    services: Arc<dyn ServiceCatalog>,
    ledger: Arc<dyn BookingLedger>,
    clock: Arc<dyn Clock>,
    policy: CapacityPolicy,
}

impl BookingService {
    /// Create the service.
    #[must_use]
    pub fn new(repositories: &Repositories, clock: Arc<dyn Clock>, policy: CapacityPolicy) -> Self {
        Self {
            inquiries: repositories.inquiries.clone(),
            bookings: repositories.bookings.clone(),
            services: repositories.services.clone(),
            ledger: repositories.ledger.clone(),
            clock,
            policy,
        }
    }

    /// Record the bookings of a paid inquiry and confirm it.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InquiryNotFound`] / [`BookingError::ServiceNotFound`]
    ///   for missing documents
    /// - [`BookingError::NotPaid`] if the inquiry is still awaiting payment
    /// - [`BookingError::Merge`] / [`BookingError::Store`] when a day is full
    ///   under [`CapacityPolicy::RejectWhenFull`] or persistence fails
    ///
    /// On error nothing has been written.
    #[tracing::instrument(skip(self), fields(inquiry_id = %inquiry_id))]
    pub async fn create_booking(
        &self,
        inquiry_id: &InquiryId,
    ) -> Result<BookingOutcome, BookingError> {
        let started = Instant::now();
        let result = self.try_create_booking(inquiry_id).await;

        match &result {
            Ok(BookingOutcome::Created { slots, .. }) => {
                metrics::record_booking_created(*slots, started.elapsed().as_secs_f64());
            }
            Ok(BookingOutcome::AlreadyConfirmed { .. }) => {
                metrics::record_booking_already_confirmed();
            }
            Err(e) => {
                warn!(error = %e, "Booking creation failed");
                metrics::record_booking_failed();
            }
        }
        result
    }

    async fn try_create_booking(
        &self,
        inquiry_id: &InquiryId,
    ) -> Result<BookingOutcome, BookingError> {
        let inquiry = self
            .inquiries
            .get(inquiry_id)
            .await?
            .ok_or_else(|| BookingError::InquiryNotFound(inquiry_id.clone()))?;

        match inquiry.status {
            InquiryStatus::Paid => {}
            InquiryStatus::Confirmed => {
                info!("Inquiry already confirmed, skipping");
                return Ok(BookingOutcome::AlreadyConfirmed {
                    inquiry_id: inquiry.id,
                    confirmation_code: inquiry.confirmation_code,
                });
            }
            status @ InquiryStatus::AwaitingPayment => {
                return Err(BookingError::NotPaid {
                    inquiry_id: inquiry.id,
                    status,
                });
            }
        }

        let year_months: Vec<_> = derive_year_months(&inquiry.selected_dates).into_iter().collect();
        let existing = self
            .bookings
            .fetch(&inquiry.service_id, inquiry.selected_variant.pax, &year_months)
            .await?;

        let outcome = merge_inquiry(&inquiry, existing, ConfirmationCode::generate(), self.policy)?;

        let service = self
            .services
            .get(&inquiry.service_id)
            .await?
            .ok_or_else(|| BookingError::ServiceNotFound(inquiry.service_id.clone()))?;

        let mut confirmed = inquiry;
        confirmed.confirm(outcome.confirmation_code.clone(), self.clock.now())?;
        let notifications = booking_notifications(&confirmed, &service);

        let slots = outcome.appends.len();
        let buckets_created = outcome.created.len();
        let committed = self
            .ledger
            .commit(BookingCommit {
                appends: outcome.appends,
                day_limit: outcome.day_limit,
                inquiry: confirmed,
                expected_status: InquiryStatus::Paid,
                notifications,
            })
            .await;

        match committed {
            Ok(()) => {}
            Err(StoreError::StatusConflict { .. }) => return self.lost_race(inquiry_id).await,
            Err(e) => return Err(e.into()),
        }

        info!(
            confirmation_code = %outcome.confirmation_code,
            slots,
            buckets_created,
            "Booking created"
        );

        Ok(BookingOutcome::Created {
            inquiry_id: inquiry_id.clone(),
            confirmation_code: outcome.confirmation_code,
            slots,
            buckets_created,
        })
    }

    /// Another worker confirmed the inquiry between our read and our commit.
    async fn lost_race(&self, inquiry_id: &InquiryId) -> Result<BookingOutcome, BookingError> {
        let current = self
            .inquiries
            .get(inquiry_id)
            .await?
            .ok_or_else(|| BookingError::InquiryNotFound(inquiry_id.clone()))?;

        if current.status != InquiryStatus::Confirmed {
            return Err(BookingError::NotPaid {
                inquiry_id: current.id,
                status: current.status,
            });
        }

        info!("Inquiry confirmed concurrently, discarding this attempt");
        Ok(BookingOutcome::AlreadyConfirmed {
            inquiry_id: current.id,
            confirmation_code: current.confirmation_code,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use slotbook_core::slot::{HourSlot, YearMonth};
    use slotbook_testing::{InMemoryDocumentStore, fixtures, test_clock};
    use std::future::Future;
    use std::pin::Pin;

    /// Lets a competing confirmation land just before every commit.
    struct RacingLedger {
        store: InMemoryDocumentStore,
    }

    impl BookingLedger for RacingLedger {
        fn commit(
            &self,
            commit: BookingCommit,
        ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            Box::pin(async move {
                let rival_code = ConfirmationCode::from_string("RIVAL01");
                let mut rival = commit.clone();
                rival.inquiry.confirmation_code = Some(rival_code.clone());
                for append in &mut rival.appends {
                    append.booking.confirmation_code = rival_code.clone();
                }
                BookingLedger::commit(&self.store, rival).await?;
                BookingLedger::commit(&self.store, commit).await
            })
        }
    }

    fn setup(policy: CapacityPolicy) -> (InMemoryDocumentStore, BookingService) {
        let store = InMemoryDocumentStore::new();
        store.add_service(fixtures::service());
        let service = BookingService::new(
            &Repositories::from_store(store.clone()),
            Arc::new(test_clock()),
            policy,
        );
        (store, service)
    }

    #[tokio::test]
    async fn confirms_and_enqueues_messages() {
        let (store, bookings) = setup(CapacityPolicy::Unenforced);
        let inquiry = fixtures::paid_inquiry(&fixtures::service(), &["2025/6/30", "2025/7/1"], "");
        store.add_inquiry(inquiry.clone());

        let outcome = bookings.create_booking(&inquiry.id).await.unwrap();
        let BookingOutcome::Created {
            confirmation_code,
            slots,
            buckets_created,
            ..
        } = outcome
        else {
            unreachable!("expected a created booking");
        };
        assert_eq!((slots, buckets_created), (2, 2));

        let stored = store.inquiry(&inquiry.id).unwrap();
        assert_eq!(stored.status, InquiryStatus::Confirmed);
        assert_eq!(stored.confirmation_code, Some(confirmation_code));
        assert_eq!(store.outbox().len(), 2);
        assert!(
            store
                .bucket(&inquiry.service_id, 2, YearMonth::new(2025, 7).unwrap())
                .is_some()
        );
    }

    #[tokio::test]
    async fn unpaid_inquiry_is_rejected() {
        let (store, bookings) = setup(CapacityPolicy::Unenforced);
        let inquiry = fixtures::unpaid_inquiry(&fixtures::service(), &["2025/6/10"]);
        store.add_inquiry(inquiry.clone());

        let err = bookings.create_booking(&inquiry.id).await.unwrap_err();
        assert!(matches!(err, BookingError::NotPaid { .. }));
        assert_eq!(store.bucket_count(), 0);
    }

    #[tokio::test]
    async fn missing_inquiry_is_not_found() {
        let (_store, bookings) = setup(CapacityPolicy::Unenforced);
        let err = bookings
            .create_booking(&InquiryId::from_string("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InquiryNotFound(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn missing_service_writes_nothing() {
        let (store, bookings) = setup(CapacityPolicy::Unenforced);
        let inquiry = fixtures::paid_inquiry(&fixtures::hourly_service(), &["2025/6/10"], "09:00");
        store.add_inquiry(inquiry.clone());

        let err = bookings.create_booking(&inquiry.id).await.unwrap_err();
        assert!(matches!(err, BookingError::ServiceNotFound(_)));
        assert_eq!(store.inquiry(&inquiry.id).unwrap().status, InquiryStatus::Paid);
        assert_eq!(store.bucket_count(), 0);
    }

    #[tokio::test]
    async fn full_day_is_rejected_when_enforced() {
        let (store, bookings) = setup(CapacityPolicy::RejectWhenFull);
        let service = fixtures::service();

        let mut first = fixtures::paid_inquiry(&service, &["2025/6/10"], "");
        first.selected_variant.max_reservation_per_day = 1;
        let mut second = fixtures::paid_inquiry(&service, &["2025/6/10"], "");
        second.selected_variant.max_reservation_per_day = 1;
        store.add_inquiry(first.clone());
        store.add_inquiry(second.clone());

        bookings.create_booking(&first.id).await.unwrap();
        let err = bookings.create_booking(&second.id).await.unwrap_err();
        assert!(matches!(err, BookingError::Merge(MergeError::CapacityExceeded { .. })));
        assert_eq!(store.inquiry(&second.id).unwrap().status, InquiryStatus::Paid);
    }

    #[tokio::test]
    async fn losing_a_confirmation_race_reports_the_winner() {
        let store = InMemoryDocumentStore::new();
        store.add_service(fixtures::service());
        let mut repositories = Repositories::from_store(store.clone());
        repositories.ledger = Arc::new(RacingLedger { store: store.clone() });
        let bookings =
            BookingService::new(&repositories, Arc::new(test_clock()), CapacityPolicy::Unenforced);

        let inquiry = fixtures::paid_inquiry(&fixtures::service(), &["2025/6/10"], "");
        store.add_inquiry(inquiry.clone());

        let outcome = bookings.create_booking(&inquiry.id).await.unwrap();

        let rival = ConfirmationCode::from_string("RIVAL01");
        assert_eq!(
            outcome,
            BookingOutcome::AlreadyConfirmed {
                inquiry_id: inquiry.id.clone(),
                confirmation_code: Some(rival.clone()),
            }
        );
        let bucket = store
            .bucket(&inquiry.service_id, 2, YearMonth::new(2025, 6).unwrap())
            .unwrap();
        let slot = bucket.slot("10".parse().unwrap(), &HourSlot::whole_day());
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].confirmation_code, rival);
        assert_eq!(store.outbox().len(), 2);
    }

    #[tokio::test]
    async fn unavailable_store_is_transient() {
        let (store, bookings) = setup(CapacityPolicy::Unenforced);
        let inquiry = fixtures::paid_inquiry(&fixtures::service(), &["2025/6/10"], "");
        store.add_inquiry(inquiry.clone());
        store.set_unavailable(true);

        let err = bookings.create_booking(&inquiry.id).await.unwrap_err();
        assert!(err.is_transient());
    }
}
