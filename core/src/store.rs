//! Persistence traits.
//!
//! Every trait is dyn-compatible (explicit `Pin<Box<dyn Future>>` returns) so
//! use cases can hold `Arc<dyn …>` handles and tests can swap in the in-memory
//! implementations.
//!
//! Two operations are units of work and must be atomic:
//!
//! - [`BookingLedger::commit`]: slot appends, the inquiry transition and the
//!   outbox rows of one booking.
//! - [`ReviewStore::commit`]: the review row, the service score totals and the
//!   inquiry's `review_made` flag.

use crate::aggregate::{BucketKey, ServiceBookings, SlotAppend};
use crate::ids::{InquiryId, ServiceId};
use crate::inquiry::{Inquiry, InquiryStatus};
use crate::notification::{Notification, OutboxEntry};
use crate::review::Review;
use crate::service::Service;
use crate::slot::{DayKey, YearMonth};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored data could not be (de)serialized
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The record to update does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A record with the same id already exists
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// The inquiry left the expected status before the write landed
    #[error("Inquiry {inquiry_id} is no longer {expected:?}")]
    StatusConflict {
        /// Inquiry concerned
        inquiry_id: InquiryId,
        /// Status the write was conditioned on
        expected: InquiryStatus,
    },

    /// A day reached its booking cap while committing
    #[error("Day {day} of {bucket} is full ({limit} bookings per day)")]
    CapacityExceeded {
        /// Bucket concerned
        bucket: BucketKey,
        /// Full day
        day: DayKey,
        /// Configured cap
        limit: u32,
    },

    /// The backing store is unreachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Everything one booking writes, committed atomically.
#[derive(Clone, Debug)]
pub struct BookingCommit {
    /// Slot appends
    pub appends: Vec<SlotAppend>,
    /// Daily cap to re-check under the write lock, if enforced
    pub day_limit: Option<u32>,
    /// Inquiry in its confirmed state
    pub inquiry: Inquiry,
    /// Status the stored inquiry must still have for the commit to apply
    pub expected_status: InquiryStatus,
    /// Notifications to enqueue
    pub notifications: Vec<Notification>,
}

/// Everything one review writes, committed atomically.
#[derive(Clone, Debug)]
pub struct ReviewCommit {
    /// The new review
    pub review: Review,
    /// Inquiry with `review_made` set
    pub inquiry: Inquiry,
}

/// Booking aggregate documents.
pub trait BookingStore: Send + Sync {
    /// Load the documents of `service_id / variant_pax` for the given months.
    /// Months without a document are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn fetch(
        &self,
        service_id: &ServiceId,
        variant_pax: u32,
        year_months: &[YearMonth],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ServiceBookings>, StoreError>> + Send + '_>>;

    /// Replace-or-insert whole documents, keyed by bucket identity.
    ///
    /// Not safe against concurrent writers to the same bucket; use
    /// [`BookingStore::append_slots`] for booking writes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any write fails.
    fn upsert_batch(
        &self,
        documents: Vec<ServiceBookings>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Atomically push each entry onto its slot list, creating the bucket
    /// document when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any append fails; no append is applied then.
    fn append_slots(
        &self,
        appends: Vec<SlotAppend>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

/// Inquiry documents.
pub trait InquiryStore: Send + Sync {
    /// Load an inquiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn get(
        &self,
        id: &InquiryId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Inquiry>, StoreError>> + Send + '_>>;

    /// Insert a new inquiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the id exists.
    fn insert(
        &self,
        inquiry: Inquiry,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Overwrite an inquiry whose stored status is still `expected`.
    ///
    /// The status check and the write are one atomic step.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the id does not exist
    /// - [`StoreError::StatusConflict`] if the stored status differs
    fn update(
        &self,
        inquiry: Inquiry,
        expected: InquiryStatus,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

/// Read access to the service catalog.
pub trait ServiceCatalog: Send + Sync {
    /// Load a service by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn get(
        &self,
        id: &ServiceId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Service>, StoreError>> + Send + '_>>;

    /// Load a service by slug.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn get_by_slug(
        &self,
        slug: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Service>, StoreError>> + Send + '_>>;
}

/// Reviews and their effect on service scores.
pub trait ReviewStore: Send + Sync {
    /// Insert the review, add its score to the service totals and persist the
    /// inquiry, atomically. The stored inquiry must still have the status of
    /// `commit.inquiry`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any write fails; nothing is applied then.
    fn commit(
        &self,
        commit: ReviewCommit,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Highest-scored review of a service, newest first among equals.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn top_for_service(
        &self,
        service_id: &ServiceId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Review>, StoreError>> + Send + '_>>;
}

/// Unit of work for booking creation.
pub trait BookingLedger: Send + Sync {
    /// Apply every slot append, persist the inquiry and enqueue the
    /// notifications in one transaction.
    ///
    /// # Errors
    ///
    /// - [`StoreError::CapacityExceeded`] if `day_limit` is set and a day is full
    /// - [`StoreError::NotFound`] if the inquiry does not exist
    /// - [`StoreError::StatusConflict`] if the stored inquiry is no longer
    ///   `expected_status`
    /// - any other [`StoreError`] on write failure
    ///
    /// On error nothing is applied.
    fn commit(
        &self,
        commit: BookingCommit,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

/// Transactional outbox of pending notifications.
pub trait NotificationOutbox: Send + Sync {
    /// Enqueue notifications outside of a booking commit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    fn enqueue(
        &self,
        notifications: Vec<Notification>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Oldest undelivered entries with fewer than `max_attempts` attempts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn pending(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<OutboxEntry>, StoreError>> + Send + '_>>;

    /// Mark an entry delivered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    fn mark_sent(
        &self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Record a failed delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    fn mark_failed(
        &self,
        id: i64,
        error: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

/// Messages that could not be processed.
pub trait DeadLetterStore: Send + Sync {
    /// Record a failed message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    fn record(
        &self,
        topic: &str,
        payload: &[u8],
        error: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}
