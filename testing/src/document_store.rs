//! In-memory document store
//!
//! [`InMemoryDocumentStore`] implements every persistence trait of
//! `slotbook-core` over a single mutex-guarded state, so each unit of work is
//! applied under one lock and is trivially atomic. Failure switches let tests
//! exercise rollback paths.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test already panicked

use chrono::Utc;
use slotbook_core::aggregate::{BucketKey, ServiceBookings, SlotAppend};
use slotbook_core::ids::{InquiryId, ServiceId};
use slotbook_core::inquiry::{Inquiry, InquiryStatus};
use slotbook_core::notification::{Notification, OutboxEntry};
use slotbook_core::review::Review;
use slotbook_core::service::Service;
use slotbook_core::slot::YearMonth;
use slotbook_core::store::{
    BookingCommit, BookingLedger, BookingStore, DeadLetterStore, InquiryStore,
    NotificationOutbox, ReviewCommit, ReviewStore, ServiceCatalog, StoreError,
};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// A recorded dead letter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeadLetter {
    /// Source topic
    pub topic: String,
    /// Raw payload
    pub payload: Vec<u8>,
    /// Processing error
    pub error: String,
}

struct OutboxRow {
    entry: OutboxEntry,
    sent: bool,
}

#[derive(Default)]
struct State {
    bookings: BTreeMap<BucketKey, ServiceBookings>,
    inquiries: HashMap<InquiryId, Inquiry>,
    services: HashMap<ServiceId, Service>,
    reviews: Vec<Review>,
    outbox: Vec<OutboxRow>,
    dead_letters: Vec<DeadLetter>,
    fail_commits: usize,
    fail_inquiry_writes: bool,
    unavailable: bool,
}

impl State {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("in-memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_status(&self, id: &InquiryId, expected: InquiryStatus) -> Result<(), StoreError> {
        match self.inquiries.get(id) {
            None => Err(StoreError::NotFound(id.to_string())),
            Some(stored) if stored.status != expected => Err(StoreError::StatusConflict {
                inquiry_id: id.clone(),
                expected,
            }),
            Some(_) => Ok(()),
        }
    }

    fn apply_append(&mut self, append: &SlotAppend) {
        self.bookings
            .entry(append.bucket.clone())
            .or_insert_with(|| {
                ServiceBookings::empty_with_id(&append.bucket, append.bucket_id.clone())
            })
            .apply(append);
    }

    fn enqueue(&mut self, notifications: Vec<Notification>) {
        for notification in notifications {
            let id = i64::try_from(self.outbox.len()).unwrap_or(i64::MAX) + 1;
            self.outbox.push(OutboxRow {
                entry: OutboxEntry {
                    id,
                    notification,
                    attempts: 0,
                    last_error: None,
                    created_at: Utc::now(),
                },
                sent: false,
            });
        }
    }

    fn outbox_row(&mut self, id: i64) -> Result<&mut OutboxEntry, StoreError> {
        usize::try_from(id - 1)
            .ok()
            .and_then(|index| self.outbox.get_mut(index))
            .map(|row| &mut row.entry)
            .ok_or_else(|| StoreError::NotFound(format!("outbox entry {id}")))
    }
}

/// In-memory implementation of every store trait.
///
/// Cloning shares the underlying state.
///
/// # Example
///
/// ```
/// use slotbook_testing::InMemoryDocumentStore;
///
/// let store = InMemoryDocumentStore::new();
/// assert_eq!(store.bucket_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a service into the catalog.
    pub fn add_service(&self, service: Service) {
        self.state
            .lock()
            .unwrap()
            .services
            .insert(service.id.clone(), service);
    }

    /// Seed an inquiry.
    pub fn add_inquiry(&self, inquiry: Inquiry) {
        self.state
            .lock()
            .unwrap()
            .inquiries
            .insert(inquiry.id.clone(), inquiry);
    }

    /// Snapshot of an inquiry.
    #[must_use]
    pub fn inquiry(&self, id: &InquiryId) -> Option<Inquiry> {
        self.state.lock().unwrap().inquiries.get(id).cloned()
    }

    /// Snapshot of a service.
    #[must_use]
    pub fn service(&self, id: &ServiceId) -> Option<Service> {
        self.state.lock().unwrap().services.get(id).cloned()
    }

    /// Snapshot of every bucket document, in key order.
    #[must_use]
    pub fn buckets(&self) -> Vec<ServiceBookings> {
        self.state.lock().unwrap().bookings.values().cloned().collect()
    }

    /// Snapshot of one bucket document.
    #[must_use]
    pub fn bucket(
        &self,
        service_id: &ServiceId,
        variant_pax: u32,
        year_month: YearMonth,
    ) -> Option<ServiceBookings> {
        let key = BucketKey {
            service_id: service_id.clone(),
            variant_pax,
            year_month,
        };
        self.state.lock().unwrap().bookings.get(&key).cloned()
    }

    /// Number of bucket documents.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.state.lock().unwrap().bookings.len()
    }

    /// Every review stored so far.
    #[must_use]
    pub fn reviews(&self) -> Vec<Review> {
        self.state.lock().unwrap().reviews.clone()
    }

    /// Every outbox entry, delivered or not, with its delivered flag.
    #[must_use]
    pub fn outbox(&self) -> Vec<(OutboxEntry, bool)> {
        self.state
            .lock()
            .unwrap()
            .outbox
            .iter()
            .map(|row| (row.entry.clone(), row.sent))
            .collect()
    }

    /// Every dead letter recorded so far.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().unwrap().dead_letters.clone()
    }

    /// Make the next `n` unit-of-work commits fail without applying anything.
    pub fn fail_next_commits(&self, n: usize) {
        self.state.lock().unwrap().fail_commits = n;
    }

    /// Make inquiry inserts and updates fail.
    pub fn fail_inquiry_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_inquiry_writes = fail;
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }
}

impl BookingStore for InMemoryDocumentStore {
    fn fetch(
        &self,
        service_id: &ServiceId,
        variant_pax: u32,
        year_months: &[YearMonth],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ServiceBookings>, StoreError>> + Send + '_>> {
        let service_id = service_id.clone();
        let year_months = year_months.to_vec();
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state.check_available()?;
            Ok(state
                .bookings
                .values()
                .filter(|doc| {
                    doc.service_id == service_id
                        && doc.variant_pax == variant_pax
                        && year_months.contains(&doc.year_month)
                })
                .cloned()
                .collect())
        })
    }

    fn upsert_batch(
        &self,
        documents: Vec<ServiceBookings>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check_available()?;
            for doc in documents {
                state.bookings.insert(doc.key(), doc);
            }
            Ok(())
        })
    }

    fn append_slots(
        &self,
        appends: Vec<SlotAppend>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check_available()?;
            for append in &appends {
                state.apply_append(append);
            }
            Ok(())
        })
    }
}

impl InquiryStore for InMemoryDocumentStore {
    fn get(
        &self,
        id: &InquiryId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Inquiry>, StoreError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state.check_available()?;
            Ok(state.inquiries.get(&id).cloned())
        })
    }

    fn insert(
        &self,
        inquiry: Inquiry,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check_available()?;
            if state.fail_inquiry_writes {
                return Err(StoreError::DatabaseError("inquiry writes disabled".to_string()));
            }
            if state.inquiries.contains_key(&inquiry.id) {
                return Err(StoreError::Duplicate(inquiry.id.to_string()));
            }
            state.inquiries.insert(inquiry.id.clone(), inquiry);
            Ok(())
        })
    }

    fn update(
        &self,
        inquiry: Inquiry,
        expected: InquiryStatus,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check_available()?;
            if state.fail_inquiry_writes {
                return Err(StoreError::DatabaseError("inquiry writes disabled".to_string()));
            }
            state.check_status(&inquiry.id, expected)?;
            state.inquiries.insert(inquiry.id.clone(), inquiry);
            Ok(())
        })
    }
}

impl ServiceCatalog for InMemoryDocumentStore {
    fn get(
        &self,
        id: &ServiceId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Service>, StoreError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state.check_available()?;
            Ok(state.services.get(&id).cloned())
        })
    }

    fn get_by_slug(
        &self,
        slug: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Service>, StoreError>> + Send + '_>> {
        let slug = slug.to_string();
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state.check_available()?;
            Ok(state.services.values().find(|s| s.slug == slug).cloned())
        })
    }
}

impl ReviewStore for InMemoryDocumentStore {
    fn commit(
        &self,
        commit: ReviewCommit,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check_available()?;
            if state.fail_commits > 0 {
                state.fail_commits -= 1;
                return Err(StoreError::DatabaseError("injected commit failure".to_string()));
            }
            state.check_status(&commit.inquiry.id, commit.inquiry.status)?;
            let Some(service) = state.services.get_mut(&commit.review.service_id) else {
                return Err(StoreError::NotFound(commit.review.service_id.to_string()));
            };
            service.total_score += u64::from(commit.review.score.value());
            service.review_count += 1;

            state.inquiries.insert(commit.inquiry.id.clone(), commit.inquiry);
            state.reviews.push(commit.review);
            Ok(())
        })
    }

    fn top_for_service(
        &self,
        service_id: &ServiceId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Review>, StoreError>> + Send + '_>> {
        let service_id = service_id.clone();
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state.check_available()?;
            Ok(state
                .reviews
                .iter()
                .filter(|review| review.service_id == service_id)
                .max_by(|a, b| a.score.cmp(&b.score).then(a.created_at.cmp(&b.created_at)))
                .cloned())
        })
    }
}

impl BookingLedger for InMemoryDocumentStore {
    fn commit(
        &self,
        commit: BookingCommit,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check_available()?;
            if state.fail_commits > 0 {
                state.fail_commits -= 1;
                return Err(StoreError::DatabaseError("injected commit failure".to_string()));
            }
            if state.fail_inquiry_writes {
                return Err(StoreError::DatabaseError("inquiry writes disabled".to_string()));
            }
            state.check_status(&commit.inquiry.id, commit.expected_status)?;

            // Validate against a scratch copy so a full day leaves nothing applied.
            if let Some(limit) = commit.day_limit {
                let mut scratch: BTreeMap<BucketKey, ServiceBookings> = BTreeMap::new();
                for append in &commit.appends {
                    let doc = scratch.entry(append.bucket.clone()).or_insert_with(|| {
                        state.bookings.get(&append.bucket).cloned().unwrap_or_else(|| {
                            ServiceBookings::empty_with_id(&append.bucket, append.bucket_id.clone())
                        })
                    });
                    doc.apply(append);
                    if doc.day_count(append.day) > limit as usize {
                        return Err(StoreError::CapacityExceeded {
                            bucket: append.bucket.clone(),
                            day: append.day,
                            limit,
                        });
                    }
                }
            }

            for append in &commit.appends {
                state.apply_append(append);
            }
            state.inquiries.insert(commit.inquiry.id.clone(), commit.inquiry);
            state.enqueue(commit.notifications);
            Ok(())
        })
    }
}

impl NotificationOutbox for InMemoryDocumentStore {
    fn enqueue(
        &self,
        notifications: Vec<Notification>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check_available()?;
            state.enqueue(notifications);
            Ok(())
        })
    }

    fn pending(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<OutboxEntry>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state.check_available()?;
            Ok(state
                .outbox
                .iter()
                .filter(|row| !row.sent && row.entry.attempts < max_attempts)
                .map(|row| row.entry.clone())
                .take(limit)
                .collect())
        })
    }

    fn mark_sent(
        &self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check_available()?;
            let index = usize::try_from(id - 1)
                .map_err(|_| StoreError::NotFound(format!("outbox entry {id}")))?;
            let row = state
                .outbox
                .get_mut(index)
                .ok_or_else(|| StoreError::NotFound(format!("outbox entry {id}")))?;
            row.sent = true;
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
            let mut state = self.state.lock().unwrap();
            state.check_available()?;
            let entry = state.outbox_row(id)?;
            entry.attempts += 1;
            entry.last_error = Some(error);
            Ok(())
        })
    }
}

impl DeadLetterStore for InMemoryDocumentStore {
    fn record(
        &self,
        topic: &str,
        payload: &[u8],
        error: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let letter = DeadLetter {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            error: error.to_string(),
        };
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.check_available()?;
            state.dead_letters.push(letter);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use slotbook_core::aggregate::Booking;
    use slotbook_core::ids::{BookingsId, ConfirmationCode};
    use slotbook_core::slot::HourSlot;

    fn append(inquiry: &str, day: &str) -> SlotAppend {
        SlotAppend {
            bucket: BucketKey {
                service_id: ServiceId::from_string("svc"),
                variant_pax: 2,
                year_month: YearMonth::new(2025, 6).unwrap(),
            },
            bucket_id: BookingsId::new(),
            day: day.parse().unwrap(),
            hour: HourSlot::whole_day(),
            booking: Booking {
                confirmation_code: ConfirmationCode::generate(),
                inquiry_id: InquiryId::from_string(inquiry),
            },
        }
    }

    #[tokio::test]
    async fn appends_share_one_bucket_document() {
        let store = InMemoryDocumentStore::new();
        store.append_slots(vec![append("a", "1")]).await.unwrap();
        store.append_slots(vec![append("b", "1")]).await.unwrap();

        assert_eq!(store.bucket_count(), 1);
        let doc = &store.buckets()[0];
        assert_eq!(doc.slot("1".parse().unwrap(), &HourSlot::whole_day()).len(), 2);
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let store = InMemoryDocumentStore::new();
        let inquiry = fixtures::paid_inquiry(&fixtures::service(), &["2025/6/1"], "");
        store.add_inquiry(inquiry.clone());
        store.fail_next_commits(1);

        let commit = BookingCommit {
            appends: vec![append(inquiry.id.as_str(), "1")],
            day_limit: None,
            inquiry,
            expected_status: InquiryStatus::Paid,
            notifications: vec![],
        };
        assert!(BookingLedger::commit(&store, commit.clone()).await.is_err());
        assert_eq!(store.bucket_count(), 0);

        BookingLedger::commit(&store, commit).await.unwrap();
        assert_eq!(store.bucket_count(), 1);
    }

    #[tokio::test]
    async fn capacity_is_rechecked_on_commit() {
        let store = InMemoryDocumentStore::new();
        store.append_slots(vec![append("a", "1")]).await.unwrap();

        let inquiry = fixtures::paid_inquiry(&fixtures::service(), &["2025/6/1"], "");
        store.add_inquiry(inquiry.clone());
        let err = BookingLedger::commit(
            &store,
            BookingCommit {
                appends: vec![append(inquiry.id.as_str(), "1")],
                day_limit: Some(1),
                inquiry,
                expected_status: InquiryStatus::Paid,
                notifications: vec![],
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, StoreError::CapacityExceeded { limit: 1, .. }));
        assert_eq!(store.buckets()[0].total_count(), 1);
    }

    #[tokio::test]
    async fn second_confirmation_of_a_paid_inquiry_conflicts() {
        let store = InMemoryDocumentStore::new();
        let paid = fixtures::paid_inquiry(&fixtures::service(), &["2025/6/1"], "");
        store.add_inquiry(paid.clone());

        // Both writers read the inquiry while it was still paid.
        let commit_for = |code: &str| {
            let mut confirmed = paid.clone();
            confirmed.confirm(ConfirmationCode::from_string(code), Utc::now()).unwrap();
            let mut slot = append(paid.id.as_str(), "1");
            slot.booking.confirmation_code = ConfirmationCode::from_string(code);
            BookingCommit {
                appends: vec![slot],
                day_limit: None,
                inquiry: confirmed,
                expected_status: InquiryStatus::Paid,
                notifications: vec![],
            }
        };

        BookingLedger::commit(&store, commit_for("FIRST01")).await.unwrap();
        let err = BookingLedger::commit(&store, commit_for("SECOND2")).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::StatusConflict { expected: InquiryStatus::Paid, .. }
        ));
        let doc = &store.buckets()[0];
        let slot = doc.slot("1".parse().unwrap(), &HourSlot::whole_day());
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].confirmation_code.as_str(), "FIRST01");
        assert_eq!(
            store.inquiry(&paid.id).unwrap().confirmation_code.unwrap().as_str(),
            "FIRST01"
        );
        assert_eq!(store.outbox().len(), 0);
    }

    #[tokio::test]
    async fn update_requires_the_expected_status() {
        let store = InMemoryDocumentStore::new();
        let mut inquiry = fixtures::unpaid_inquiry(&fixtures::service(), &["2025/6/1"]);
        store.add_inquiry(inquiry.clone());
        inquiry.mark_paid(Utc::now()).unwrap();

        store.update(inquiry.clone(), InquiryStatus::AwaitingPayment).await.unwrap();
        let err = store.update(inquiry, InquiryStatus::AwaitingPayment).await.unwrap_err();

        assert!(matches!(err, StoreError::StatusConflict { .. }));
    }

    #[tokio::test]
    async fn outbox_tracks_attempts() {
        let store = InMemoryDocumentStore::new();
        store
            .enqueue(vec![Notification {
                audience: slotbook_core::notification::Audience::Guest,
                destination: "628".into(),
                text: "hi".into(),
            }])
            .await
            .unwrap();

        let pending = store.pending(10, 3).await.unwrap();
        assert_eq!(pending.len(), 1);
        store.mark_failed(pending[0].id, "boom").await.unwrap();
        store.mark_failed(pending[0].id, "boom").await.unwrap();
        store.mark_failed(pending[0].id, "boom").await.unwrap();
        assert!(store.pending(10, 3).await.unwrap().is_empty());

        store.mark_sent(pending[0].id).await.unwrap();
        assert!(store.outbox()[0].1);
    }
}
