//! End-to-end booking creation against the in-memory store.

#![allow(clippy::unwrap_used)]

use slotbook_core::aggregate::ServiceBookings;
use slotbook_core::ids::ConfirmationCode;
use slotbook_core::inquiry::{Inquiry, InquiryStatus};
use slotbook_core::merge::CapacityPolicy;
use slotbook_core::slot::{DayKey, HourSlot, YearMonth};
use slotbook_server::app::{BookingError, BookingOutcome, BookingService, Repositories};
use slotbook_testing::{InMemoryDocumentStore, fixtures, test_clock};
use std::sync::Arc;

fn booking_service(store: &InMemoryDocumentStore, policy: CapacityPolicy) -> BookingService {
    BookingService::new(&Repositories::from_store(store.clone()), Arc::new(test_clock()), policy)
}

fn hourly_inquiry(store: &InMemoryDocumentStore, dates: &[&str]) -> Inquiry {
    let inquiry = fixtures::paid_inquiry(&fixtures::hourly_service(), dates, "09:00");
    store.add_inquiry(inquiry.clone());
    inquiry
}

fn june_bucket(store: &InMemoryDocumentStore) -> ServiceBookings {
    store
        .bucket(&fixtures::hourly_service().id, 2, YearMonth::new(2025, 6).unwrap())
        .unwrap()
}

fn day(n: u32) -> DayKey {
    DayKey::new(n).unwrap()
}

async fn confirm(bookings: &BookingService, inquiry: &Inquiry) -> ConfirmationCode {
    match bookings.create_booking(&inquiry.id).await.unwrap() {
        BookingOutcome::Created { confirmation_code, .. } => confirmation_code,
        other => unreachable!("expected a created booking, got {other:?}"),
    }
}

#[tokio::test]
async fn two_days_in_one_month_share_a_bucket_and_a_code() {
    let store = InMemoryDocumentStore::new();
    store.add_service(fixtures::hourly_service());
    let inquiry = hourly_inquiry(&store, &["2025/6/10", "2025/6/11"]);

    let code = confirm(&booking_service(&store, CapacityPolicy::Unenforced), &inquiry).await;

    assert_eq!(code.as_str().len(), 7);
    assert!(!code.as_str().chars().any(|c| c.is_ascii_lowercase()));
    assert_eq!(store.bucket_count(), 1);

    let bucket = june_bucket(&store);
    let nine = HourSlot::normalise("09:00");
    for d in [10, 11] {
        let slot = bucket.slot(day(d), &nine);
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].confirmation_code, code);
        assert_eq!(slot[0].inquiry_id, inquiry.id);
    }

    let stored = store.inquiry(&inquiry.id).unwrap();
    assert_eq!(stored.status, InquiryStatus::Confirmed);
    assert_eq!(stored.status.code(), 3);
    assert_eq!(stored.confirmation_code, Some(code));
}

#[tokio::test]
async fn second_booking_for_the_same_slot_is_appended() {
    let store = InMemoryDocumentStore::new();
    store.add_service(fixtures::hourly_service());
    let bookings = booking_service(&store, CapacityPolicy::Unenforced);

    let first = hourly_inquiry(&store, &["2025/6/10", "2025/6/11"]);
    let first_code = confirm(&bookings, &first).await;
    let second = hourly_inquiry(&store, &["2025/6/10"]);
    let second_code = confirm(&bookings, &second).await;

    let bucket = june_bucket(&store);
    let codes: Vec<_> = bucket
        .slot(day(10), &HourSlot::normalise("09:00"))
        .iter()
        .map(|b| b.confirmation_code.clone())
        .collect();
    assert_eq!(codes, vec![first_code, second_code]);
    assert_eq!(bucket.slot(day(11), &HourSlot::normalise("09:00")).len(), 1);
}

#[tokio::test]
async fn dates_across_months_create_one_bucket_per_month() {
    let store = InMemoryDocumentStore::new();
    store.add_service(fixtures::hourly_service());
    let inquiry = hourly_inquiry(&store, &["2025/6/30", "2025/7/1", "2025/8/2"]);

    let outcome = booking_service(&store, CapacityPolicy::Unenforced)
        .create_booking(&inquiry.id)
        .await
        .unwrap();

    assert!(matches!(outcome, BookingOutcome::Created { slots: 3, buckets_created: 3, .. }));
    assert_eq!(store.bucket_count(), 3);
}

#[tokio::test]
async fn existing_entries_survive_a_new_booking() {
    let store = InMemoryDocumentStore::new();
    store.add_service(fixtures::hourly_service());
    let bookings = booking_service(&store, CapacityPolicy::Unenforced);

    let morning = hourly_inquiry(&store, &["2025/6/3"]);
    confirm(&bookings, &morning).await;

    let afternoon = fixtures::paid_inquiry(&fixtures::hourly_service(), &["2025/6/3"], "14:00");
    store.add_inquiry(afternoon.clone());
    confirm(&bookings, &afternoon).await;

    let bucket = june_bucket(&store);
    assert_eq!(bucket.entries_for(&morning.id).count(), 1);
    assert_eq!(bucket.entries_for(&afternoon.id).count(), 1);
    assert_eq!(bucket.day_count(day(3)), 2);
}

#[tokio::test]
async fn failed_commit_leaves_the_inquiry_paid() {
    let store = InMemoryDocumentStore::new();
    store.add_service(fixtures::hourly_service());
    let inquiry = hourly_inquiry(&store, &["2025/6/10"]);
    store.fail_next_commits(1);

    let err = booking_service(&store, CapacityPolicy::Unenforced)
        .create_booking(&inquiry.id)
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(store.inquiry(&inquiry.id).unwrap().status, InquiryStatus::Paid);
    assert_eq!(store.bucket_count(), 0);
    assert!(store.outbox().is_empty());
}

#[tokio::test]
async fn repeated_request_is_a_no_op() {
    let store = InMemoryDocumentStore::new();
    store.add_service(fixtures::hourly_service());
    let bookings = booking_service(&store, CapacityPolicy::Unenforced);
    let inquiry = hourly_inquiry(&store, &["2025/6/10"]);

    let code = confirm(&bookings, &inquiry).await;
    let again = bookings.create_booking(&inquiry.id).await.unwrap();

    assert_eq!(
        again,
        BookingOutcome::AlreadyConfirmed {
            inquiry_id: inquiry.id.clone(),
            confirmation_code: Some(code),
        }
    );
    assert_eq!(june_bucket(&store).total_count(), 1);
}

#[tokio::test]
async fn capacity_is_only_enforced_when_configured() {
    let store = InMemoryDocumentStore::new();
    store.add_service(fixtures::hourly_service());

    let capped = |store: &InMemoryDocumentStore| {
        let mut inquiry =
            fixtures::paid_inquiry(&fixtures::hourly_service(), &["2025/6/10"], "09:00");
        inquiry.selected_variant.max_reservation_per_day = 1;
        store.add_inquiry(inquiry.clone());
        inquiry
    };

    let lenient = booking_service(&store, CapacityPolicy::Unenforced);
    confirm(&lenient, &capped(&store)).await;
    confirm(&lenient, &capped(&store)).await;
    assert_eq!(june_bucket(&store).day_count(day(10)), 2);

    let strict = booking_service(&store, CapacityPolicy::RejectWhenFull);
    let rejected = capped(&store);
    let err = strict.create_booking(&rejected.id).await.unwrap_err();
    assert!(matches!(err, BookingError::Merge(_)));
    assert!(!err.is_transient());
    assert_eq!(store.inquiry(&rejected.id).unwrap().status, InquiryStatus::Paid);
}
