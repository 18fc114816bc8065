//! Use cases.
//!
//! Each service holds `Arc<dyn …>` handles to the ports it needs, so the same
//! code runs against `PostgreSQL` in production and the in-memory store in tests.

pub mod booking;
pub mod contact;
pub mod inquiry;
pub mod messages;
pub mod payment;
pub mod review;

pub use booking::{BookingError, BookingOutcome, BookingService};
pub use inquiry::{InquiryError, InquiryService};
pub use payment::{CallbackOutcome, PaymentCallback, PaymentError, PaymentReconciler};
pub use review::{ReviewError, ReviewService};

use slotbook_core::store::{
    BookingLedger, BookingStore, InquiryStore, NotificationOutbox, ReviewStore, ServiceCatalog,
};
use std::sync::Arc;

/// Every store port, usually backed by one implementation.
#[derive(Clone)]
pub struct Repositories {
    /// Booking buckets
    pub bookings: Arc<dyn BookingStore>,
    /// Inquiries
    pub inquiries: Arc<dyn InquiryStore>,
    /// Service catalog
    pub services: Arc<dyn ServiceCatalog>,
    /// Reviews
    pub reviews: Arc<dyn ReviewStore>,
    /// Booking unit of work
    pub ledger: Arc<dyn BookingLedger>,
    /// Notification outbox
    pub outbox: Arc<dyn NotificationOutbox>,
}

impl Repositories {
    /// Use one store for every port.
    #[must_use]
    pub fn from_store<S>(store: S) -> Self
    where
        S: BookingStore
            + InquiryStore
            + ServiceCatalog
            + ReviewStore
            + BookingLedger
            + NotificationOutbox
            + 'static,
    {
        let store = Arc::new(store);
        Self {
            bookings: store.clone(),
            inquiries: store.clone(),
            services: store.clone(),
            reviews: store.clone(),
            ledger: store.clone(),
            outbox: store,
        }
    }
}
