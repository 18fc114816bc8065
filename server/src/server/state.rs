//! Application state shared by every HTTP handler.

use crate::app::{InquiryService, PaymentReconciler, ReviewService};
use axum::extract::FromRef;
use slotbook_core::store::BookingStore;
use slotbook_web::ReadinessCheck;
use std::sync::Arc;

/// Handles to the use cases and read ports the API needs.
///
/// Cloned per request; every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Inquiry submission and lookup
    pub inquiries: Arc<InquiryService>,
    /// Review submission
    pub reviews: Arc<ReviewService>,
    /// Payment callback reconciliation
    pub payments: Arc<PaymentReconciler>,
    /// Booking calendar reads
    pub bookings: Arc<dyn BookingStore>,
    /// Dependencies checked by `/ready`
    pub dependencies: Arc<Vec<Arc<dyn ReadinessCheck>>>,
}

impl AppState {
    /// Create the state.
    #[must_use]
    pub fn new(
        inquiries: InquiryService,
        reviews: ReviewService,
        payments: PaymentReconciler,
        bookings: Arc<dyn BookingStore>,
        dependencies: Vec<Arc<dyn ReadinessCheck>>,
    ) -> Self {
        Self {
            inquiries: Arc::new(inquiries),
            reviews: Arc::new(reviews),
            payments: Arc::new(payments),
            bookings,
            dependencies: Arc::new(dependencies),
        }
    }
}

impl FromRef<AppState> for Arc<PaymentReconciler> {
    fn from_ref(state: &AppState) -> Self {
        state.payments.clone()
    }
}

impl FromRef<AppState> for Arc<InquiryService> {
    fn from_ref(state: &AppState) -> Self {
        state.inquiries.clone()
    }
}

impl FromRef<AppState> for Arc<ReviewService> {
    fn from_ref(state: &AppState) -> Self {
        state.reviews.clone()
    }
}
