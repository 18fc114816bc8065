//! Business metrics for Slotbook.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `slotbook_bookings_total{status}` - Booking attempts by outcome
//!   (`created`, `already_confirmed`, `failed`)
//! - `slotbook_booking_slots_total` - Slot entries appended
//! - `slotbook_payment_callbacks_total{outcome}` - Payment callbacks by outcome
//! - `slotbook_inquiries_created_total` - Inquiries submitted
//! - `slotbook_reviews_created_total` - Reviews submitted
//! - `slotbook_notifications_total{status}` - Outbox deliveries (`sent`, `failed`)
//! - `slotbook_messages_total{consumer, status}` - Bus messages handled
//!
//! ## Histograms
//! - `slotbook_booking_duration_seconds` - Time to create one booking

use metrics::{describe_counter, describe_histogram};

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "slotbook_bookings_total",
        "Booking creation attempts by outcome (created, already_confirmed, failed)"
    );
    describe_counter!(
        "slotbook_booking_slots_total",
        "Slot entries appended to booking buckets"
    );
    describe_histogram!(
        "slotbook_booking_duration_seconds",
        "Time taken to create one booking"
    );

    describe_counter!(
        "slotbook_payment_callbacks_total",
        "Payment callbacks by outcome (paid, already_paid, already_confirmed, ignored, rejected)"
    );

    describe_counter!("slotbook_inquiries_created_total", "Inquiries submitted");
    describe_counter!("slotbook_reviews_created_total", "Reviews submitted");

    describe_counter!(
        "slotbook_notifications_total",
        "Notification deliveries by status (sent, failed)"
    );
    describe_counter!(
        "slotbook_messages_total",
        "Bus messages handled by consumer and status (handled, failed, dead_lettered)"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a created booking.
///
/// # Arguments
///
/// * `slots` - Number of slot entries appended
/// * `duration_secs` - Time taken in seconds
pub fn record_booking_created(slots: usize, duration_secs: f64) {
    metrics::counter!("slotbook_bookings_total", "status" => "created").increment(1);
    metrics::counter!("slotbook_booking_slots_total")
        .increment(u64::try_from(slots).unwrap_or(u64::MAX));
    metrics::histogram!("slotbook_booking_duration_seconds").record(duration_secs);
    tracing::debug!(slots, duration_secs, "Recorded booking_created metric");
}

/// Record a redelivered request for an already confirmed inquiry.
pub fn record_booking_already_confirmed() {
    metrics::counter!("slotbook_bookings_total", "status" => "already_confirmed").increment(1);
}

/// Record a failed booking.
pub fn record_booking_failed() {
    metrics::counter!("slotbook_bookings_total", "status" => "failed").increment(1);
}

/// Record a payment callback outcome.
pub fn record_payment_callback(outcome: &'static str) {
    metrics::counter!("slotbook_payment_callbacks_total", "outcome" => outcome).increment(1);
}

/// Record a submitted inquiry.
pub fn record_inquiry_created() {
    metrics::counter!("slotbook_inquiries_created_total").increment(1);
}

/// Record a submitted review.
pub fn record_review_created(score: u8) {
    metrics::counter!("slotbook_reviews_created_total").increment(1);
    tracing::debug!(score, "Recorded review_created metric");
}

/// Record one outbox delivery attempt.
pub fn record_notification(delivered: bool) {
    let status = if delivered { "sent" } else { "failed" };
    metrics::counter!("slotbook_notifications_total", "status" => status).increment(1);
}

/// Record one consumed bus message.
pub fn record_message(consumer: &str, status: &'static str) {
    metrics::counter!(
        "slotbook_messages_total",
        "consumer" => consumer.to_string(),
        "status" => status
    )
    .increment(1);
}
