//! Message handlers.
//!
//! [`MessageHandler`] takes the raw [`BusMessage`] so the consumer stays
//! independent of payload types. Each handler decodes what it expects.

use crate::app::{BookingError, BookingOutcome, BookingService};
use async_trait::async_trait;
use slotbook_core::message_bus::{BookingCreationRequest, BusMessage};
use slotbook_core::store::DeadLetterStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Error returned by a [`MessageHandler`].
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processes one message from the bus.
///
/// Errors are logged by the consumer, which then moves on to the next
/// message.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be processed and could not
    /// be set aside either.
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError>;
}

/// Runs [`BookingService::create_booking`] for each booking creation request.
///
/// Transient store failures are retried with linear backoff. Malformed
/// payloads, permanent failures and exhausted retries are written to the
/// dead-letter store, after which the message counts as handled.
pub struct BookingCreationHandler {
    bookings: BookingService,
    dead_letters: Arc<dyn DeadLetterStore>,
    max_attempts: u32,
    backoff: Duration,
}

impl BookingCreationHandler {
    /// Create a handler making up to `max_attempts` attempts per message.
    #[must_use]
    pub fn new(
        bookings: BookingService,
        dead_letters: Arc<dyn DeadLetterStore>,
        max_attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            bookings,
            dead_letters,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    async fn create_with_retry(
        &self,
        request: &BookingCreationRequest,
    ) -> Result<BookingOutcome, BookingError> {
        let mut attempt = 1;
        loop {
            match self.bookings.create_booking(&request.inquiry_id).await {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        inquiry_id = %request.inquiry_id,
                        attempt,
                        error = %e,
                        "Booking attempt failed, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn dead_letter(&self, message: &BusMessage, reason: &str) -> Result<(), HandlerError> {
        error!(
            topic = %message.topic,
            key = ?message.key,
            reason,
            "Dead-lettering booking request"
        );
        self.dead_letters
            .record(&message.topic, &message.payload, reason)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl MessageHandler for BookingCreationHandler {
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        let request = match BookingCreationRequest::from_payload(&message.payload) {
            Ok(request) => request,
            Err(e) => return self.dead_letter(message, &e.to_string()).await,
        };

        match self.create_with_retry(&request).await {
            Ok(BookingOutcome::Created { confirmation_code, .. }) => {
                info!(
                    inquiry_id = %request.inquiry_id,
                    %confirmation_code,
                    "Booking request processed"
                );
                Ok(())
            }
            Ok(BookingOutcome::AlreadyConfirmed { .. }) => {
                info!(inquiry_id = %request.inquiry_id, "Duplicate booking request ignored");
                Ok(())
            }
            Err(e) => self.dead_letter(message, &e.to_string()).await,
        }
    }
}
