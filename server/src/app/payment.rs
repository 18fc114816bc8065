//! Payment gateway callback reconciliation.
//!
//! A verified settlement moves the inquiry `AwaitingPayment → Paid` and
//! publishes a [`BookingCreationRequest`]. Gateways redeliver callbacks, so a
//! callback for an inquiry that is already `Paid` publishes again (the booking
//! consumer ignores duplicates) and one for a `Confirmed` inquiry does nothing.
//! The `Paid` write is conditioned on the stored status, so two callbacks
//! racing on one inquiry resolve to one `Paid` and one `AlreadyPaid`.

use crate::metrics;
use crate::signature::{SignatureError, SignatureVerifier};
use serde::Deserialize;
use slotbook_core::environment::Clock;
use slotbook_core::ids::InquiryId;
use slotbook_core::inquiry::{Inquiry, InquiryStatus, TransitionError};
use slotbook_core::message_bus::{BookingCreationRequest, MessageBus, MessageBusError};
use slotbook_core::store::{InquiryStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Body returned to the gateway once a callback is accepted.
pub const CALLBACK_ACK: &str = "thanks! <3 callback received";

/// Transaction statuses that mean the money has been captured.
const SETTLED_STATUSES: [&str; 2] = ["capture", "settlement"];

/// Notification posted by the payment gateway.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentCallback {
    /// Inquiry id used as the gateway order id
    pub order_id: String,
    /// Gateway transaction status
    pub transaction_status: String,
    /// Gateway status code
    pub status_code: String,
    /// Amount, as the decimal string the gateway signs
    pub gross_amount: String,
    /// Fraud screening result
    #[serde(default)]
    pub fraud_status: Option<String>,
    /// SHA-512 signature
    #[serde(default)]
    pub signature_key: String,
}

impl PaymentCallback {
    fn is_settled(&self) -> bool {
        SETTLED_STATUSES.contains(&self.transaction_status.as_str())
            && self.fraud_status.as_deref().is_none_or(|status| status == "accept")
    }
}

/// What a callback did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The inquiry was marked paid and booking was requested.
    Paid,
    /// The inquiry was already paid; booking was requested again.
    AlreadyPaid,
    /// The booking already exists; nothing to do.
    AlreadyConfirmed,
    /// The transaction status does not settle anything.
    Ignored {
        /// Status reported by the gateway
        status: String,
    },
}

impl CallbackOutcome {
    /// Metric label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::AlreadyPaid => "already_paid",
            Self::AlreadyConfirmed => "already_confirmed",
            Self::Ignored { .. } => "ignored",
        }
    }
}

/// Errors from callback handling.
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Signature missing or wrong
    #[error(transparent)]
    InvalidSignature(#[from] SignatureError),

    /// No inquiry with the callback's order id
    #[error("Inquiry {0} not found")]
    InquiryNotFound(InquiryId),

    /// Illegal lifecycle transition
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The booking request could not be published
    #[error(transparent)]
    Publish(#[from] MessageBusError),
}

/// Applies verified payment callbacks to inquiries.
#[derive(Clone)]
pub struct PaymentReconciler {
    inquiries: Arc<dyn InquiryStore>,
    bus: Arc<dyn MessageBus>,
    verifier: SignatureVerifier,
    booking_topic: String,
    clock: Arc<dyn Clock>,
}

impl PaymentReconciler {
    /// Create a reconciler publishing to `booking_topic`.
    #[must_use]
    pub fn new(
        inquiries: Arc<dyn InquiryStore>,
        bus: Arc<dyn MessageBus>,
        verifier: SignatureVerifier,
        booking_topic: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inquiries,
            bus,
            verifier,
            booking_topic: booking_topic.into(),
            clock,
        }
    }

    /// Verify and apply one callback.
    ///
    /// The inquiry is persisted as `Paid` before the booking request is
    /// published; if publishing fails the error is returned so the gateway
    /// retries, and the retry publishes again.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::InvalidSignature`] before anything is read
    /// - [`PaymentError::InquiryNotFound`] for an unknown order id
    /// - [`PaymentError::Store`] / [`PaymentError::Publish`] on infrastructure failure
    #[tracing::instrument(
        skip(self, callback),
        fields(order_id = %callback.order_id, status = %callback.transaction_status)
    )]
    pub async fn handle(
        &self,
        callback: &PaymentCallback,
    ) -> Result<CallbackOutcome, PaymentError> {
        let result = self.reconcile(callback).await;
        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(PaymentError::InvalidSignature(_)) => "invalid_signature",
            Err(_) => "error",
        };
        metrics::record_payment_callback(label);
        result
    }

    async fn reconcile(&self, callback: &PaymentCallback) -> Result<CallbackOutcome, PaymentError> {
        self.verifier.verify(
            &callback.order_id,
            &callback.status_code,
            &callback.gross_amount,
            &callback.signature_key,
        )?;

        if !callback.is_settled() {
            info!("Callback does not settle the payment, ignoring");
            return Ok(CallbackOutcome::Ignored {
                status: callback.transaction_status.clone(),
            });
        }

        let inquiry_id = InquiryId::from_string(callback.order_id.clone());
        let mut inquiry = self
            .inquiries
            .get(&inquiry_id)
            .await?
            .ok_or_else(|| PaymentError::InquiryNotFound(inquiry_id.clone()))?;

        let outcome = match inquiry.status {
            InquiryStatus::Confirmed => {
                info!("Inquiry already confirmed");
                return Ok(CallbackOutcome::AlreadyConfirmed);
            }
            InquiryStatus::Paid => {
                warn!("Inquiry already paid, requesting booking again");
                CallbackOutcome::AlreadyPaid
            }
            InquiryStatus::AwaitingPayment => {
                inquiry.mark_paid(self.clock.now())?;
                match self
                    .inquiries
                    .update(inquiry.clone(), InquiryStatus::AwaitingPayment)
                    .await
                {
                    Ok(()) => CallbackOutcome::Paid,
                    Err(StoreError::StatusConflict { .. }) => {
                        let current = self
                            .inquiries
                            .get(&inquiry_id)
                            .await?
                            .ok_or_else(|| PaymentError::InquiryNotFound(inquiry_id.clone()))?;
                        if current.status == InquiryStatus::Confirmed {
                            info!("Inquiry confirmed concurrently");
                            return Ok(CallbackOutcome::AlreadyConfirmed);
                        }
                        warn!("Inquiry paid concurrently, requesting booking again");
                        inquiry = current;
                        CallbackOutcome::AlreadyPaid
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        self.request_booking(&inquiry).await?;
        info!(outcome = outcome.label(), "Payment reconciled");
        Ok(outcome)
    }

    async fn request_booking(&self, inquiry: &Inquiry) -> Result<(), MessageBusError> {
        let message = BookingCreationRequest {
            inquiry_id: inquiry.id.clone(),
        }
        .to_message(&self.booking_topic)?;
        self.bus.publish(&message).await
    }
}
