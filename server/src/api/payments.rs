//! Payment gateway callback endpoint.
//!
//! - POST /api/payments/callback

use crate::app::{PaymentCallback, PaymentError, PaymentReconciler};
use crate::app::payment::CALLBACK_ACK;
use axum::{Json, extract::State, http::StatusCode};
use slotbook_web::AppError;
use std::sync::Arc;

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidSignature(e) => Self::bad_request(e.to_string()),
            PaymentError::InquiryNotFound(id) => Self::not_found("Inquiry", id),
            PaymentError::Transition(e) => Self::conflict(e.to_string()),
            PaymentError::Store(e) => e.into(),
            PaymentError::Publish(e) => {
                Self::unavailable("Booking request could not be queued")
                    .with_source(anyhow::Error::new(e))
            }
        }
    }
}

/// Receive a payment notification.
///
/// Answers 200 for every verified callback, including ones that change
/// nothing, so the gateway stops redelivering. Any error status makes the
/// gateway retry.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/payments/callback \
///   -H 'Content-Type: application/json' \
///   -d '{"order_id":"01hz...","transaction_status":"settlement","status_code":"200",
///        "gross_amount":"300000.00","signature_key":"<sha512>"}'
/// ```
pub async fn payment_callback(
    State(payments): State<Arc<PaymentReconciler>>,
    Json(callback): Json<PaymentCallback>,
) -> Result<(StatusCode, &'static str), AppError> {
    payments.handle(&callback).await?;
    Ok((StatusCode::OK, CALLBACK_ACK))
}
