//! Inquiry endpoints.
//!
//! - POST /api/inquiries
//! - GET /api/inquiries/:id
//! - GET /api/inquiries/:id/contact

use crate::app::contact::MaskedContact;
use crate::app::inquiry::{InquiryDetails, InquiryRequest};
use crate::app::{InquiryError, InquiryService};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use slotbook_core::ids::InquiryId;
use slotbook_web::AppError;
use std::sync::Arc;

impl From<InquiryError> for AppError {
    fn from(err: InquiryError) -> Self {
        match err {
            InquiryError::ServiceNotFound(slug) => Self::not_found("Service", slug),
            InquiryError::InquiryNotFound(id) => Self::not_found("Inquiry", id),
            InquiryError::Validation(message) => Self::validation(message),
            err @ (InquiryError::PriceChanged | InquiryError::HourNotAvailable(_)) => {
                Self::conflict(err.to_string())
            }
            InquiryError::Store(e) => e.into(),
        }
    }
}

/// Response to a created inquiry.
#[derive(Debug, Serialize)]
pub struct CreatedInquiry {
    /// New inquiry id, also the payment order id
    pub inquiry_id: InquiryId,
}

/// Submit a booking request. The guest receives a payment link.
pub async fn create_inquiry(
    State(inquiries): State<Arc<InquiryService>>,
    Json(request): Json<InquiryRequest>,
) -> Result<(StatusCode, Json<CreatedInquiry>), AppError> {
    let inquiry_id = inquiries.create_inquiry(request).await?;
    Ok((StatusCode::CREATED, Json(CreatedInquiry { inquiry_id })))
}

/// Booking status page data.
pub async fn get_inquiry(
    State(inquiries): State<Arc<InquiryService>>,
    Path(id): Path<String>,
) -> Result<Json<InquiryDetails>, AppError> {
    Ok(Json(inquiries.get_inquiry(&InquiryId::from_string(id)).await?))
}

/// Masked guest contact, shown before payment.
pub async fn get_contact(
    State(inquiries): State<Arc<InquiryService>>,
    Path(id): Path<String>,
) -> Result<Json<MaskedContact>, AppError> {
    Ok(Json(inquiries.masked_contact(&InquiryId::from_string(id)).await?))
}
