//! Review endpoints.
//!
//! - POST /api/reviews
//! - GET /api/services/:id/top-review

use crate::app::review::ReviewRequest;
use crate::app::{ReviewError, ReviewService};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use slotbook_core::ids::{ReviewId, ServiceId};
use slotbook_core::review::Review;
use slotbook_web::AppError;
use std::sync::Arc;

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::InvalidScore(e) => Self::validation(e.to_string()),
            ReviewError::InquiryNotFound(id) => Self::not_found("Inquiry", id),
            ReviewError::ServiceNotFound(id) => Self::not_found("Service", id),
            ReviewError::NotOwner(_) => Self::forbidden(err.to_string()),
            ReviewError::NotReviewable(_) => Self::conflict(err.to_string()),
            ReviewError::Store(e) => e.into(),
        }
    }
}

/// Response to a created review.
#[derive(Debug, Serialize)]
pub struct CreatedReview {
    /// New review id
    pub review_id: ReviewId,
}

/// Review a finished booking.
pub async fn create_review(
    State(reviews): State<Arc<ReviewService>>,
    Json(request): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<CreatedReview>), AppError> {
    let review_id = reviews.create_review(request).await?;
    Ok((StatusCode::CREATED, Json(CreatedReview { review_id })))
}

/// Best review of a service; 404 when it has none.
pub async fn get_top_review(
    State(reviews): State<Arc<ReviewService>>,
    Path(id): Path<String>,
) -> Result<Json<Review>, AppError> {
    let service_id = ServiceId::from_string(id);
    reviews
        .top_review(&service_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Review for service", service_id))
}
