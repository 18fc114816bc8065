//! Guest reviews.

use crate::app::Repositories;
use crate::metrics;
use serde::Deserialize;
use slotbook_core::environment::Clock;
use slotbook_core::ids::{InquiryId, ReviewId, ServiceId};
use slotbook_core::review::{InvalidScore, Review, Score};
use slotbook_core::store::{InquiryStore, ReviewCommit, ReviewStore, ServiceCatalog, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// A review as submitted.
#[derive(Clone, Debug, Deserialize)]
pub struct ReviewRequest {
    /// Booking being reviewed
    pub inquiry_id: InquiryId,
    /// Author; must own the inquiry
    pub user_id: String,
    /// Free text
    #[serde(default)]
    pub content: String,
    /// Score, 1 to 5
    pub score: i64,
}

/// Errors from review operations.
#[derive(Error, Debug)]
pub enum ReviewError {
    /// Score outside 1..=5
    #[error(transparent)]
    InvalidScore(#[from] InvalidScore),

    /// No inquiry with that id
    #[error("Inquiry {0} not found")]
    InquiryNotFound(InquiryId),

    /// The inquiry belongs to another user
    #[error("Inquiry {0} does not belong to this user")]
    NotOwner(InquiryId),

    /// The reviewed service no longer exists
    #[error("Service {0} not found")]
    ServiceNotFound(ServiceId),

    /// Not confirmed, not finished yet, or already reviewed
    #[error("Inquiry {0} cannot be reviewed")]
    NotReviewable(InquiryId),

    /// Persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Review use cases.
#[derive(Clone)]
pub struct ReviewService {
    inquiries: Arc<dyn InquiryStore>,
    services: Arc<dyn ServiceCatalog>,
    reviews: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    /// Create the service.
    #[must_use]
    pub fn new(repositories: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            inquiries: repositories.inquiries.clone(),
            services: repositories.services.clone(),
            reviews: repositories.reviews.clone(),
            clock,
        }
    }

    /// Store a review and add its score to the service totals.
    ///
    /// # Errors
    ///
    /// See [`ReviewError`]; nothing is written on error.
    #[tracing::instrument(skip(self, request), fields(inquiry_id = %request.inquiry_id))]
    pub async fn create_review(&self, request: ReviewRequest) -> Result<ReviewId, ReviewError> {
        let score = Score::try_from(request.score)?;

        let mut inquiry = self
            .inquiries
            .get(&request.inquiry_id)
            .await?
            .ok_or_else(|| ReviewError::InquiryNotFound(request.inquiry_id.clone()))?;
        if inquiry.user_id.as_deref() != Some(request.user_id.as_str()) {
            return Err(ReviewError::NotOwner(inquiry.id));
        }
        if self.services.get(&inquiry.service_id).await?.is_none() {
            return Err(ReviewError::ServiceNotFound(inquiry.service_id));
        }

        let now = self.clock.now();
        inquiry
            .mark_reviewed(now)
            .map_err(|_| ReviewError::NotReviewable(inquiry.id.clone()))?;

        let review = Review {
            id: ReviewId::new(),
            service_id: inquiry.service_id.clone(),
            inquiry_id: inquiry.id.clone(),
            user_id: request.user_id,
            content: request.content.trim().to_string(),
            score,
            created_at: now,
        };
        let id = review.id.clone();
        self.reviews.commit(ReviewCommit { review, inquiry }).await?;

        metrics::record_review_created(score.value());
        info!(review_id = %id, score = score.value(), "Review created");
        Ok(id)
    }

    /// Best review of a service, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Store`] if the read fails.
    pub async fn top_review(&self, service_id: &ServiceId) -> Result<Option<Review>, ReviewError> {
        Ok(self.reviews.top_for_service(service_id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use slotbook_testing::{FixedClock, InMemoryDocumentStore, fixtures};

    fn setup() -> (InMemoryDocumentStore, FixedClock, ReviewService) {
        let store = InMemoryDocumentStore::new();
        store.add_service(fixtures::service());
        let clock = FixedClock::new(fixtures::created_at() + chrono::Duration::days(60));
        let repositories = Repositories::from_store(store.clone());
        let service = ReviewService::new(&repositories, Arc::new(clock.clone()));
        (store, clock, service)
    }

    fn request(inquiry_id: &InquiryId, score: i64) -> ReviewRequest {
        ReviewRequest {
            inquiry_id: inquiry_id.clone(),
            user_id: "user-1".to_string(),
            content: "Lovely morning on the water".to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn review_updates_totals_once() {
        let (store, _clock, reviews) = setup();
        let inquiry = fixtures::confirmed_inquiry(&fixtures::service(), &["2025/6/10"]);
        store.add_inquiry(inquiry.clone());

        reviews.create_review(request(&inquiry.id, 4)).await.unwrap();

        let service = store.service(&inquiry.service_id).unwrap();
        assert_eq!((service.total_score, service.review_count), (4, 1));
        assert!(store.inquiry(&inquiry.id).unwrap().review_made);

        let err = reviews.create_review(request(&inquiry.id, 5)).await.unwrap_err();
        assert!(matches!(err, ReviewError::NotReviewable(_)));
        assert_eq!(store.reviews().len(), 1);

        let top = reviews.top_review(&inquiry.service_id).await.unwrap().unwrap();
        assert_eq!(top.score.value(), 4);
    }

    #[tokio::test]
    async fn only_finished_confirmed_bookings_are_reviewable() {
        let (store, clock, reviews) = setup();
        let paid = fixtures::paid_inquiry(&fixtures::service(), &["2025/6/10"], "");
        let upcoming = fixtures::confirmed_inquiry(&fixtures::service(), &["2025/9/1"]);
        store.add_inquiry(paid.clone());
        store.add_inquiry(upcoming.clone());

        for id in [&paid.id, &upcoming.id] {
            let err = reviews.create_review(request(id, 5)).await.unwrap_err();
            assert!(matches!(err, ReviewError::NotReviewable(_)));
        }

        clock.advance(chrono::Duration::days(120));
        assert!(reviews.create_review(request(&upcoming.id, 5)).await.is_ok());
    }

    #[tokio::test]
    async fn ownership_and_score_are_checked() {
        let (store, _clock, reviews) = setup();
        let inquiry = fixtures::confirmed_inquiry(&fixtures::service(), &["2025/6/10"]);
        store.add_inquiry(inquiry.clone());

        let err = reviews.create_review(request(&inquiry.id, 0)).await.unwrap_err();
        assert!(matches!(err, ReviewError::InvalidScore(_)));

        let mut stranger = request(&inquiry.id, 5);
        stranger.user_id = "user-2".to_string();
        let err = reviews.create_review(stranger).await.unwrap_err();
        assert!(matches!(err, ReviewError::NotOwner(_)));

        let err = reviews
            .create_review(request(&InquiryId::from_string("ghost"), 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::InquiryNotFound(_)));
        assert!(store.reviews().is_empty());
    }
}
