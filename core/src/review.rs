//! Guest reviews of completed bookings.

use crate::ids::{InquiryId, ReviewId, ServiceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Score outside 1..=5.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Score must be between 1 and 5, got {0}")]
pub struct InvalidScore(pub i64);

/// A review score between 1 and 5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    /// The score value
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = InvalidScore;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(score @ 1..=5) => Ok(Self(score)),
            _ => Err(InvalidScore(value)),
        }
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// A review left for a service after a confirmed booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Review id
    pub id: ReviewId,
    /// Reviewed service
    pub service_id: ServiceId,
    /// Booking being reviewed
    pub inquiry_id: InquiryId,
    /// Author
    pub user_id: String,
    /// Free text
    pub content: String,
    /// Score
    pub score: Score,
    /// Creation time
    pub created_at: DateTime<Utc>,
}
