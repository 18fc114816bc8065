//! Inquiries: a guest's request to book a service on one or more dates.
//!
//! Lifecycle:
//!
//! ```text
//! AwaitingPayment --(settlement callback)--> Paid --(booking created)--> Confirmed
//!                                                                          |
//!                                                            review_made = true
//! ```

use crate::ids::{ConfirmationCode, InquiryId, ServiceId};
use crate::service::{MeasurementUnit, ServiceVariant};
use crate::slot::{HourSlot, SelectedDate};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Inquiry status, stored as its integer code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum InquiryStatus {
    /// Created; waiting for the payment gateway
    AwaitingPayment,
    /// Settlement received; booking not yet issued
    Paid,
    /// Booking issued with a confirmation code
    Confirmed,
}

const STATUS_TABLE: [(InquiryStatus, u8, &str); 3] = [
    (InquiryStatus::AwaitingPayment, 0, "Menunggu Pembayaran"),
    (InquiryStatus::Paid, 2, "Sudah Dibayar"),
    (InquiryStatus::Confirmed, 3, "Kode Booking Terbit"),
];

impl InquiryStatus {
    /// Integer code
    #[must_use]
    pub const fn code(self) -> u8 {
        STATUS_TABLE[self as usize].1
    }

    /// Display label shown to guests
    #[must_use]
    pub const fn label(self) -> &'static str {
        STATUS_TABLE[self as usize].2
    }
}

impl TryFrom<u8> for InquiryStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        STATUS_TABLE
            .iter()
            .find(|(_, table_code, _)| *table_code == code)
            .map(|(status, ..)| *status)
            .ok_or_else(|| format!("unknown inquiry status {code}"))
    }
}

impl From<InquiryStatus> for u8 {
    fn from(status: InquiryStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for InquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Illegal lifecycle transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Inquiry {inquiry_id} cannot go from {from:?} to {to}")]
pub struct TransitionError {
    /// Inquiry concerned
    pub inquiry_id: InquiryId,
    /// Current status
    pub from: InquiryStatus,
    /// Attempted target
    pub to: &'static str,
}

/// Guest contact details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Full name
    pub full_name: String,
    /// Phone number in `62…` form
    pub phone_number: String,
    /// Email address
    pub email: String,
}

/// A booking request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inquiry {
    /// Inquiry id
    pub id: InquiryId,
    /// Service being booked
    pub service_id: ServiceId,
    /// Selected dates, in the order the guest chose them
    pub selected_dates: Vec<SelectedDate>,
    /// 1-based variant position
    pub selected_variant_id: String,
    /// Variant snapshot at creation time
    pub selected_variant: ServiceVariant,
    /// Selected hour slot (`"00:00"` for whole-day units)
    pub selected_hour: HourSlot,
    /// Guest contact
    pub contact: ContactInfo,
    /// Registered user, if any
    #[serde(default)]
    pub user_id: Option<String>,
    /// Lifecycle status
    pub status: InquiryStatus,
    /// Issued once confirmed
    #[serde(default)]
    pub confirmation_code: Option<ConfirmationCode>,
    /// Whether the guest has reviewed this booking
    #[serde(default)]
    pub review_made: bool,
    /// Dates times variant price
    pub total_payment: u64,
    /// Measurement unit of the service at creation time
    pub measurement_unit: MeasurementUnit,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Inquiry {
    /// Record a settled payment.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the inquiry is awaiting payment.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != InquiryStatus::AwaitingPayment {
            return Err(self.transition_error("Paid"));
        }
        self.status = InquiryStatus::Paid;
        self.updated_at = now;
        Ok(())
    }

    /// Issue the booking with its confirmation code.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the inquiry is paid.
    pub fn confirm(
        &mut self,
        code: ConfirmationCode,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status != InquiryStatus::Paid {
            return Err(self.transition_error("Confirmed"));
        }
        self.status = InquiryStatus::Confirmed;
        self.confirmation_code = Some(code);
        self.updated_at = now;
        Ok(())
    }

    /// Flag that the guest reviewed the booking.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the review window is not open.
    pub fn mark_reviewed(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.review_available(now) {
            return Err(self.transition_error("Reviewed"));
        }
        self.review_made = true;
        self.updated_at = now;
        Ok(())
    }

    /// Last selected date in calendar order.
    #[must_use]
    pub fn last_date(&self) -> Option<SelectedDate> {
        self.selected_dates.iter().max().copied()
    }

    /// Whether the guest may review now: the booking is confirmed, not yet
    /// reviewed, and the last booked day has fully passed.
    #[must_use]
    pub fn review_available(&self, now: DateTime<Utc>) -> bool {
        if self.status != InquiryStatus::Confirmed || self.review_made {
            return false;
        }
        self.last_date()
            .and_then(|date| date.date().and_hms_opt(0, 0, 0))
            .is_some_and(|start| now > start.and_utc() + Duration::days(1))
    }

    fn transition_error(&self, to: &'static str) -> TransitionError {
        TransitionError {
            inquiry_id: self.id.clone(),
            from: self.status,
            to,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn inquiry(status: InquiryStatus) -> Inquiry {
        let created = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
        Inquiry {
            id: InquiryId::from_string("inq-1"),
            service_id: ServiceId::from_string("svc-1"),
            selected_dates: vec![
                SelectedDate::parse("2025/6/2").unwrap(),
                SelectedDate::parse("2025/6/1").unwrap(),
            ],
            selected_variant_id: "1".into(),
            selected_variant: ServiceVariant {
                price: 150_000,
                duration: 1,
                pax: 2,
                max_reservation_per_day: 0,
            },
            selected_hour: HourSlot::whole_day(),
            contact: ContactInfo {
                full_name: "Ayu".into(),
                phone_number: "628123456789".into(),
                email: "ayu@example.com".into(),
            },
            user_id: Some("user-1".into()),
            status,
            confirmation_code: None,
            review_made: false,
            total_payment: 300_000,
            measurement_unit: MeasurementUnit::Days,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn status_serializes_as_code() {
        assert_eq!(serde_json::to_string(&InquiryStatus::Paid).unwrap(), "2");
        let status: InquiryStatus = serde_json::from_str("3").unwrap();
        assert_eq!(status, InquiryStatus::Confirmed);
        assert!(serde_json::from_str::<InquiryStatus>("1").is_err());
        assert_eq!(InquiryStatus::AwaitingPayment.label(), "Menunggu Pembayaran");
    }

    #[test]
    fn lifecycle_happy_path() {
        let now = Utc::now();
        let mut inquiry = inquiry(InquiryStatus::AwaitingPayment);
        inquiry.mark_paid(now).unwrap();
        assert_eq!(inquiry.status, InquiryStatus::Paid);

        inquiry.confirm(ConfirmationCode::from_string("abc1234"), now).unwrap();
        assert_eq!(inquiry.status, InquiryStatus::Confirmed);
        assert_eq!(inquiry.confirmation_code.unwrap().as_str(), "ABC1234");
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let now = Utc::now();
        assert!(inquiry(InquiryStatus::Paid).mark_paid(now).is_err());
        assert!(inquiry(InquiryStatus::Confirmed).mark_paid(now).is_err());
        assert!(
            inquiry(InquiryStatus::AwaitingPayment)
                .confirm(ConfirmationCode::generate(), now)
                .is_err()
        );
    }

    #[test]
    fn review_window_opens_after_last_day() {
        let confirmed = inquiry(InquiryStatus::Confirmed);
        let during = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 6, 3, 0, 1, 0).unwrap();

        assert_eq!(confirmed.last_date().unwrap().to_string(), "2025/6/2");
        assert!(!confirmed.review_available(during));
        assert!(confirmed.review_available(after));
        assert!(!inquiry(InquiryStatus::Paid).review_available(after));

        let mut reviewed = confirmed;
        reviewed.mark_reviewed(after).unwrap();
        assert!(!reviewed.review_available(after));
        assert!(reviewed.mark_reviewed(after).is_err());
    }
}
