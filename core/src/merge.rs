//! Booking merge algorithm.
//!
//! Given a paid inquiry and whatever aggregate documents already exist for its
//! buckets, produce:
//!
//! - the post-merge state of every touched bucket (for reads and tests), and
//! - the list of [`SlotAppend`] operations to persist.
//!
//! Persisting the appends, not the merged documents, is what keeps two
//! concurrent merges into the same bucket from overwriting each other.

use crate::aggregate::{Booking, BucketKey, ServiceBookings, SlotAppend};
use crate::ids::ConfirmationCode;
use crate::inquiry::Inquiry;
use crate::slot::{DayKey, derive_year_months};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

/// Whether the variant's daily cap is enforced when merging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Any number of bookings may share a day.
    #[default]
    Unenforced,
    /// Reject a booking that would push a day past `max_reservation_per_day`.
    RejectWhenFull,
}

impl CapacityPolicy {
    /// Daily limit to enforce for a variant cap, if any. A cap of `0` means
    /// unlimited.
    #[must_use]
    pub const fn limit_for(self, max_reservation_per_day: u32) -> Option<u32> {
        match self {
            Self::Unenforced => None,
            Self::RejectWhenFull if max_reservation_per_day == 0 => None,
            Self::RejectWhenFull => Some(max_reservation_per_day),
        }
    }
}

impl FromStr for CapacityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "unenforced" | "off" => Ok(Self::Unenforced),
            "reject_when_full" | "reject" | "enforce" => Ok(Self::RejectWhenFull),
            other => Err(format!("unknown capacity policy '{other}'")),
        }
    }
}

/// Errors raised while merging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// The inquiry selects no dates.
    #[error("Inquiry has no selected dates")]
    NoDates,

    /// A day is already at its booking cap.
    #[error("Day {day} of {bucket} is full ({limit} bookings per day)")]
    CapacityExceeded {
        /// Bucket concerned
        bucket: BucketKey,
        /// Full day
        day: DayKey,
        /// Configured cap
        limit: u32,
    },
}

/// Result of merging one inquiry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Post-merge state of every touched bucket, in calendar order
    pub aggregates: Vec<ServiceBookings>,
    /// Writes to persist, in selected-date order
    pub appends: Vec<SlotAppend>,
    /// Buckets that did not exist before this merge
    pub created: Vec<BucketKey>,
    /// Code shared by every appended entry
    pub confirmation_code: ConfirmationCode,
    /// Daily cap the store must re-check when persisting, if enforced
    pub day_limit: Option<u32>,
}

/// Merge an inquiry into its bucket documents.
///
/// `existing` may contain any subset of the inquiry's buckets; documents for
/// other buckets are ignored. Missing buckets are created empty. Every selected
/// date produces exactly one entry carrying `code`.
///
/// # Errors
///
/// - [`MergeError::NoDates`] if the inquiry selects no dates
/// - [`MergeError::CapacityExceeded`] if `policy` enforces the variant's daily
///   cap and a day would exceed it
pub fn merge_inquiry(
    inquiry: &Inquiry,
    existing: Vec<ServiceBookings>,
    code: ConfirmationCode,
    policy: CapacityPolicy,
) -> Result<MergeOutcome, MergeError> {
    if inquiry.selected_dates.is_empty() {
        return Err(MergeError::NoDates);
    }

    let service_id = &inquiry.service_id;
    let variant_pax = inquiry.selected_variant.pax;

    let mut buckets: BTreeMap<_, ServiceBookings> = existing
        .into_iter()
        .filter(|doc| &doc.service_id == service_id && doc.variant_pax == variant_pax)
        .map(|doc| (doc.year_month, doc))
        .collect();

    let wanted = derive_year_months(&inquiry.selected_dates);
    buckets.retain(|year_month, _| wanted.contains(year_month));

    let mut created = Vec::new();
    for &year_month in &wanted {
        buckets.entry(year_month).or_insert_with(|| {
            let key = BucketKey {
                service_id: service_id.clone(),
                variant_pax,
                year_month,
            };
            let doc = ServiceBookings::empty(&key);
            created.push(key);
            doc
        });
    }

    let day_limit = policy.limit_for(inquiry.selected_variant.max_reservation_per_day);
    let mut appends = Vec::with_capacity(inquiry.selected_dates.len());

    for date in &inquiry.selected_dates {
        let Some(doc) = buckets.get_mut(&date.year_month()) else {
            continue;
        };
        let append = SlotAppend {
            bucket: doc.key(),
            bucket_id: doc.id.clone(),
            day: date.day_key(),
            hour: inquiry.selected_hour.clone(),
            booking: Booking {
                confirmation_code: code.clone(),
                inquiry_id: inquiry.id.clone(),
            },
        };
        doc.apply(&append);

        if let Some(limit) = day_limit {
            if doc.day_count(append.day) > limit as usize {
                return Err(MergeError::CapacityExceeded {
                    bucket: append.bucket,
                    day: append.day,
                    limit,
                });
            }
        }
        appends.push(append);
    }

    Ok(MergeOutcome {
        aggregates: buckets.into_values().collect(),
        appends,
        created,
        confirmation_code: code,
        day_limit,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ids::{InquiryId, ServiceId};
    use crate::inquiry::{ContactInfo, InquiryStatus};
    use crate::service::{MeasurementUnit, ServiceVariant};
    use crate::slot::{HourSlot, SelectedDate, YearMonth};
    use chrono::Utc;

    fn inquiry(id: &str, dates: &[&str], hour: &str, cap: u32) -> Inquiry {
        let now = Utc::now();
        Inquiry {
            id: InquiryId::from_string(id),
            service_id: ServiceId::from_string("svc-1"),
            selected_dates: dates.iter().map(|d| SelectedDate::parse(d).unwrap()).collect(),
            selected_variant_id: "1".into(),
            selected_variant: ServiceVariant {
                price: 100,
                duration: 1,
                pax: 2,
                max_reservation_per_day: cap,
            },
            selected_hour: HourSlot::normalise(hour),
            contact: ContactInfo {
                full_name: "Guest".into(),
                phone_number: "628100000000".into(),
                email: "guest@example.com".into(),
            },
            user_id: None,
            status: InquiryStatus::Paid,
            confirmation_code: None,
            review_made: false,
            total_payment: 100,
            measurement_unit: MeasurementUnit::Hours,
            created_at: now,
            updated_at: now,
        }
    }

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    fn merge(
        inquiry: &Inquiry,
        existing: Vec<ServiceBookings>,
        policy: CapacityPolicy,
    ) -> Result<MergeOutcome, MergeError> {
        merge_inquiry(inquiry, existing, ConfirmationCode::generate(), policy)
    }

    #[test]
    fn creates_buckets_across_months_with_one_code() {
        let inquiry = inquiry("I1", &["2025/6/30", "2025/7/1"], "", 0);
        let code = ConfirmationCode::from_string("CODE123");
        let outcome =
            merge_inquiry(&inquiry, vec![], code.clone(), CapacityPolicy::default()).unwrap();

        assert_eq!(outcome.aggregates.len(), 2);
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.aggregates[0].year_month, ym(2025, 6));
        assert_eq!(outcome.aggregates[1].year_month, ym(2025, 7));

        let june = &outcome.aggregates[0];
        let slot = june.slot("30".parse().unwrap(), &HourSlot::whole_day());
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].inquiry_id.as_str(), "I1");

        assert!(outcome.appends.iter().all(|a| a.booking.confirmation_code == code));
        assert_eq!(outcome.appends.len(), 2);
    }

    #[test]
    fn appends_after_existing_entries() {
        let first = inquiry("I1", &["2025/6/1"], "", 0);
        let existing = merge(&first, vec![], CapacityPolicy::Unenforced).unwrap().aggregates;

        let second = inquiry("I2", &["2025/6/1"], "", 0);
        let outcome = merge(&second, existing.clone(), CapacityPolicy::Unenforced).unwrap();

        assert!(outcome.created.is_empty());
        assert_eq!(outcome.aggregates[0].id, existing[0].id);
        let slot = outcome.aggregates[0].slot("1".parse().unwrap(), &HourSlot::whole_day());
        let ids: Vec<&str> = slot.iter().map(|b| b.inquiry_id.as_str()).collect();
        assert_eq!(ids, vec!["I1", "I2"]);
    }

    #[test]
    fn separate_hours_do_not_share_a_slot() {
        let other = inquiry("I0", &["2025/6/1"], "09:00", 0);
        let existing = merge(&other, vec![], CapacityPolicy::Unenforced).unwrap().aggregates;
        let later = inquiry("I1", &["2025/6/1"], "10:00", 0);
        let outcome = merge(&later, existing, CapacityPolicy::Unenforced).unwrap();
        let day = "1".parse().unwrap();
        assert_eq!(outcome.aggregates[0].slot(day, &HourSlot::normalise("09:00")).len(), 1);
        assert_eq!(outcome.aggregates[0].slot(day, &HourSlot::normalise("10:00")).len(), 1);
    }

    #[test]
    fn ignores_documents_of_other_buckets() {
        let stray = ServiceBookings::empty(&BucketKey {
            service_id: ServiceId::from_string("other"),
            variant_pax: 2,
            year_month: ym(2025, 6),
        });
        let inquiry = inquiry("I1", &["2025/6/1"], "", 0);
        let outcome = merge(&inquiry, vec![stray.clone()], CapacityPolicy::Unenforced).unwrap();
        assert_eq!(outcome.aggregates.len(), 1);
        assert_ne!(outcome.aggregates[0].id, stray.id);
    }

    #[test]
    fn unenforced_policy_allows_overbooking() {
        let mut docs = vec![];
        for id in ["A", "B", "C"] {
            let inquiry = inquiry(id, &["2025/6/1"], "", 1);
            docs = merge(&inquiry, docs, CapacityPolicy::Unenforced).unwrap().aggregates;
        }
        assert_eq!(docs[0].day_count("1".parse().unwrap()), 3);
    }

    #[test]
    fn reject_policy_stops_at_cap() {
        let first = inquiry("A", &["2025/6/1"], "", 1);
        let outcome = merge(&first, vec![], CapacityPolicy::RejectWhenFull).unwrap();
        assert_eq!(outcome.day_limit, Some(1));

        let second = inquiry("B", &["2025/6/1"], "", 1);
        let err = merge(&second, outcome.aggregates, CapacityPolicy::RejectWhenFull).unwrap_err();
        assert!(matches!(err, MergeError::CapacityExceeded { limit: 1, .. }));
    }

    #[test]
    fn zero_cap_means_unlimited() {
        assert_eq!(CapacityPolicy::RejectWhenFull.limit_for(0), None);
        assert_eq!(CapacityPolicy::Unenforced.limit_for(5), None);
        assert_eq!(
            "reject_when_full".parse::<CapacityPolicy>().unwrap(),
            CapacityPolicy::RejectWhenFull
        );
        assert!("sometimes".parse::<CapacityPolicy>().is_err());
    }

    #[test]
    fn empty_inquiry_is_rejected() {
        let inquiry = inquiry("I1", &[], "", 0);
        assert_eq!(
            merge(&inquiry, vec![], CapacityPolicy::Unenforced),
            Err(MergeError::NoDates)
        );
    }
}
