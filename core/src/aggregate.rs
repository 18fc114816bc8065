//! The booking aggregate: one document per `(service, variant pax, year-month)`.
//!
//! ```text
//! ServiceBookings { service_id, variant_pax, year_month: "2025/6" }
//!   bookings_by_date
//!     "1"  -> { "00:00" -> [Booking, Booking] }
//!     "14" -> { "09:00" -> [Booking], "10:30" -> [Booking] }
//! ```
//!
//! Documents are created lazily and only ever grow.

use crate::ids::{BookingsId, ConfirmationCode, InquiryId, ServiceId};
use crate::slot::{DayKey, HourSlot, YearMonth};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One booking entry inside a slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Booking {
    /// Code shared by all entries of the same inquiry
    pub confirmation_code: ConfirmationCode,
    /// Inquiry that produced this entry
    pub inquiry_id: InquiryId,
}

/// Bookings of one day, keyed by hour slot.
pub type BookingsByHour = BTreeMap<HourSlot, Vec<Booking>>;

/// Identity of an aggregate bucket.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    /// Service
    pub service_id: ServiceId,
    /// Variant pax
    pub variant_pax: u32,
    /// Calendar month
    pub year_month: YearMonth,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.service_id, self.variant_pax, self.year_month)
    }
}

/// A single atomic write into the aggregate store: push `booking` onto the
/// list at `bucket / day / hour`, creating whatever does not exist yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAppend {
    /// Target bucket
    pub bucket: BucketKey,
    /// Id to use if the bucket document has to be created
    pub bucket_id: BookingsId,
    /// Day key
    pub day: DayKey,
    /// Hour slot key
    pub hour: HourSlot,
    /// Entry to append
    pub booking: Booking,
}

/// Aggregate document holding every booking of a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBookings {
    /// Document id
    pub id: BookingsId,
    /// Service
    pub service_id: ServiceId,
    /// Variant pax
    pub variant_pax: u32,
    /// Calendar month
    pub year_month: YearMonth,
    /// Day -> hour -> bookings
    #[serde(default)]
    pub bookings_by_date: BTreeMap<DayKey, BookingsByHour>,
}

impl ServiceBookings {
    /// Create an empty bucket with a fresh id.
    #[must_use]
    pub fn empty(key: &BucketKey) -> Self {
        Self::empty_with_id(key, BookingsId::new())
    }

    /// Create an empty bucket with the given id.
    #[must_use]
    pub fn empty_with_id(key: &BucketKey, id: BookingsId) -> Self {
        Self {
            id,
            service_id: key.service_id.clone(),
            variant_pax: key.variant_pax,
            year_month: key.year_month,
            bookings_by_date: BTreeMap::new(),
        }
    }

    /// Bucket identity of this document.
    #[must_use]
    pub fn key(&self) -> BucketKey {
        BucketKey {
            service_id: self.service_id.clone(),
            variant_pax: self.variant_pax,
            year_month: self.year_month,
        }
    }

    /// Append a booking to `day / hour`, creating missing levels.
    pub fn append(&mut self, day: DayKey, hour: HourSlot, booking: Booking) {
        self.bookings_by_date
            .entry(day)
            .or_default()
            .entry(hour)
            .or_default()
            .push(booking);
    }

    /// Apply a slot append targeted at this bucket.
    pub fn apply(&mut self, append: &SlotAppend) {
        self.append(append.day, append.hour.clone(), append.booking.clone());
    }

    /// Entries in one slot.
    #[must_use]
    pub fn slot(&self, day: DayKey, hour: &HourSlot) -> &[Booking] {
        self.bookings_by_date
            .get(&day)
            .and_then(|hours| hours.get(hour))
            .map_or(&[], Vec::as_slice)
    }

    /// Number of entries across every hour slot of a day.
    #[must_use]
    pub fn day_count(&self, day: DayKey) -> usize {
        self.bookings_by_date
            .get(&day)
            .map_or(0, |hours| hours.values().map(Vec::len).sum())
    }

    /// Total number of entries in the bucket.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.bookings_by_date
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Every entry belonging to `inquiry_id`, with its location.
    pub fn entries_for<'a>(
        &'a self,
        inquiry_id: &'a InquiryId,
    ) -> impl Iterator<Item = (DayKey, &'a HourSlot, &'a Booking)> + 'a {
        self.bookings_by_date.iter().flat_map(move |(day, hours)| {
            hours.iter().flat_map(move |(hour, bookings)| {
                bookings
                    .iter()
                    .filter(move |booking| &booking.inquiry_id == inquiry_id)
                    .map(move |booking| (*day, hour, booking))
            })
        })
    }
}
