//! Bookable services and their variants.

use crate::ids::ServiceId;
use crate::slot::HourSlot;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// An unknown id was found in a lookup-table backed enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} id: {id}")]
pub struct UnknownId {
    /// Table name
    pub kind: &'static str,
    /// Offending id
    pub id: u8,
}

/// Hour granularity required when booking a service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MeasurementUnit {
    /// Runs until finished; no hour is chosen
    UntilFinished,
    /// Quarter-hour starts (`HH:00`, `HH:15`, `HH:30`, `HH:45`)
    Minutes,
    /// Full-hour starts (`HH:00`)
    Hours,
    /// Whole days; no hour is chosen
    Days,
}

#[allow(clippy::expect_used)]
fn hour_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).expect("hour slot patterns are literals")
}

static NO_HOUR: LazyLock<Regex> = LazyLock::new(|| hour_pattern("^$"));
static QUARTER_HOURS: LazyLock<Regex> =
    LazyLock::new(|| hour_pattern("^([01][0-9]|2[0-3]):(00|15|30|45)$"));
static FULL_HOURS: LazyLock<Regex> = LazyLock::new(|| hour_pattern("^([01][0-9]|2[0-3]):00$"));

struct UnitEntry {
    unit: MeasurementUnit,
    id: u8,
    label: &'static str,
    hour: &'static LazyLock<Regex>,
}

static UNIT_TABLE: [UnitEntry; 4] = [
    UnitEntry {
        unit: MeasurementUnit::UntilFinished,
        id: 1,
        label: "s.d. selesai",
        hour: &NO_HOUR,
    },
    UnitEntry {
        unit: MeasurementUnit::Minutes,
        id: 2,
        label: "menit",
        hour: &QUARTER_HOURS,
    },
    UnitEntry {
        unit: MeasurementUnit::Hours,
        id: 3,
        label: "jam",
        hour: &FULL_HOURS,
    },
    UnitEntry {
        unit: MeasurementUnit::Days,
        id: 4,
        label: "hari",
        hour: &NO_HOUR,
    },
];

impl MeasurementUnit {
    fn entry(self) -> &'static UnitEntry {
        // Table order mirrors declaration order.
        &UNIT_TABLE[self as usize]
    }

    /// Numeric id used in storage and on the wire
    #[must_use]
    pub fn id(self) -> u8 {
        self.entry().id
    }

    /// Display label
    #[must_use]
    pub fn label(self) -> &'static str {
        self.entry().label
    }

    /// Whether the guest picks a start hour for this unit.
    #[must_use]
    pub fn has_hour_slots(self) -> bool {
        !self.accepts_hour("")
    }

    /// Check a raw selected hour against this unit's slot pattern.
    ///
    /// Whole-day units accept only an empty hour; hourly units accept
    /// zero-padded `HH:MM` with `HH` in 00..=23 and an allowed minute.
    #[must_use]
    pub fn accepts_hour(self, hour: &str) -> bool {
        self.entry().hour.is_match(hour)
    }

    /// Validate and normalise a selected hour into its slot key.
    ///
    /// Returns `None` when the hour is not allowed for this unit.
    #[must_use]
    pub fn hour_slot(self, hour: &str) -> Option<HourSlot> {
        self.accepts_hour(hour).then(|| HourSlot::normalise(hour))
    }
}

impl TryFrom<u8> for MeasurementUnit {
    type Error = UnknownId;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        UNIT_TABLE
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.unit)
            .ok_or(UnknownId {
                kind: "measurement unit",
                id,
            })
    }
}

impl From<MeasurementUnit> for u8 {
    fn from(unit: MeasurementUnit) -> Self {
        unit.id()
    }
}

impl fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Service category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Category {
    /// Guided activities
    Activities,
    /// Ticketed events
    Events,
    /// Equipment and vehicle rentals
    Rentals,
    /// Shared open trips
    OpenTrips,
}

const CATEGORY_TABLE: [(Category, u8, &str, &str); 4] = [
    (Category::Activities, 1, "activities", "Aktivitas Wisata"),
    (Category::Events, 2, "events", "Event"),
    (Category::Rentals, 3, "rentals", "Rental"),
    (Category::OpenTrips, 4, "opentrips", "Open trip"),
];

impl Category {
    /// Numeric id
    #[must_use]
    pub const fn id(self) -> u8 {
        CATEGORY_TABLE[self as usize].1
    }

    /// URL path segment
    #[must_use]
    pub const fn path(self) -> &'static str {
        CATEGORY_TABLE[self as usize].2
    }

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        CATEGORY_TABLE[self as usize].3
    }
}

impl TryFrom<u8> for Category {
    type Error = UnknownId;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        CATEGORY_TABLE
            .iter()
            .find(|(_, table_id, _, _)| *table_id == id)
            .map(|(category, ..)| *category)
            .ok_or(UnknownId {
                kind: "category",
                id,
            })
    }
}

impl From<Category> for u8 {
    fn from(category: Category) -> Self {
        category.id()
    }
}

/// A priced option of a service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceVariant {
    /// Price per selected date
    pub price: u64,
    /// Duration, in the service's measurement unit
    pub duration: u32,
    /// Number of people covered
    pub pax: u32,
    /// Daily booking cap; `0` means unlimited
    #[serde(default)]
    pub max_reservation_per_day: u32,
}

impl ServiceVariant {
    /// Whether a client-submitted snapshot still matches this variant's
    /// price, duration and pax.
    #[must_use]
    pub const fn matches_snapshot(&self, snapshot: &Self) -> bool {
        self.price == snapshot.price
            && self.duration == snapshot.duration
            && self.pax == snapshot.pax
    }
}

/// Contact details of the business hosting a service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostContact {
    /// Business name
    pub name: String,
    /// Phone number in `62…` form
    pub phone_number: String,
}

/// A bookable service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service id
    pub id: ServiceId,
    /// Title
    pub title: String,
    /// URL slug
    pub slug: String,
    /// Owning business
    pub business_id: String,
    /// Variants, addressed by 1-based position
    pub variants: Vec<ServiceVariant>,
    /// Hour granularity
    pub measurement_unit: MeasurementUnit,
    /// Category
    pub category: Category,
    /// Sum of all review scores
    #[serde(default)]
    pub total_score: u64,
    /// Number of reviews
    #[serde(default)]
    pub review_count: u64,
    /// Host contact used in booking notifications
    pub host: HostContact,
}

impl Service {
    /// Resolve a 1-based variant id such as `"2"`.
    #[must_use]
    pub fn variant_by_position(&self, variant_id: &str) -> Option<&ServiceVariant> {
        let position: usize = variant_id.trim().parse().ok()?;
        position.checked_sub(1).and_then(|index| self.variants.get(index))
    }

    /// Mean review score, if any review exists.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_score(&self) -> Option<f64> {
        (self.review_count > 0).then(|| self.total_score as f64 / self.review_count as f64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hour_rules_per_unit() {
        assert!(MeasurementUnit::UntilFinished.accepts_hour(""));
        assert!(!MeasurementUnit::UntilFinished.accepts_hour("09:00"));
        assert!(MeasurementUnit::Days.accepts_hour(""));

        assert!(MeasurementUnit::Minutes.accepts_hour("09:15"));
        assert!(MeasurementUnit::Minutes.accepts_hour("23:45"));
        assert!(!MeasurementUnit::Minutes.accepts_hour("09:10"));
        assert!(!MeasurementUnit::Minutes.accepts_hour("24:00"));
        assert!(!MeasurementUnit::Minutes.accepts_hour("9:15"));
        assert!(!MeasurementUnit::Minutes.accepts_hour(""));

        assert!(MeasurementUnit::Hours.accepts_hour("00:00"));
        assert!(!MeasurementUnit::Hours.accepts_hour("10:30"));
        assert!(!MeasurementUnit::Hours.accepts_hour("+1:00"));
        assert!(!MeasurementUnit::Hours.accepts_hour("09:00\n"));
        assert!(!MeasurementUnit::Hours.accepts_hour(" 09:00"));

        assert!(MeasurementUnit::Minutes.has_hour_slots());
        assert!(MeasurementUnit::Hours.has_hour_slots());
        assert!(!MeasurementUnit::Days.has_hour_slots());
        assert!(!MeasurementUnit::UntilFinished.has_hour_slots());
    }

    #[test]
    fn whole_day_units_normalise_to_midnight() {
        let slot = MeasurementUnit::Days.hour_slot("").unwrap();
        assert_eq!(slot.as_str(), "00:00");
        assert!(MeasurementUnit::Days.hour_slot("10:00").is_none());
    }

    #[test]
    fn lookup_tables_round_trip_ids() {
        for id in 1..=4u8 {
            assert_eq!(u8::from(MeasurementUnit::try_from(id).unwrap()), id);
            assert_eq!(u8::from(Category::try_from(id).unwrap()), id);
        }
        assert!(MeasurementUnit::try_from(0).is_err());
        assert!(Category::try_from(5).is_err());
        assert_eq!(MeasurementUnit::Hours.label(), "jam");
        assert_eq!(Category::OpenTrips.path(), "opentrips");
    }

    #[test]
    fn variant_lookup_is_one_based() {
        let variant = |pax| ServiceVariant {
            price: 100,
            duration: 1,
            pax,
            max_reservation_per_day: 0,
        };
        let service = Service {
            id: ServiceId::from_string("svc"),
            title: "Snorkeling".into(),
            slug: "snorkeling".into(),
            business_id: "biz".into(),
            variants: vec![variant(1), variant(2)],
            measurement_unit: MeasurementUnit::Days,
            category: Category::Activities,
            total_score: 0,
            review_count: 0,
            host: HostContact {
                name: "Host".into(),
                phone_number: "628111".into(),
            },
        };

        assert_eq!(service.variant_by_position("1").unwrap().pax, 1);
        assert_eq!(service.variant_by_position("2").unwrap().pax, 2);
        assert!(service.variant_by_position("0").is_none());
        assert!(service.variant_by_position("3").is_none());
        assert!(service.variant_by_position("x").is_none());
        assert!(service.average_score().is_none());
    }
}
