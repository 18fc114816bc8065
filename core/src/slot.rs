//! Slot key derivation.
//!
//! A selected date arrives as `"YYYY/M/D"`. Bookings are bucketed per
//! `(service, variant pax, year-month)` and, inside a bucket, keyed by day and
//! hour slot. Everything here is pure: the same input always yields the same
//! keys.
//!
//! Keys are normalised numerically, so `"2025/06/01"` and `"2025/6/1"` land in
//! the same `2025/6` bucket under day `1`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hour slot used when the measurement unit has no hour granularity.
pub const WHOLE_DAY_SLOT: &str = "00:00";

/// Errors raised while parsing slot keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// The date string is not a valid `YYYY/M/D` calendar date.
    #[error("Malformed date '{input}': {reason}")]
    MalformedDate {
        /// Raw input
        input: String,
        /// What was wrong with it
        reason: String,
    },

    /// The year-month string is not a valid `YYYY/M` key.
    #[error("Malformed year-month '{0}'")]
    MalformedYearMonth(String),

    /// The day key is not a number between 1 and 31.
    #[error("Malformed day '{0}'")]
    MalformedDay(String),
}

/// A calendar date chosen by the guest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SelectedDate(NaiveDate);

impl SelectedDate {
    /// Parse a `"YYYY/M/D"` date. Zero-padded components are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::MalformedDate`] when the input does not have three
    /// numeric components or does not name a real calendar day.
    pub fn parse(input: &str) -> Result<Self, SlotError> {
        let malformed = |reason: &str| SlotError::MalformedDate {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = input.trim().split('/');
        let (Some(year), Some(month), Some(day), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected YYYY/M/D"));
        };

        let year: i32 = year.parse().map_err(|_| malformed("year is not a number"))?;
        let month: u32 = month.parse().map_err(|_| malformed("month is not a number"))?;
        let day: u32 = day.parse().map_err(|_| malformed("day is not a number"))?;

        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| malformed("not a calendar date"))
    }

    /// Wrap an already valid date.
    #[must_use]
    pub const fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The underlying calendar date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.0
    }

    /// Year-month bucket this date belongs to.
    #[must_use]
    pub fn year_month(&self) -> YearMonth {
        use chrono::Datelike;
        YearMonth {
            year: self.0.year(),
            month: self.0.month(),
        }
    }

    /// Day-of-month key inside the bucket.
    #[must_use]
    pub fn day_key(&self) -> DayKey {
        use chrono::Datelike;
        DayKey(self.0.day())
    }
}

impl fmt::Display for SelectedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use chrono::Datelike;
        write!(f, "{}/{}/{}", self.0.year(), self.0.month(), self.0.day())
    }
}

impl FromStr for SelectedDate {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SelectedDate {
    type Error = SlotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SelectedDate> for String {
    fn from(value: SelectedDate) -> Self {
        value.to_string()
    }
}

/// Bucket key: a calendar year and month, displayed as `"2025/6"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Build a year-month, validating the month.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::MalformedYearMonth`] if `month` is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self, SlotError> {
        if (1..=12).contains(&month) {
            Ok(Self { year, month })
        } else {
            Err(SlotError::MalformedYearMonth(format!("{year}/{month}")))
        }
    }

    /// Calendar year
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month (1-based)
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SlotError::MalformedYearMonth(s.to_string());
        let (year, month) = s.trim().split_once('/').ok_or_else(malformed)?;
        let year = year.parse().map_err(|_| malformed())?;
        let month = month.parse().map_err(|_| malformed())?;
        Self::new(year, month).map_err(|_| malformed())
    }
}

impl TryFrom<String> for YearMonth {
    type Error = SlotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Day-of-month key inside a bucket, displayed without padding (`"1"`..`"31"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(u32);

impl DayKey {
    /// Day key for `day`, which must be in `1..=31`.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::MalformedDay`] when out of range.
    pub fn new(day: u32) -> Result<Self, SlotError> {
        if (1..=31).contains(&day) {
            Ok(Self(day))
        } else {
            Err(SlotError::MalformedDay(day.to_string()))
        }
    }

    /// Day of month
    #[must_use]
    pub const fn day(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DayKey {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u32>() {
            Ok(day) if (1..=31).contains(&day) => Ok(Self(day)),
            _ => Err(SlotError::MalformedDay(s.to_string())),
        }
    }
}

impl TryFrom<String> for DayKey {
    type Error = SlotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayKey> for String {
    fn from(value: DayKey) -> Self {
        value.to_string()
    }
}

/// Hour slot key such as `"09:15"`, or [`WHOLE_DAY_SLOT`] for whole-day units.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct HourSlot(String);

impl HourSlot {
    /// Normalise a selected hour; an empty hour becomes the whole-day slot.
    #[must_use]
    pub fn normalise(hour: &str) -> Self {
        let hour = hour.trim();
        if hour.is_empty() {
            Self(WHOLE_DAY_SLOT.to_string())
        } else {
            Self(hour.to_string())
        }
    }

    /// The whole-day slot
    #[must_use]
    pub fn whole_day() -> Self {
        Self(WHOLE_DAY_SLOT.to_string())
    }

    /// Slot key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HourSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for HourSlot {
    fn from(value: String) -> Self {
        Self::normalise(&value)
    }
}

impl From<HourSlot> for String {
    fn from(value: HourSlot) -> Self {
        value.0
    }
}

/// Distinct year-month buckets touched by a set of dates, in calendar order.
#[must_use]
pub fn derive_year_months(dates: &[SelectedDate]) -> BTreeSet<YearMonth> {
    dates.iter().map(SelectedDate::year_month).collect()
}

/// Parse every raw date, failing on the first malformed one.
///
/// # Errors
///
/// Returns the [`SlotError`] of the first date that does not parse.
pub fn parse_dates<S: AsRef<str>>(raw: &[S]) -> Result<Vec<SelectedDate>, SlotError> {
    raw.iter().map(|s| SelectedDate::parse(s.as_ref())).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_unpadded_dates() {
        let date = SelectedDate::parse("2025/6/1").unwrap();
        assert_eq!(date.year_month().to_string(), "2025/6");
        assert_eq!(date.day_key().to_string(), "1");
    }

    #[test]
    fn padded_and_unpadded_dates_share_keys() {
        let padded = SelectedDate::parse("2025/06/01").unwrap();
        let plain = SelectedDate::parse("2025/6/1").unwrap();
        assert_eq!(padded, plain);
        assert_eq!(padded.to_string(), "2025/6/1");
    }

    #[test]
    fn rejects_malformed_dates() {
        for raw in ["", "2025/6", "2025-06-01", "2025/13/1", "2025/2/30", "a/b/c", "2025/6/1/2"] {
            assert!(SelectedDate::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn derives_distinct_buckets_in_order() {
        let dates = parse_dates(&["2025/7/2", "2025/6/30", "2025/7/1"]).unwrap();
        let months: Vec<String> =
            derive_year_months(&dates).iter().map(ToString::to_string).collect();
        assert_eq!(months, vec!["2025/6", "2025/7"]);
    }

    #[test]
    fn empty_hour_becomes_whole_day_slot() {
        assert_eq!(HourSlot::normalise("").as_str(), WHOLE_DAY_SLOT);
        assert_eq!(HourSlot::normalise("  ").as_str(), WHOLE_DAY_SLOT);
        assert_eq!(HourSlot::normalise("09:15").as_str(), "09:15");
    }

    #[test]
    fn keys_serialize_as_strings() {
        let json = serde_json::to_string(&YearMonth::new(2025, 6).unwrap()).unwrap();
        assert_eq!(json, "\"2025/6\"");
        let day: DayKey = serde_json::from_str("\"14\"").unwrap();
        assert_eq!(day.day(), 14);
        assert!(serde_json::from_str::<DayKey>("\"0\"").is_err());
    }

    prop_compose! {
        fn arb_date()(year in 2000i32..2100, ordinal in 1u32..=365) -> SelectedDate {
            SelectedDate::from_naive(
                NaiveDate::from_yo_opt(year, ordinal).unwrap_or_default(),
            )
        }
    }

    proptest! {
        #[test]
        fn derivation_is_deterministic(dates in prop::collection::vec(arb_date(), 0..20)) {
            let first = derive_year_months(&dates);
            let second = derive_year_months(&dates);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.len() <= dates.len());
            for date in &dates {
                prop_assert!(first.contains(&date.year_month()));
            }
        }

        #[test]
        fn display_round_trips_through_parse(date in arb_date()) {
            let reparsed = SelectedDate::parse(&date.to_string()).unwrap();
            prop_assert_eq!(reparsed, date);
            prop_assert_eq!(reparsed.day_key(), date.day_key());
        }
    }
}
