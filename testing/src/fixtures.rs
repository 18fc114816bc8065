//! Domain fixtures shared by unit and integration tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, TimeZone, Utc};
use slotbook_core::ids::{InquiryId, ServiceId};
use slotbook_core::inquiry::{ContactInfo, Inquiry, InquiryStatus};
use slotbook_core::service::{Category, HostContact, MeasurementUnit, Service, ServiceVariant};
use slotbook_core::slot::{HourSlot, SelectedDate};

/// Time used for fixture timestamps (2025-05-01 08:00 UTC).
#[must_use]
pub fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()
}

/// Variant with the given pax and price, no daily cap.
#[must_use]
pub const fn variant(pax: u32, price: u64) -> ServiceVariant {
    ServiceVariant {
        price,
        duration: 1,
        pax,
        max_reservation_per_day: 0,
    }
}

/// Whole-day service `svc-1` with two variants (2 pax, 4 pax).
#[must_use]
pub fn service() -> Service {
    Service {
        id: ServiceId::from_string("svc-1"),
        title: "Sunrise Snorkeling".to_string(),
        slug: "sunrise-snorkeling".to_string(),
        business_id: "biz-1".to_string(),
        variants: vec![variant(2, 150_000), variant(4, 280_000)],
        measurement_unit: MeasurementUnit::Days,
        category: Category::Activities,
        total_score: 0,
        review_count: 0,
        host: HostContact {
            name: "Blue Reef".to_string(),
            phone_number: "6281100000001".to_string(),
        },
    }
}

/// Hourly service `svc-hourly` (full-hour slots).
#[must_use]
pub fn hourly_service() -> Service {
    Service {
        id: ServiceId::from_string("svc-hourly"),
        title: "Surf Lesson".to_string(),
        slug: "surf-lesson".to_string(),
        measurement_unit: MeasurementUnit::Hours,
        ..service()
    }
}

/// Inquiry for the first variant of `service` in the given status.
#[must_use]
pub fn inquiry(service: &Service, dates: &[&str], hour: &str, status: InquiryStatus) -> Inquiry {
    let selected_variant = service.variants[0];
    let selected_dates: Vec<SelectedDate> =
        dates.iter().map(|d| SelectedDate::parse(d).unwrap()).collect();
    Inquiry {
        id: InquiryId::new(),
        service_id: service.id.clone(),
        total_payment: selected_variant.price * selected_dates.len() as u64,
        selected_dates,
        selected_variant_id: "1".to_string(),
        selected_variant,
        selected_hour: HourSlot::normalise(hour),
        contact: ContactInfo {
            full_name: "Ayu Lestari".to_string(),
            phone_number: "6281234567890".to_string(),
            email: "ayu@example.com".to_string(),
        },
        user_id: Some("user-1".to_string()),
        status,
        confirmation_code: None,
        review_made: false,
        measurement_unit: service.measurement_unit,
        created_at: created_at(),
        updated_at: created_at(),
    }
}

/// Paid inquiry, ready for booking.
#[must_use]
pub fn paid_inquiry(service: &Service, dates: &[&str], hour: &str) -> Inquiry {
    inquiry(service, dates, hour, InquiryStatus::Paid)
}

/// Booked inquiry without a confirmation code.
#[must_use]
pub fn confirmed_inquiry(service: &Service, dates: &[&str]) -> Inquiry {
    inquiry(service, dates, "", InquiryStatus::Confirmed)
}

/// Inquiry waiting for payment.
#[must_use]
pub fn unpaid_inquiry(service: &Service, dates: &[&str]) -> Inquiry {
    inquiry(service, dates, "", InquiryStatus::AwaitingPayment)
}
