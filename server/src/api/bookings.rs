//! Booking calendar endpoint.
//!
//! - GET /api/services/:id/bookings?year_month=2025/6&pax=2
//!
//! Returns slot occupancy only; inquiry ids and confirmation codes stay
//! private.

use crate::server::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use slotbook_core::ids::ServiceId;
use slotbook_core::slot::{DayKey, YearMonth};
use slotbook_web::AppError;
use std::collections::BTreeMap;

/// Calendar query.
#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    /// Month as `"YYYY/M"`
    pub year_month: String,
    /// Variant pax
    pub pax: u32,
}

/// Occupancy of one day.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct DayOccupancy {
    /// Day of month
    pub day: DayKey,
    /// Bookings across every slot of the day
    pub total: usize,
    /// Bookings per hour slot
    pub slots: BTreeMap<String, usize>,
}

/// Occupancy of one bucket.
#[derive(Debug, Serialize)]
pub struct BookingCalendar {
    /// Service
    pub service_id: ServiceId,
    /// Variant pax
    pub variant_pax: u32,
    /// Month
    pub year_month: YearMonth,
    /// Days with at least one booking, in calendar order
    pub days: Vec<DayOccupancy>,
}

/// Booked slots of a service variant in one month. A month without bookings
/// yields an empty `days` list.
pub async fn get_calendar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<BookingCalendar>, AppError> {
    let year_month: YearMonth = query
        .year_month
        .parse()
        .map_err(|e: slotbook_core::slot::SlotError| AppError::validation(e.to_string()))?;
    let service_id = ServiceId::from_string(id);

    let documents = state
        .bookings
        .fetch(&service_id, query.pax, &[year_month])
        .await?;

    let days = documents
        .iter()
        .flat_map(|doc| doc.bookings_by_date.iter())
        .map(|(day, hours)| DayOccupancy {
            day: *day,
            total: hours.values().map(Vec::len).sum(),
            slots: hours
                .iter()
                .map(|(hour, bookings)| (hour.to_string(), bookings.len()))
                .collect(),
        })
        .collect();

    Ok(Json(BookingCalendar {
        service_id,
        variant_pax: query.pax,
        year_month,
        days,
    }))
}
