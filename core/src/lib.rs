//! # Slotbook Core
//!
//! Domain types and the booking aggregation engine for Slotbook, a
//! booking-and-payment backend for a marketplace of bookable services.
//!
//! ## Core Concepts
//!
//! - **Inquiry**: a guest's request to book a service variant on some dates
//! - **Bucket**: one aggregate document per `(service, variant pax, year-month)`
//! - **Slot**: the `day / hour` list inside a bucket that bookings append to
//! - **Confirmation code**: 7-character code shared by all slots of an inquiry
//!
//! ## Layout
//!
//! - [`slot`]: pure date → bucket / day / hour key derivation
//! - [`aggregate`]: the `ServiceBookings` document
//! - [`merge`]: merging a paid inquiry into its buckets
//! - [`store`], [`message_bus`], [`notification`]: ports implemented by the
//!   `slotbook-postgres`, `slotbook-redpanda` and `slotbook-testing` crates
//!
//! ## Example
//!
//! ```ignore
//! use slotbook_core::merge::{merge_inquiry, CapacityPolicy};
//! use slotbook_core::ids::ConfirmationCode;
//!
//! let existing = bookings.fetch(&inquiry.service_id, pax, &months).await?;
//! let code = ConfirmationCode::generate();
//! let outcome = merge_inquiry(&inquiry, existing, code, CapacityPolicy::default())?;
//! ledger.commit(BookingCommit { appends: outcome.appends, .. }).await?;
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod aggregate;
pub mod environment;
pub mod ids;
pub mod inquiry;
pub mod merge;
pub mod message_bus;
pub mod notification;
pub mod review;
pub mod service;
pub mod slot;
pub mod store;
