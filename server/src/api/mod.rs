//! HTTP handlers.
//!
//! Each module maps one use case's errors onto [`AppError`] so handlers can
//! use `?` directly.

#![allow(clippy::missing_errors_doc)]

pub mod bookings;
pub mod inquiries;
pub mod payments;
pub mod reviews;

pub use slotbook_web::AppError;
