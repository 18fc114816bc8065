//! Axum integration for Slotbook.
//!
//! The HTTP shell around the booking use cases: it parses requests, calls
//! the application services and maps their errors to responses.
//!
//! - [`AppError`]: status + code + message, rendered as a JSON body
//! - [`middleware::correlation_id`]: per-request correlation ID and tracing span
//! - [`health`]: `/health` liveness and `/ready` readiness with pluggable dependency checks

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod health;
pub mod middleware;

pub use error::AppError;
pub use health::{ComponentCheck, ReadinessCheck, health_check, readiness};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
