//! # Slotbook Testing
//!
//! Testing utilities for Slotbook.
//!
//! This crate provides:
//! - [`InMemoryDocumentStore`]: every persistence trait over one in-memory state
//! - [`InMemoryMessageBus`]: broadcast-backed message bus that records publishes
//! - [`RecordingNotifier`]: notifier that records instead of sending
//! - [`fixtures`]: services and inquiries for tests
//! - [`FixedClock`]: deterministic time
//!
//! ## Example
//!
//! ```ignore
//! use slotbook_testing::{fixtures, InMemoryDocumentStore};
//!
//! #[tokio::test]
//! async fn booking_flow() {
//!     let store = InMemoryDocumentStore::new();
//!     let service = fixtures::service();
//!     store.add_service(service.clone());
//!     store.add_inquiry(fixtures::paid_inquiry(&service, &["2025/6/1"], ""));
//!     // run the use case against Arc::new(store.clone()) ...
//! }
//! ```

use chrono::{DateTime, Utc};
use slotbook_core::environment::Clock;

pub mod document_store;
pub mod fixtures;
pub mod message_bus;
pub mod notifier;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};

    /// Clock for deterministic tests
    ///
    /// Returns the same time until moved with [`FixedClock::set`] or
    /// [`FixedClock::advance`]. Clones share the same time.
    ///
    /// # Example
    ///
    /// ```
    /// use slotbook_testing::mocks::FixedClock;
    /// use slotbook_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2);
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            if let Ok(mut current) = self.time.lock() {
                *current = time;
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: chrono::Duration) {
            if let Ok(mut current) = self.time.lock() {
                *current += by;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time.lock().map(|time| *time).unwrap_or_default()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use slotbook_core::slot::SelectedDate;

    /// Any calendar date between 2020 and 2035.
    pub fn selected_date() -> impl Strategy<Value = SelectedDate> {
        (2020i32..2035, 1u32..=12, 1u32..=28).prop_map(|(year, month, day)| {
            SelectedDate::from_naive(NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default())
        })
    }

    /// Between 1 and `max` dates within a two-month window, so buckets are
    /// shared often.
    pub fn clustered_dates(max: usize) -> impl Strategy<Value = Vec<SelectedDate>> {
        prop::collection::vec((5u32..=6, 1u32..=30), 1..=max).prop_map(|pairs| {
            pairs
                .into_iter()
                .filter_map(|(month, day)| NaiveDate::from_ymd_opt(2025, month, day))
                .map(SelectedDate::from_naive)
                .collect()
        })
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use document_store::{DeadLetter, InMemoryDocumentStore};
pub use message_bus::InMemoryMessageBus;
pub use mocks::{FixedClock, test_clock};
pub use notifier::{RecordingNotifier, SentMessage};
