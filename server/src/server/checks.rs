//! Readiness checks for `/ready`.

use slotbook_postgres::PostgresStore;
use slotbook_web::{ComponentCheck, ReadinessCheck};
use std::future::Future;
use std::pin::Pin;

/// Runs `SELECT 1` against the pool.
#[derive(Clone, Debug)]
pub struct PostgresCheck {
    store: PostgresStore,
}

impl PostgresCheck {
    /// Check `store`.
    #[must_use]
    pub const fn new(store: PostgresStore) -> Self {
        Self { store }
    }
}

impl ReadinessCheck for PostgresCheck {
    fn check(&self) -> Pin<Box<dyn Future<Output = ComponentCheck> + Send + '_>> {
        Box::pin(async move {
            match self.store.ping().await {
                Ok(()) => ComponentCheck::healthy("postgres"),
                Err(e) => ComponentCheck::unhealthy("postgres", e.to_string()),
            }
        })
    }
}
