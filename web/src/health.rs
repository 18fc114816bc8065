//! Liveness and readiness endpoints.
//!
//! `GET /health` only says the process is up. `GET /ready` runs every
//! registered [`ReadinessCheck`] and answers 503 if any of them fails, so a
//! load balancer stops routing to an instance whose database is gone.

use axum::{Json, http::StatusCode};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result of one dependency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentCheck {
    /// Component name, e.g. `"postgres"`
    pub component: String,
    /// Whether the component is usable
    pub healthy: bool,
    /// Failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentCheck {
    /// A passing check.
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            healthy: true,
            message: None,
        }
    }

    /// A failing check.
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            healthy: false,
            message: Some(message.into()),
        }
    }
}

/// Aggregated readiness.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    /// `"ready"` or `"unavailable"`
    pub status: &'static str,
    /// Individual checks
    pub checks: Vec<ComponentCheck>,
}

/// A dependency that can be checked for readiness.
pub trait ReadinessCheck: Send + Sync {
    /// Run the check.
    fn check(&self) -> Pin<Box<dyn Future<Output = ComponentCheck> + Send + '_>>;
}

/// Liveness: always 200 while the process serves requests.
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Check every dependency and build the `/ready` response.
pub async fn readiness(
    dependencies: &[Arc<dyn ReadinessCheck>],
) -> (StatusCode, Json<ReadinessReport>) {
    let checks = futures::future::join_all(dependencies.iter().map(|d| d.check())).await;

    let ready = checks.iter().all(|check| check.healthy);
    if !ready {
        tracing::warn!(checks = ?checks, "Readiness check failed");
    }

    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (status, Json(ReadinessReport { status: label, checks }))
}
