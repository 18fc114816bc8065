//! Router configuration.

use super::state::AppState;
use crate::api::{bookings, inquiries, payments, reviews};
use axum::{
    Router,
    extract::State,
    middleware,
    routing::{get, post},
};
use slotbook_web::{correlation_id, health_check, readiness};
use tower_http::trace::TraceLayer;

/// Build the complete router.
///
/// - `GET /health`, `GET /ready`
/// - `POST /api/payments/callback`
/// - `POST /api/inquiries`, `GET /api/inquiries/:id`, `GET /api/inquiries/:id/contact`
/// - `GET /api/services/:id/bookings?year_month=YYYY/M&pax=N`
/// - `GET /api/services/:id/top-review`, `POST /api/reviews`
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/payments/callback", post(payments::payment_callback))
        .route("/inquiries", post(inquiries::create_inquiry))
        .route("/inquiries/:id", get(inquiries::get_inquiry))
        .route("/inquiries/:id/contact", get(inquiries::get_contact))
        .route("/services/:id/bookings", get(bookings::get_calendar))
        .route("/services/:id/top-review", get(reviews::get_top_review))
        .route("/reviews", post(reviews::create_review));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(correlation_id))
        .with_state(state)
}

async fn ready(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    readiness(&state.dependencies).await
}
