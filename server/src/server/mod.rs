//! HTTP server wiring: shared state, routes and readiness checks.

pub mod checks;
pub mod routes;
pub mod state;

pub use checks::PostgresCheck;
pub use routes::build_router;
pub use state::AppState;
