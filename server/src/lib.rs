//! # Slotbook Server
//!
//! The Slotbook application: use cases over the core ports, the booking
//! consumer, the notification outbox dispatcher and the Axum HTTP API.
//!
//! ```text
//! POST /api/payments/callback
//!        │
//!        ▼
//! PaymentReconciler ──publish──▶ [booking-creation] ──▶ MessageConsumer
//!                                                          │
//!                                                          ▼
//!                                            BookingCreationHandler
//!                                                          │
//!                                                          ▼
//!                                    BookingService ──▶ BookingLedger (one tx)
//!                                                          │
//!                                                          ▼
//!                                  OutboxDispatcher ──▶ Notifier (WhatsApp)
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod metrics;
pub mod notification;
pub mod runtime;
pub mod server;
pub mod signature;

pub use config::Config;
