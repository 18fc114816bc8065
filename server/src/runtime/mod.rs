//! Background processing and process lifecycle.
//!
//! - **`consumer`**: bus consumer with automatic resubscription
//! - **`handlers`**: [`MessageHandler`] trait and the booking-creation handler
//! - **`outbox`**: delivers queued notifications with retry
//! - **`lifecycle`**: runs the HTTP server and background tasks, shuts them down together

pub mod consumer;
pub mod handlers;
pub mod lifecycle;
pub mod outbox;

pub use consumer::{MessageConsumer, MissingField};
pub use handlers::{BookingCreationHandler, HandlerError, MessageHandler};
pub use lifecycle::Application;
pub use outbox::{DispatchReport, OutboxDispatcher};
