//! Outbound guest and host notifications.
//!
//! Use cases never talk to the messaging gateway directly: they write
//! [`Notification`]s to the outbox in the same unit of work as their state
//! change, and a dispatcher delivers them through a [`Notifier`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Who a notification is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// The guest who booked
    Guest,
    /// The business hosting the service
    Host,
}

/// A text message to deliver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient kind
    pub audience: Audience,
    /// Destination phone number
    pub destination: String,
    /// Message body
    pub text: String,
}

/// A notification waiting in the outbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Outbox row id
    pub id: i64,
    /// Payload
    pub notification: Notification,
    /// Delivery attempts so far
    pub attempts: u32,
    /// Last delivery error
    pub last_error: Option<String>,
    /// Enqueue time
    pub created_at: DateTime<Utc>,
}

/// Delivery failures.
#[derive(Error, Debug, Clone)]
pub enum NotifyError {
    /// Gateway could not be reached
    #[error("Transport error: {0}")]
    Transport(String),

    /// Gateway refused the message
    #[error("Rejected by gateway (status {status}): {body}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },
}

/// Sends text messages to phone numbers.
pub trait Notifier: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the gateway cannot be reached or refuses the message.
    fn send_message(
        &self,
        text: &str,
        destination: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>>;
}
