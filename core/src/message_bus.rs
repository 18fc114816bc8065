//! Message bus abstraction for asynchronous booking creation.
//!
//! The payment reconciler publishes a [`BookingCreationRequest`] once an
//! inquiry is paid; a consumer picks it up and runs the booking use case.
//!
//! ```text
//! payment callback --> reconciler --publish--> [booking-creation] --> consumer --> create_booking
//! ```
//!
//! Delivery is at-least-once, so consumers must tolerate duplicates.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

use crate::ids::InquiryId;

/// Default topic carrying booking creation requests.
pub const BOOKING_CREATION_TOPIC: &str = "booking-creation";

/// Errors that can occur during message bus operations.
#[derive(Error, Debug, Clone)]
pub enum MessageBusError {
    /// Failed to connect to the bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// A received message could not be decoded
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// A message travelling on the bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Topic the message was published to
    pub topic: String,
    /// Partitioning key
    pub key: Option<String>,
    /// Raw payload (JSON)
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// Build a JSON message.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::PublishFailed`] if the value cannot be serialized.
    pub fn json<T: Serialize>(
        topic: &str,
        key: Option<String>,
        value: &T,
    ) -> Result<Self, MessageBusError> {
        let payload = serde_json::to_vec(value).map_err(|e| MessageBusError::PublishFailed {
            topic: topic.to_string(),
            reason: format!("Failed to serialize payload: {e}"),
        })?;
        Ok(Self {
            topic: topic.to_string(),
            key,
            payload,
        })
    }
}

/// Request to create the bookings of a paid inquiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCreationRequest {
    /// Paid inquiry
    pub inquiry_id: InquiryId,
}

impl BookingCreationRequest {
    /// Encode for `topic`, keyed by inquiry id.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::PublishFailed`] if serialization fails.
    pub fn to_message(&self, topic: &str) -> Result<BusMessage, MessageBusError> {
        BusMessage::json(topic, Some(self.inquiry_id.to_string()), self)
    }

    /// Decode from a raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::DeserializationFailed`] for malformed payloads.
    pub fn from_payload(payload: &[u8]) -> Result<Self, MessageBusError> {
        serde_json::from_slice(payload)
            .map_err(|e| MessageBusError::DeserializationFailed(e.to_string()))
    }
}

/// Stream of messages from a subscription.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<BusMessage, MessageBusError>> + Send>>;

/// Publish/subscribe transport.
///
/// Dyn-compatible so it can be shared as `Arc<dyn MessageBus>`.
pub trait MessageBus: Send + Sync {
    /// Publish a message to its topic.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::PublishFailed`] if the publish operation fails.
    fn publish(
        &self,
        message: &BusMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), MessageBusError>> + Send + '_>>;

    /// Subscribe to one or more topics.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, MessageBusError>> + Send + '_>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn booking_request_wire_format() {
        let request = BookingCreationRequest {
            inquiry_id: InquiryId::from_string("01hz"),
        };
        let message = request.to_message(BOOKING_CREATION_TOPIC).unwrap();
        assert_eq!(message.topic, "booking-creation");
        assert_eq!(message.key.as_deref(), Some("01hz"));
        assert_eq!(
            String::from_utf8(message.payload.clone()).unwrap(),
            r#"{"inquiry_id":"01hz"}"#
        );
        assert_eq!(BookingCreationRequest::from_payload(&message.payload).unwrap(), request);
    }

    #[test]
    fn malformed_payload_is_a_deserialization_error() {
        let err = BookingCreationRequest::from_payload(b"not json").unwrap_err();
        assert!(matches!(err, MessageBusError::DeserializationFailed(_)));
    }
}
