//! Integration tests for [`RedpandaMessageBus`] against a real Kafka broker.
//!
//! Marked `#[ignore]`: they need Docker and take a while to start Kafka.
//!
//! ```bash
//! cargo test -p slotbook-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use futures::StreamExt;
use slotbook_core::ids::InquiryId;
use slotbook_core::message_bus::{BookingCreationRequest, BusMessage, MessageBus};
use slotbook_redpanda::RedpandaMessageBus;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    wait_for_kafka_ready(&brokers).await;
    (kafka, brokers)
}

async fn wait_for_kafka_ready(brokers: &str) {
    let warmup = BusMessage {
        topic: "warmup-topic".to_string(),
        key: None,
        payload: vec![1],
    };
    let max_attempts = 60;
    for attempt in 1..=max_attempts {
        if let Ok(bus) = RedpandaMessageBus::new(brokers) {
            if bus.publish(&warmup).await.is_ok() {
                tokio::time::sleep(Duration::from_millis(500)).await;
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(
            attempt != max_attempts,
            "Kafka failed to become ready after {max_attempts} attempts"
        );
    }
}

fn request(topic: &str, id: &str) -> BusMessage {
    BookingCreationRequest {
        inquiry_id: InquiryId::from_string(id),
    }
    .to_message(topic)
    .unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_booking_request_round_trip() {
    let (_kafka, brokers) = start_kafka().await;
    let bus = RedpandaMessageBus::builder()
        .brokers(&brokers)
        .consumer_group("round-trip")
        .build()
        .expect("Failed to create bus");

    bus.publish(&request("bookings-rt", "inq-1")).await.expect("publish failed");
    bus.publish(&request("bookings-rt", "inq-2")).await.expect("publish failed");

    let mut stream = bus.subscribe(&["bookings-rt"]).await.expect("subscribe failed");

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(20), async {
        while received.len() < 2 {
            if let Some(result) = stream.next().await {
                let message = result.expect("receive failed");
                received.push(message);
            }
        }
    })
    .await
    .expect("Timeout waiting for messages");

    assert_eq!(received[0].key.as_deref(), Some("inq-1"));
    let decoded = BookingCreationRequest::from_payload(&received[1].payload).unwrap();
    assert_eq!(decoded.inquiry_id.as_str(), "inq-2");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unhandled_message_is_redelivered() {
    let (_kafka, brokers) = start_kafka().await;
    let topic = "bookings-redelivery";

    let bus = RedpandaMessageBus::builder()
        .brokers(&brokers)
        .consumer_group("redelivery")
        .build()
        .expect("Failed to create bus");
    bus.publish(&request(topic, "inq-1")).await.expect("publish failed");

    {
        let mut stream = bus.subscribe(&[topic]).await.expect("subscribe failed");
        let first = tokio::time::timeout(Duration::from_secs(20), stream.next())
            .await
            .expect("Timeout waiting for first delivery")
            .expect("stream ended")
            .expect("receive failed");
        assert_eq!(first.key.as_deref(), Some("inq-1"));
        // Dropped without asking for the next message: never acknowledged.
    }

    tokio::time::sleep(Duration::from_secs(7)).await;

    let mut stream = bus.subscribe(&[topic]).await.expect("resubscribe failed");
    let again = tokio::time::timeout(Duration::from_secs(30), stream.next())
        .await
        .expect("Timeout waiting for redelivery")
        .expect("stream ended")
        .expect("receive failed");
    assert_eq!(again.key.as_deref(), Some("inq-1"));
}
