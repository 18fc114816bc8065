//! Message bus consumer with automatic resubscription.
//!
//! ```text
//! loop {
//!     subscribe (retry after `retry_delay` on failure)
//!     for each message:
//!         handler.handle(message)   // errors are logged, never fatal
//!     stream ended -> wait `retry_delay`, subscribe again
//! }
//! ```
//!
//! Every wait races the shutdown receiver, so a consumer stops promptly
//! between messages. A message already being handled is finished first.

use super::MessageHandler;
use crate::metrics;
use futures::StreamExt;
use slotbook_core::message_bus::{MessageBus, MessageStream};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A required builder field was not set.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Consumer {0} is required")]
pub struct MissingField(pub &'static str);

/// Consumes topics from a [`MessageBus`] and feeds each message to a handler.
pub struct MessageConsumer {
    name: String,
    topics: Vec<String>,
    bus: Arc<dyn MessageBus>,
    handler: Arc<dyn MessageHandler>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
}

impl MessageConsumer {
    /// Create a consumer with the default retry delay (5 seconds).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        topics: Vec<String>,
        bus: Arc<dyn MessageBus>,
        handler: Arc<dyn MessageHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            topics,
            bus,
            handler,
            shutdown,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Start configuring a consumer.
    #[must_use]
    pub fn builder() -> MessageConsumerBuilder {
        MessageConsumerBuilder::default()
    }

    /// Consumer name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the consumer on its own task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(consumer = %self.name, "Message consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Message consumer received shutdown signal");
                    break;
                }
                subscribed = self.bus.subscribe(&topics) => {
                    match subscribed {
                        Ok(mut stream) => {
                            info!(
                                consumer = %self.name,
                                topics = ?self.topics,
                                "Subscribed to message bus"
                            );
                            if self.process_stream(&mut stream).await.is_break() {
                                break;
                            }
                            warn!(
                                consumer = %self.name,
                                "Message stream ended, resubscribing in {:?}",
                                self.retry_delay
                            );
                        }
                        Err(e) => {
                            error!(
                                consumer = %self.name,
                                error = %e,
                                "Failed to subscribe to message bus, retrying in {:?}",
                                self.retry_delay
                            );
                        }
                    }
                    if self.wait_retry().await.is_break() {
                        break;
                    }
                }
            }
        }

        info!(consumer = %self.name, "Message consumer stopped");
    }

    /// Handle messages until the stream ends (`Continue`) or shutdown (`Break`).
    async fn process_stream(&mut self, stream: &mut MessageStream) -> ControlFlow<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(
                        consumer = %self.name,
                        "Message consumer received shutdown signal during processing"
                    );
                    return ControlFlow::Break(());
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(message)) => {
                            match self.handler.handle(&message).await {
                                Ok(()) => metrics::record_message(&self.name, "processed"),
                                Err(e) => {
                                    error!(
                                        consumer = %self.name,
                                        topic = %message.topic,
                                        error = %e,
                                        "Failed to handle message"
                                    );
                                    metrics::record_message(&self.name, "failed");
                                }
                            }
                        }
                        Some(Err(e)) => {
                            error!(
                                consumer = %self.name,
                                error = %e,
                                "Error receiving message from stream"
                            );
                            metrics::record_message(&self.name, "receive_error");
                        }
                        None => return ControlFlow::Continue(()),
                    }
                }
            }
        }
    }

    async fn wait_retry(&mut self) -> ControlFlow<()> {
        tokio::select! {
            _ = self.shutdown.recv() => ControlFlow::Break(()),
            () = tokio::time::sleep(self.retry_delay) => ControlFlow::Continue(()),
        }
    }
}

/// Builder for [`MessageConsumer`].
#[derive(Default)]
pub struct MessageConsumerBuilder {
    name: Option<String>,
    topics: Option<Vec<String>>,
    bus: Option<Arc<dyn MessageBus>>,
    handler: Option<Arc<dyn MessageHandler>>,
    shutdown: Option<broadcast::Receiver<()>>,
    retry_delay: Option<Duration>,
}

impl MessageConsumerBuilder {
    /// Set consumer name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set topics to subscribe to.
    #[must_use]
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Set the bus to consume from.
    #[must_use]
    pub fn bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Set the message handler.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set the shutdown receiver.
    #[must_use]
    pub fn shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Set the resubscribe delay (default: 5 seconds).
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Build the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`MissingField`] if the name, topics, bus, handler or shutdown
    /// receiver was not set.
    pub fn build(self) -> Result<MessageConsumer, MissingField> {
        Ok(MessageConsumer {
            name: self.name.ok_or(MissingField("name"))?,
            topics: self.topics.ok_or(MissingField("topics"))?,
            bus: self.bus.ok_or(MissingField("bus"))?,
            handler: self.handler.ok_or(MissingField("handler"))?,
            shutdown: self.shutdown.ok_or(MissingField("shutdown"))?,
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::runtime::HandlerError;
    use async_trait::async_trait;
    use slotbook_core::message_bus::BusMessage;
    use slotbook_testing::InMemoryMessageBus;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collecting {
        seen: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl MessageHandler for Collecting {
        async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(message.payload.clone());
            if message.payload == b"bad" {
                return Err("bad payload".into());
            }
            Ok(())
        }
    }

    #[test]
    fn builder_reports_missing_fields() {
        let err = MessageConsumer::builder().name("x").build().err();
        assert_eq!(err, Some(MissingField("topics")));
    }

    #[tokio::test]
    async fn handler_errors_do_not_stop_the_consumer() {
        let bus = InMemoryMessageBus::new();
        let handler = Arc::new(Collecting::default());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let consumer = MessageConsumer::builder()
            .name("test")
            .topics(vec!["jobs".to_string()])
            .bus(Arc::new(bus.clone()))
            .handler(handler.clone())
            .shutdown(shutdown_rx)
            .retry_delay(Duration::from_millis(10))
            .build()
            .unwrap();
        let handle = consumer.spawn();

        // Let the consumer subscribe before publishing.
        tokio::time::sleep(Duration::from_millis(50)).await;
        for payload in [b"bad".to_vec(), b"good".to_vec()] {
            let message = BusMessage {
                topic: "jobs".to_string(),
                key: None,
                payload,
            };
            bus.publish(&message).await.unwrap();
        }

        for _ in 0..50 {
            if handler.seen.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handler.seen.lock().unwrap().len(), 2);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
