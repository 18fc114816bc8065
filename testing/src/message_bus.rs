//! In-memory message bus
//!
//! Fan-out over `tokio::sync::broadcast` per topic. Every published message is
//! also recorded so tests can assert on what was sent without subscribing.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use slotbook_core::message_bus::{BusMessage, MessageBus, MessageBusError, MessageStream};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Default)]
struct BusState {
    topics: HashMap<String, broadcast::Sender<BusMessage>>,
    published: Vec<BusMessage>,
    fail_publish: bool,
}

impl BusState {
    fn sender(&mut self, topic: &str) -> broadcast::Sender<BusMessage> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

/// In-memory [`MessageBus`] for tests.
///
/// # Example
///
/// ```
/// use slotbook_testing::InMemoryMessageBus;
///
/// let bus = InMemoryMessageBus::new();
/// assert!(bus.published().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryMessageBus {
    state: Arc<Mutex<BusState>>,
}

impl InMemoryMessageBus {
    /// Create a new bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<BusMessage> {
        self.state.lock().unwrap().published.clone()
    }

    /// Messages published to one topic.
    #[must_use]
    pub fn published_to(&self, topic: &str) -> Vec<BusMessage> {
        self.published()
            .into_iter()
            .filter(|message| message.topic == topic)
            .collect()
    }

    /// Make publishes fail.
    pub fn fail_publish(&self, fail: bool) {
        self.state.lock().unwrap().fail_publish = fail;
    }
}

impl MessageBus for InMemoryMessageBus {
    fn publish(
        &self,
        message: &BusMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), MessageBusError>> + Send + '_>> {
        let message = message.clone();
        Box::pin(async move {
            let sender = {
                let mut state = self.state.lock().unwrap();
                if state.fail_publish {
                    return Err(MessageBusError::PublishFailed {
                        topic: message.topic.clone(),
                        reason: "publishing disabled".to_string(),
                    });
                }
                state.published.push(message.clone());
                state.sender(&message.topic)
            };
            // No subscribers is not an error.
            let _ = sender.send(message);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, MessageBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        Box::pin(async move {
            let receivers: Vec<broadcast::Receiver<BusMessage>> = {
                let mut state = self.state.lock().unwrap();
                topics.iter().map(|topic| state.sender(topic).subscribe()).collect()
            };

            let (tx, mut rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
            for mut receiver in receivers {
                let tx = tx.clone();
                tokio::spawn(async move {
                    loop {
                        let item = match receiver.recv().await {
                            Ok(message) => Ok(message),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                let reason = format!("lagged by {skipped} messages");
                                Err(MessageBusError::TransportError(reason))
                            },
                            Err(broadcast::error::RecvError::Closed) => break,
                        };
                        if tx.send(item).await.is_err() {
                            break;
                        }
                    }
                });
            }

            let stream = async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            };
            Ok(Box::pin(stream) as MessageStream)
        })
    }
}
