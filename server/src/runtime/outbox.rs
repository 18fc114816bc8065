//! Outbox dispatcher.
//!
//! Polls the notification outbox and hands each pending entry to the
//! [`Notifier`]. A failed delivery stays in the outbox with its attempt count
//! bumped and is retried on a later poll until `max_attempts` is reached.

use crate::metrics;
use slotbook_core::notification::Notifier;
use slotbook_core::store::{NotificationOutbox, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Result of one dispatch pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Entries delivered
    pub sent: usize,
    /// Entries that failed this pass
    pub failed: usize,
}

/// Delivers queued notifications.
#[derive(Clone)]
pub struct OutboxDispatcher {
    outbox: Arc<dyn NotificationOutbox>,
    notifier: Arc<dyn Notifier>,
    batch_size: usize,
    max_attempts: u32,
    poll_interval: Duration,
}

impl OutboxDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(
        outbox: Arc<dyn NotificationOutbox>,
        notifier: Arc<dyn Notifier>,
        batch_size: usize,
        max_attempts: u32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            outbox,
            notifier,
            batch_size,
            max_attempts,
            poll_interval,
        }
    }

    /// Deliver up to one batch of pending entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the outbox cannot be read or updated.
    pub async fn dispatch_once(&self) -> Result<DispatchReport, StoreError> {
        let pending = self.outbox.pending(self.batch_size, self.max_attempts).await?;
        let mut report = DispatchReport::default();

        for entry in pending {
            let notification = &entry.notification;
            match self
                .notifier
                .send_message(&notification.text, &notification.destination)
                .await
            {
                Ok(()) => {
                    self.outbox.mark_sent(entry.id).await?;
                    metrics::record_notification(true);
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(
                        outbox_id = entry.id,
                        audience = ?notification.audience,
                        attempt = entry.attempts + 1,
                        error = %e,
                        "Notification delivery failed"
                    );
                    self.outbox.mark_failed(entry.id, &e.to_string()).await?;
                    metrics::record_notification(false);
                    report.failed += 1;
                }
            }
        }

        if report != DispatchReport::default() {
            debug!(sent = report.sent, failed = report.failed, "Outbox pass complete");
        }
        Ok(report)
    }

    /// Poll the outbox every `poll_interval` until shutdown.
    #[must_use]
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval = ?self.poll_interval, "Outbox dispatcher started");
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.dispatch_once().await {
                            warn!(error = %e, "Outbox pass failed");
                        }
                    }
                }
            }
            info!("Outbox dispatcher stopped");
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use slotbook_core::notification::{Audience, Notification};
    use slotbook_testing::{InMemoryDocumentStore, RecordingNotifier};

    fn dispatcher(store: &InMemoryDocumentStore, notifier: &RecordingNotifier) -> OutboxDispatcher {
        OutboxDispatcher::new(
            Arc::new(store.clone()),
            Arc::new(notifier.clone()),
            10,
            2,
            Duration::from_millis(10),
        )
    }

    async fn enqueue_one(store: &InMemoryDocumentStore) {
        store
            .enqueue(vec![Notification {
                audience: Audience::Guest,
                destination: "6281234567890".to_string(),
                text: "hello".to_string(),
            }])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delivers_and_marks_sent() {
        let store = InMemoryDocumentStore::new();
        let notifier = RecordingNotifier::new();
        enqueue_one(&store).await;

        let report = dispatcher(&store, &notifier).dispatch_once().await.unwrap();
        assert_eq!(report, DispatchReport { sent: 1, failed: 0 });
        assert_eq!(notifier.sent()[0].destination, "6281234567890");
        assert!(store.outbox()[0].1);

        let report = dispatcher(&store, &notifier).dispatch_once().await.unwrap();
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn failed_delivery_is_retried_until_max_attempts() {
        let store = InMemoryDocumentStore::new();
        let notifier = RecordingNotifier::new();
        notifier.fail_next(5);
        enqueue_one(&store).await;
        let dispatcher = dispatcher(&store, &notifier);

        assert_eq!(dispatcher.dispatch_once().await.unwrap().failed, 1);
        assert_eq!(dispatcher.dispatch_once().await.unwrap().failed, 1);
        assert_eq!(dispatcher.dispatch_once().await.unwrap(), DispatchReport::default());

        let (entry, sent) = store.outbox().remove(0);
        assert!(!sent);
        assert_eq!(entry.attempts, 2);
        assert!(entry.last_error.is_some());
    }

    #[tokio::test]
    async fn spawned_dispatcher_stops_on_shutdown() {
        let store = InMemoryDocumentStore::new();
        let notifier = RecordingNotifier::new();
        enqueue_one(&store).await;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = dispatcher(&store, &notifier).spawn(shutdown_rx);
        for _ in 0..50 {
            if !notifier.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(notifier.sent().len(), 1);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
