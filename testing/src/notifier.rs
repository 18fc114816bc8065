//! Recording notifier

#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

use slotbook_core::notification::{Notifier, NotifyError};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// A delivered message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    /// Body
    pub text: String,
    /// Destination phone number
    pub destination: String,
}

#[derive(Default)]
struct NotifierState {
    sent: Vec<SentMessage>,
    failures_left: usize,
}

/// [`Notifier`] that records messages instead of sending them.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<NotifierState>>,
}

impl RecordingNotifier {
    /// Create a new notifier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` deliveries.
    pub fn fail_next(&self, n: usize) {
        self.state.lock().unwrap().failures_left = n;
    }

    /// Messages delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send_message(
        &self,
        text: &str,
        destination: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        let message = SentMessage {
            text: text.to_string(),
            destination: destination.to_string(),
        };
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if state.failures_left > 0 {
                state.failures_left -= 1;
                return Err(NotifyError::Transport("injected failure".to_string()));
            }
            state.sent.push(message);
            Ok(())
        })
    }
}
