//! Notifier implementations.
//!
//! - [`WhatsAppNotifier`]: posts `{ "content", "target" }` to an HTTP
//!   messaging gateway
//! - [`LogNotifier`]: logs messages instead of sending them (development)

use reqwest::{Client, StatusCode};
use serde::Serialize;
use slotbook_core::notification::{Notifier, NotifyError};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

#[derive(Serialize)]
struct WhatsAppMessage<'a> {
    content: &'a str,
    target: &'a str,
}

/// Sends messages through an HTTP WhatsApp gateway.
#[derive(Clone)]
pub struct WhatsAppNotifier {
    client: Client,
    url: String,
    token: Option<String>,
}

impl WhatsAppNotifier {
    /// Create a notifier for the gateway at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

impl Notifier for WhatsAppNotifier {
    fn send_message(
        &self,
        text: &str,
        destination: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        let text = text.to_string();
        let destination = destination.to_string();
        Box::pin(async move {
            let mut request = self.client.post(&self.url).json(&WhatsAppMessage {
                content: &text,
                target: &destination,
            });
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| NotifyError::Transport(e.to_string()))?;

            match response.status() {
                status if status.is_success() => Ok(()),
                status @ (StatusCode::TOO_MANY_REQUESTS
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE) => {
                    Err(NotifyError::Transport(format!("gateway busy ({status})")))
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    Err(NotifyError::Rejected {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
        })
    }
}

/// Logs every message at `info` and reports success.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_message(
        &self,
        text: &str,
        destination: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        tracing::info!(destination, text, "Notification (not sent: no gateway configured)");
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.send_message("hi", "6281").await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_transport_error() {
        let notifier =
            WhatsAppNotifier::new("http://127.0.0.1:9/send", None, Duration::from_millis(500))
                .unwrap();
        let result = notifier.send_message("hi", "6281").await;
        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }
}
