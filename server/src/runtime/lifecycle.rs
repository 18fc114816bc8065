//! Application lifecycle and graceful shutdown.
//!
//! On Ctrl+C or SIGTERM:
//! 1. the HTTP server stops accepting connections and drains in-flight requests
//! 2. shutdown is broadcast to every consumer and the outbox dispatcher
//! 3. each background task gets `shutdown_timeout` to finish its current work

use crate::runtime::{MessageConsumer, OutboxDispatcher};
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A fully wired process, ready to run.
pub struct Application {
    listener: tokio::net::TcpListener,
    router: axum::Router,
    consumers: Vec<MessageConsumer>,
    dispatcher: Option<OutboxDispatcher>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_timeout: Duration,
}

impl Application {
    /// Assemble an application.
    ///
    /// `consumers` must have been built with receivers from `shutdown_tx`.
    #[must_use]
    pub fn new(
        listener: tokio::net::TcpListener,
        router: axum::Router,
        consumers: Vec<MessageConsumer>,
        dispatcher: Option<OutboxDispatcher>,
        shutdown_tx: broadcast::Sender<()>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            listener,
            router,
            consumers,
            dispatcher,
            shutdown_tx,
            shutdown_timeout,
        }
    }

    /// Run until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the HTTP server fails.
    pub async fn run(self) -> std::io::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` completes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the HTTP server fails.
    pub async fn run_until<F>(self, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(address) = self.listener.local_addr() {
            info!(%address, "Starting HTTP server");
        }

        info!(consumer_count = self.consumers.len(), "Starting message consumers");
        let mut handles: Vec<(String, JoinHandle<()>)> = self
            .consumers
            .into_iter()
            .map(|consumer| (consumer.name().to_string(), consumer.spawn()))
            .collect();
        if let Some(dispatcher) = self.dispatcher {
            handles.push(("outbox".to_string(), dispatcher.spawn(self.shutdown_tx.subscribe())));
        }

        let served = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await;
        if let Err(e) = &served {
            error!(error = %e, "HTTP server failed");
        }

        info!("HTTP server stopped, initiating graceful shutdown");
        let _ = self.shutdown_tx.send(());
        Self::await_shutdown(handles, self.shutdown_timeout).await;

        info!("Graceful shutdown complete");
        served
    }

    async fn await_shutdown(handles: Vec<(String, JoinHandle<()>)>, timeout: Duration) {
        for (task, handle) in handles {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => info!(%task, "Background task stopped gracefully"),
                Ok(Err(e)) => warn!(%task, error = %e, "Background task failed"),
                Err(_) => warn!(%task, "Background task shutdown timed out"),
            }
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed the failure is logged and that signal is
/// never observed.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
