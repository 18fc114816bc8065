//! Slotbook HTTP server.
//!
//! Serves the inquiry, review and payment callback API, consumes booking
//! creation requests and delivers queued notifications.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use slotbook_core::environment::SystemClock;
use slotbook_core::message_bus::MessageBus;
use slotbook_core::notification::Notifier;
use slotbook_postgres::PostgresStore;
use slotbook_redpanda::RedpandaMessageBus;
use slotbook_server::app::{
    BookingService, InquiryService, PaymentReconciler, Repositories, ReviewService,
};
use slotbook_server::notification::{LogNotifier, WhatsAppNotifier};
use slotbook_server::runtime::{
    Application, BookingCreationHandler, MessageConsumer, OutboxDispatcher,
};
use slotbook_server::server::{AppState, PostgresCheck, build_router};
use slotbook_server::signature::SignatureVerifier;
use slotbook_server::{Config, metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotbook=info,slotbook_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Slotbook server");

    let config = Config::from_env();
    info!(
        redpanda_brokers = %config.redpanda.brokers,
        booking_topic = %config.redpanda.booking_topic,
        capacity_policy = ?config.booking.capacity_policy,
        "Configuration loaded"
    );

    let metrics_address: std::net::SocketAddr = config
        .metrics_address()
        .parse()
        .context("invalid metrics address")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_address)
        .install()
        .context("failed to install Prometheus exporter")?;
    metrics::register_business_metrics();
    info!(%metrics_address, "Metrics exporter listening");

    info!("Connecting to PostgreSQL...");
    let store =
        PostgresStore::connect(&config.postgres.url, config.postgres.max_connections).await?;
    if config.postgres.run_migrations {
        store.run_migrations().await?;
        info!("Schema migrations applied");
    }

    info!("Connecting to Redpanda...");
    let bus: Arc<dyn MessageBus> = Arc::new(
        RedpandaMessageBus::builder()
            .brokers(&config.redpanda.brokers)
            .consumer_group(&config.redpanda.consumer_group)
            .build()?,
    );

    let notifier: Arc<dyn Notifier> = match &config.notification.url {
        Some(url) => Arc::new(WhatsAppNotifier::new(
            url.clone(),
            config.notification.token.clone(),
            Duration::from_secs(config.notification.timeout),
        )?),
        None => {
            info!("No notification gateway configured, messages will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let clock = Arc::new(SystemClock);
    let repositories = Repositories::from_store(store.clone());

    let bookings =
        BookingService::new(&repositories, clock.clone(), config.booking.capacity_policy);
    let inquiries = InquiryService::new(
        &repositories,
        clock.clone(),
        config.payment.payment_link_base.clone(),
        config.payment.status_page_base.clone(),
    );
    let reviews = ReviewService::new(&repositories, clock.clone());
    let payments = PaymentReconciler::new(
        repositories.inquiries.clone(),
        bus.clone(),
        SignatureVerifier::new(config.payment.server_key.clone()),
        config.redpanda.booking_topic.clone(),
        clock,
    );

    let (shutdown_tx, _) = broadcast::channel(4);

    let handler = BookingCreationHandler::new(
        bookings,
        Arc::new(store.dead_letter_queue()),
        config.booking.max_attempts,
        Duration::from_millis(config.booking.retry_backoff_ms),
    );
    let consumer = MessageConsumer::builder()
        .name("booking-creation")
        .topics(vec![config.redpanda.booking_topic.clone()])
        .bus(bus)
        .handler(Arc::new(handler))
        .shutdown(shutdown_tx.subscribe())
        .retry_delay(Duration::from_secs(config.redpanda.retry_delay))
        .build()?;

    let dispatcher = OutboxDispatcher::new(
        repositories.outbox.clone(),
        notifier,
        config.notification.batch_size,
        config.notification.max_attempts,
        Duration::from_millis(config.notification.poll_interval_ms),
    );

    let state = AppState::new(
        inquiries,
        reviews,
        payments,
        repositories.bookings.clone(),
        vec![Arc::new(PostgresCheck::new(store))],
    );
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    Application::new(
        listener,
        router,
        vec![consumer],
        Some(dispatcher),
        shutdown_tx,
        config.shutdown_timeout(),
    )
    .run()
    .await?;

    Ok(())
}
