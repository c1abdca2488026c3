use court_booking::application::{
    BookingService, ConsumerSettings, LifecyclePublisher, LogNotifier, PaymentEventConsumer,
};
use court_booking::config::{AppConfig, MessagingBackend, StorageBackend};
use court_booking::domain::booking::BookingStore;
use court_booking::infrastructure::messaging::{EventPublisher, EventSubscriber, InMemoryEventChannel};
use court_booking::infrastructure::persistence::InMemoryBookingStore;
use court_booking::interface::api::{build_router, init_metrics, AppState};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "postgres")]
use court_booking::infrastructure::persistence::{create_pool, run_migrations, DatabaseConfig, PgBookingStore};
#[cfg(feature = "kafka")]
use court_booking::infrastructure::messaging::KafkaEventChannel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting court booking service");

    let store = build_store(&config).await?;
    let (publisher, subscriber) = build_channel(&config)?;
    let lifecycle = LifecyclePublisher::new(publisher, config.messaging.topics.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let consumer = PaymentEventConsumer::new(
        subscriber,
        store.clone(),
        lifecycle.clone(),
        Arc::new(LogNotifier),
        ConsumerSettings::from_config(&config.messaging, &config.booking),
    );
    let consumer_shutdown = shutdown_tx.subscribe();
    let consumer_handle = tokio::spawn(async move {
        consumer.run(consumer_shutdown).await;
    });

    let prometheus_handle = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus exporter not installed: {}", e);
            None
        }
    };

    let state = AppState {
        bookings: Arc::new(BookingService::new(store, lifecycle, config.booking.clone())),
    };
    let app = build_router(state, prometheus_handle);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("REST API listening on {}", addr);

    let mut server_shutdown = shutdown_tx.subscribe();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.recv().await;
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    let _ = shutdown_tx.send(());

    server_handle.await??;
    consumer_handle.await?;

    info!("Court booking service stopped");
    Ok(())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn BookingStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory booking store; data is lost on exit");
            Ok(Arc::new(InMemoryBookingStore::new()))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            let pool = create_pool(&DatabaseConfig::from_settings(&config.database)).await?;
            run_migrations(&pool).await?;
            Ok(Arc::new(PgBookingStore::new(pool)))
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => {
            anyhow::bail!("storage.backend = \"postgres\" requires the `postgres` feature")
        }
    }
}

fn build_channel(config: &AppConfig) -> anyhow::Result<(Arc<dyn EventPublisher>, Arc<dyn EventSubscriber>)> {
    match config.messaging.backend {
        MessagingBackend::Memory => {
            warn!("Using in-memory event channel; events stay inside this process");
            let channel = InMemoryEventChannel::new();
            let publisher: Arc<dyn EventPublisher> = Arc::new(channel.clone());
            let subscriber: Arc<dyn EventSubscriber> = Arc::new(channel);
            Ok((publisher, subscriber))
        }
        #[cfg(feature = "kafka")]
        MessagingBackend::Kafka => {
            let channel = Arc::new(KafkaEventChannel::new(&config.messaging)?);
            let publisher: Arc<dyn EventPublisher> = channel.clone();
            let subscriber: Arc<dyn EventSubscriber> = channel;
            Ok((publisher, subscriber))
        }
        #[cfg(not(feature = "kafka"))]
        MessagingBackend::Kafka => {
            anyhow::bail!("messaging.backend = \"kafka\" requires the `kafka` feature")
        }
    }
}
