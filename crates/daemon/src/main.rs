//! MEDQ Queue Engine - Main Entry Point
//!
//! Composition root: wires the SQLite adapters into the queue coordinator
//! and runs the change-event consumer until shutdown. Transport layers
//! (HTTP, CLI) call the coordinator directly and live outside this crate.

mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use medq_core::application::{shutdown_channel, QueueCoordinator, ShutdownToken, WaitEstimator};
use medq_core::port::time_provider::SystemTimeProvider;
use medq_core::port::DoctorRegistry;
use medq_infra_sqlite::{create_pool, run_migrations, SqliteDoctorRegistry, SqliteQueueStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "~/.medq/queue.db";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (JSON for production, pretty for development)
    let log_format = std::env::var("MEDQ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("medq=info"))
        .expect("Failed to create env filter");

    // Optional daily-rolling JSON file log next to the console output
    let mut file_guard = None;
    let file_layer = std::env::var("MEDQ_LOG_DIR").ok().map(|dir| {
        let appender = tracing_appender::rolling::daily(shellexpand::tilde(&dir).into_owned(), "medq.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        fmt::layer().json().with_writer(writer)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match log_format.as_str() {
        "json" => subscriber.with(fmt::layer().json()).init(),
        _ => subscriber.with(fmt::layer().pretty()).init(),
    }
    // Keep the non-blocking writer alive for the process lifetime
    let _file_guard = file_guard;

    info!("MEDQ queue engine v{} starting...", VERSION);

    // 1.1. Initialize OpenTelemetry (optional)
    if let Err(e) = telemetry::init_telemetry() {
        tracing::warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    }

    // 2. Load configuration
    let db_path = std::env::var("MEDQ_DB_PATH")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());

    info!(db_path = %db_path, "Initializing database...");

    // 3. Initialize database
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let registry = Arc::new(SqliteDoctorRegistry::new(pool.clone()));
    let store = Arc::new(SqliteQueueStore::new(pool.clone()));
    let time_provider = Arc::new(SystemTimeProvider);

    let coordinator = Arc::new(QueueCoordinator::new(
        registry.clone(),
        store,
        time_provider,
        WaitEstimator::default(),
    ));

    match registry.list_on_duty().await {
        Ok(on_duty) => info!(doctors = on_duty.len(), "On-duty doctors at startup"),
        Err(e) => tracing::warn!(error = %e, "Could not list on-duty doctors"),
    }

    // 5. Start the change-event consumer (stand-in for the notification
    // layer; real delivery subscribes the same way)
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let events = coordinator.subscribe();
    let consumer_handle = tokio::spawn(consume_events(events, shutdown_rx));

    info!("Queue engine ready. Waiting for operations...");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    shutdown_tx.shutdown();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), consumer_handle).await;

    info!("Shutdown complete.");

    Ok(())
}

/// Log every queue change until shutdown.
async fn consume_events(
    mut events: tokio::sync::broadcast::Receiver<medq_core::application::QueueChanged>,
    mut shutdown: ShutdownToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            event = events.recv() => match event {
                Ok(change) => {
                    info!(
                        doctor_id = %change.doctor_id,
                        day = %change.day,
                        queue_len = change.entries.len(),
                        "queue changed"
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "event consumer lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
