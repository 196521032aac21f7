use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use notification_dispatch_service::config::Settings;
use notification_dispatch_service::server::{create_app, AppState};
use notification_dispatch_service::shutdown::{
    drain_task, shutdown_signal_handler, DEFAULT_DRAIN_TIMEOUT,
};
use notification_dispatch_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing; the guard flushes spans on exit
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!(
        topic = %settings.notification.topic,
        broker = %settings.broker.backend,
        "Configuration loaded"
    );

    // Create application state
    let state = AppState::from_settings(settings.clone())?;
    tracing::info!("Application state initialized");

    // The consumer owns the shutdown channel when it runs
    let shutdown_tx = state
        .consumer
        .as_ref()
        .map(|consumer| consumer.shutdown_signal())
        .unwrap_or_else(|| broadcast::channel(1).0);

    // Start the queue consumer in background
    let consumer_handle = state
        .consumer
        .clone()
        .map(|consumer| tokio::spawn(async move { consumer.run().await }));

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for the consumer to finish its current batch
    if let Some(handle) = consumer_handle {
        tracing::info!("Waiting for queue consumer to finish...");
        drain_task("queue_consumer", handle, DEFAULT_DRAIN_TIMEOUT).await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
