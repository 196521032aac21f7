//! Graceful shutdown handling.
//!
//! 1. Wait for Ctrl+C or SIGTERM
//! 2. Signal background tasks to stop
//! 3. Give the queue consumer time to finish the batch it is dispatching

use std::time::{Duration, Instant};

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Default time allowed for an in-flight batch to finish
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolves once the process is asked to stop, returning the reason.
pub async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "ctrl_c",
        _ = terminate => "terminate",
    }
}

/// Wait for a signal, then tell background tasks to stop.
pub async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let reason = wait_for_signal().await;
    tracing::info!(reason = reason, "Initiating graceful shutdown");
    // No receivers just means nothing is running in the background
    let _ = shutdown_tx.send(());
}

/// Wait up to `drain_timeout` for a background task to finish.
/// Returns false if it had to be abandoned.
pub async fn drain_task(name: &str, handle: JoinHandle<()>, drain_timeout: Duration) -> bool {
    let start = Instant::now();
    match timeout(drain_timeout, handle).await {
        Ok(Ok(())) => {
            tracing::info!(
                task = name,
                duration_ms = start.elapsed().as_millis() as u64,
                "Background task stopped"
            );
            true
        }
        Ok(Err(e)) => {
            tracing::error!(task = name, error = %e, "Background task panicked");
            false
        }
        Err(_) => {
            tracing::warn!(
                task = name,
                timeout_ms = drain_timeout.as_millis() as u64,
                "Background task did not stop in time"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_finished_task() {
        let handle = tokio::spawn(async {});
        assert!(drain_task("noop", handle, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_drain_times_out() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        });
        assert!(!drain_task("slow", handle, Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_drain_reports_panics() {
        let handle = tokio::spawn(async {
            panic!("boom");
        });
        assert!(!drain_task("panicky", handle, Duration::from_secs(1)).await);
    }
}
