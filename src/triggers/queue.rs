use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::broker::QueueSource;
use crate::config::BrokerConfig;
use crate::metrics::BatchMetrics;
use crate::notification::{NotificationDispatcher, QueueBatch, QueueRecord};
use crate::redis::{BackoffConfig, ExponentialBackoff};

/// Counters for the background consumer
#[derive(Debug, Default)]
struct ConsumerStats {
    batches_received: AtomicU64,
    batches_acked: AtomicU64,
    batches_failed: AtomicU64,
    receive_errors: AtomicU64,
}

/// Snapshot of consumer statistics
#[derive(Debug, Clone, Serialize)]
pub struct ConsumerStatsSnapshot {
    pub batches_received: u64,
    pub batches_acked: u64,
    pub batches_failed: u64,
    pub receive_errors: u64,
}

/// Pulls batches from the queue and hands them to the dispatcher.
///
/// A batch is acknowledged only when every record in it was dispatched.
/// Anything else is left for the queue to deliver again once its visibility
/// timeout passes.
pub struct QueueConsumer {
    queue: Arc<dyn QueueSource>,
    dispatcher: Arc<NotificationDispatcher>,
    batch_size: usize,
    wait: Duration,
    backoff: BackoffConfig,
    shutdown: broadcast::Sender<()>,
    stats: ConsumerStats,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn QueueSource>,
        dispatcher: Arc<NotificationDispatcher>,
        config: &BrokerConfig,
        backoff: BackoffConfig,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            queue,
            dispatcher,
            batch_size: config.batch_size,
            wait: Duration::from_millis(config.wait_time_ms),
            backoff,
            shutdown,
            stats: ConsumerStats::default(),
        }
    }

    /// Get a shutdown signal sender
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> ConsumerStatsSnapshot {
        ConsumerStatsSnapshot {
            batches_received: self.stats.batches_received.load(Ordering::Relaxed),
            batches_acked: self.stats.batches_acked.load(Ordering::Relaxed),
            batches_failed: self.stats.batches_failed.load(Ordering::Relaxed),
            receive_errors: self.stats.receive_errors.load(Ordering::Relaxed),
        }
    }

    /// Run until a shutdown signal arrives. A batch already being dispatched
    /// is finished before the loop exits.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut backoff = ExponentialBackoff::new(self.backoff.clone());

        tracing::info!(
            backend = self.queue.backend_name(),
            batch_size = self.batch_size,
            wait_ms = self.wait.as_millis() as u64,
            "Starting queue consumer"
        );

        loop {
            let received = tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Queue consumer received shutdown signal");
                    break;
                }
                received = self.queue.receive(self.batch_size, self.wait) => received,
            };

            match received {
                Ok(records) => {
                    backoff.reset();
                    if !records.is_empty() {
                        self.process(records).await;
                    }
                }
                Err(e) => {
                    self.stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                    BatchMetrics::record_receive_error();

                    let delay = backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Queue receive failed, retrying"
                    );

                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            tracing::info!("Queue consumer received shutdown signal");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!("Queue consumer stopped");
    }

    /// Dispatch one received batch, acknowledging it on success.
    /// Returns whether the batch was acknowledged.
    pub async fn process(&self, records: Vec<QueueRecord>) -> bool {
        self.stats.batches_received.fetch_add(1, Ordering::Relaxed);
        let batch = QueueBatch::new(records);

        let dispatched = self.dispatcher.dispatch(&batch).await;
        BatchMetrics::record_batch("queue", batch.len(), dispatched.is_ok());

        if let Err(e) = dispatched {
            self.stats.batches_failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                error = %e,
                records = batch.len(),
                "Batch failed, leaving records for redelivery"
            );
            return false;
        }

        match self.queue.ack(&batch.records).await {
            Ok(()) => {
                self.stats.batches_acked.fetch_add(1, Ordering::Relaxed);
                BatchMetrics::record_acked(batch.len());
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    records = batch.len(),
                    "Failed to acknowledge batch, records will be redelivered"
                );
                false
            }
        }
    }
}
