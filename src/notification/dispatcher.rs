use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tracing::instrument;

use crate::error::NotificationError;
use crate::metrics::{BatchMetrics, DeliveryMetrics};
use crate::providers::{EmailMessage, EmailProvider, Providers, SmsMessage, SmsProvider};

use super::{Channel, QueueBatch, QueueRecord, QueuedNotification, QueuedRecord};

/// Subject line of every email delivery
pub const EMAIL_SUBJECT: &str = "Email notification from Notification Microservice";

/// Summary of a successfully dispatched batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Records handled, including skipped ones
    pub records_processed: usize,
    /// Provider calls made
    pub deliveries: usize,
    /// Records whose channel was neither sms nor email
    pub records_skipped: usize,
}

/// Statistics for the notification dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub batches_processed: AtomicU64,
    pub batches_failed: AtomicU64,
    pub deliveries_succeeded: AtomicU64,
    pub deliveries_failed: AtomicU64,
    pub records_skipped: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            deliveries_succeeded: self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub batches_processed: u64,
    pub batches_failed: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub records_skipped: u64,
}

/// Fans queued notifications out to the SMS and email providers.
pub struct NotificationDispatcher {
    sms: Arc<dyn SmsProvider>,
    email: Arc<dyn EmailProvider>,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    pub fn new(sms: Arc<dyn SmsProvider>, email: Arc<dyn EmailProvider>) -> Self {
        Self {
            sms,
            email,
            stats: DispatcherStats::default(),
        }
    }

    pub fn from_providers(providers: &Providers) -> Self {
        Self::new(providers.sms.clone(), providers.email.clone())
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver every record of `batch`, in order.
    ///
    /// The first record that fails to decode, or has a failed delivery, ends
    /// the batch: later records are not touched and deliveries that already
    /// went out stay delivered.
    #[instrument(skip(self, batch), fields(records = batch.len()))]
    pub async fn dispatch(&self, batch: &QueueBatch) -> Result<DispatchReport, NotificationError> {
        let mut report = DispatchReport::default();

        for (index, record) in batch.records.iter().enumerate() {
            match self.dispatch_record(record).await {
                Ok(Some(deliveries)) => report.deliveries += deliveries,
                Ok(None) => report.records_skipped += 1,
                Err(e) => {
                    self.stats.batches_failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        record = index,
                        message_id = ?record.message_id,
                        error = %e,
                        "Batch aborted"
                    );
                    return Err(e);
                }
            }
            report.records_processed += 1;
        }

        self.stats.batches_processed.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            records = report.records_processed,
            deliveries = report.deliveries,
            skipped = report.records_skipped,
            "Batch dispatched"
        );
        Ok(report)
    }

    /// Returns the number of deliveries made, or `None` if the channel was
    /// not recognised.
    async fn dispatch_record(&self, record: &QueueRecord) -> Result<Option<usize>, NotificationError> {
        let notification = match QueuedRecord::from_body(&record.body)? {
            QueuedRecord::Deliver(notification) => notification,
            QueuedRecord::Unrouted(channel) => {
                tracing::warn!(
                    channel = %channel,
                    message_id = ?record.message_id,
                    "Unrecognised channel, record skipped"
                );
                self.stats.records_skipped.fetch_add(1, Ordering::Relaxed);
                BatchMetrics::record_skipped();
                return Ok(None);
            }
        };
        let channel = notification.channel;

        // Every delivery runs to completion before the first failure is reported
        let results = join_all(
            notification
                .recipients
                .iter()
                .map(|recipient| self.deliver(channel, recipient, &notification)),
        )
        .await;

        let deliveries = results.len();
        results.into_iter().collect::<Result<Vec<()>, _>>()?;
        Ok(Some(deliveries))
    }

    async fn deliver(
        &self,
        channel: Channel,
        recipient: &str,
        notification: &QueuedNotification,
    ) -> Result<(), NotificationError> {
        let started = Instant::now();
        let result = match channel {
            Channel::Sms => {
                let message = SmsMessage {
                    destination: recipient.to_string(),
                    message: notification.message.clone(),
                    sender_id: notification.sender.clone(),
                };
                self.sms.send(&message).await
            }
            Channel::Email => {
                let message = EmailMessage {
                    source: notification.sender.clone(),
                    destination: recipient.to_string(),
                    subject: EMAIL_SUBJECT.to_string(),
                    body_text: notification.message.clone(),
                };
                self.email.send(&message).await
            }
        };
        DeliveryMetrics::record(channel.as_str(), result.is_ok(), started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                self.stats.deliveries_succeeded.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(source) => {
                self.stats.deliveries_failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    channel = %channel,
                    recipient = %recipient,
                    error = %source,
                    "Delivery failed"
                );
                Err(NotificationError::Delivery {
                    recipient: recipient.to_string(),
                    source,
                })
            }
        }
    }
}
