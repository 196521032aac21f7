//! In-process broker backed by `DashMap`.
//!
//! Each topic is a FIFO of ready records plus the records currently handed
//! out to a consumer. Messages are lost on restart.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use crate::notification::QueueRecord;

use super::{BrokerError, QueueSource, TopicPublisher};

#[derive(Default)]
struct TopicQueue {
    ready: VecDeque<QueueRecord>,
    /// Received but not yet acknowledged, oldest first
    in_flight: Vec<InFlight>,
}

struct InFlight {
    record: QueueRecord,
    visible_at: Instant,
}

pub struct MemoryBroker {
    topics: DashMap<String, TopicQueue>,
    /// Topic the queue side consumes from
    subscription: String,
    visibility_timeout: Duration,
    notify: Notify,
}

impl MemoryBroker {
    pub fn new(subscription: impl Into<String>, visibility_timeout: Duration) -> Self {
        Self {
            topics: DashMap::new(),
            subscription: subscription.into(),
            visibility_timeout,
            notify: Notify::new(),
        }
    }

    /// Records waiting to be received on `topic`
    pub fn depth(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|t| t.ready.len()).unwrap_or(0)
    }

    /// Records received from `topic` but not yet acknowledged
    pub fn in_flight(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|t| t.in_flight.len()).unwrap_or(0)
    }

    /// Hand out up to `max` records, returning them with the instant the
    /// earliest in-flight record becomes visible again.
    fn take_ready(&self, max: usize) -> (Vec<QueueRecord>, Option<Instant>) {
        let mut entry = self.topics.entry(self.subscription.clone()).or_default();
        let topic = &mut *entry;
        let now = Instant::now();

        // Timed-out deliveries go back to the front, keeping their original order
        let (expired, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut topic.in_flight)
            .into_iter()
            .partition(|f| f.visible_at <= now);
        topic.in_flight = pending;
        for flight in expired.into_iter().rev() {
            tracing::debug!(
                message_id = ?flight.record.message_id,
                "Visibility timeout expired, record available again"
            );
            topic.ready.push_front(flight.record);
        }

        let count = max.min(topic.ready.len());
        let records: Vec<QueueRecord> = topic.ready.drain(..count).collect();
        let visible_at = now + self.visibility_timeout;
        topic
            .in_flight
            .extend(records.iter().cloned().map(|record| InFlight { record, visible_at }));

        let next_visible = topic.in_flight.iter().map(|f| f.visible_at).min();
        (records, next_visible)
    }
}

#[async_trait]
impl TopicPublisher for MemoryBroker {
    async fn publish(&self, topic: &str, message: &str) -> Result<String, BrokerError> {
        let message_id = Uuid::new_v4().to_string();

        self.topics
            .entry(topic.to_string())
            .or_default()
            .ready
            .push_back(QueueRecord::new(message_id.clone(), message));

        if topic == self.subscription {
            self.notify.notify_one();
        }

        tracing::debug!(topic = %topic, message_id = %message_id, "Message published to memory topic");
        Ok(message_id)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl QueueSource for MemoryBroker {
    async fn receive(
        &self,
        max_records: usize,
        wait: Duration,
    ) -> Result<Vec<QueueRecord>, BrokerError> {
        if max_records == 0 {
            return Ok(Vec::new());
        }

        let deadline = Instant::now() + wait;
        loop {
            let (records, next_visible) = self.take_ready(max_records);
            if !records.is_empty() {
                return Ok(records);
            }

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn ack(&self, records: &[QueueRecord]) -> Result<(), BrokerError> {
        let Some(mut topic) = self.topics.get_mut(&self.subscription) else {
            return Ok(());
        };

        topic.in_flight.retain(|flight| {
            !records
                .iter()
                .any(|r| r.message_id.is_some() && r.message_id == flight.record.message_id)
        });
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
