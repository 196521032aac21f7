//! Redis Streams broker.
//!
//! Publishing is `XADD` onto the topic stream. The queue side is a consumer
//! group on that stream: new entries arrive through `XREADGROUP`, entries left
//! unacknowledged longer than the visibility timeout are taken back with
//! `XAUTOCLAIM` and delivered again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::StreamReadReply;
use tokio::sync::Mutex;

use crate::notification::QueueRecord;
use crate::redis::{RedisPool, RedisStreamExt};

use super::{BrokerError, QueueSource, TopicPublisher};

/// Stream field holding the serialized notification
const BODY_FIELD: &str = "body";

pub struct RedisStreamBroker {
    pool: Arc<RedisPool>,
    stream: String,
    group: String,
    consumer: String,
    max_len: usize,
    visibility_timeout: Duration,
    group_ready: AtomicBool,
    /// Dedicated connection for blocking reads
    reader: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStreamBroker {
    pub fn new(
        pool: Arc<RedisPool>,
        stream: impl Into<String>,
        group: String,
        consumer: String,
        max_len: usize,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            stream: stream.into(),
            group,
            consumer,
            max_len,
            visibility_timeout,
            group_ready: AtomicBool::new(false),
            reader: Mutex::new(None),
        }
    }

    async fn ensure_group(&self) -> Result<(), BrokerError> {
        if self.group_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        self.pool.ensure_group(&self.stream, &self.group).await?;
        self.group_ready.store(true, Ordering::Release);
        tracing::info!(stream = %self.stream, group = %self.group, "Consumer group ready");
        Ok(())
    }

    /// Entries idle past the visibility timeout, claimed for this consumer.
    async fn reclaim(&self, max_records: usize) -> Result<Vec<QueueRecord>, BrokerError> {
        let min_idle_ms = self.visibility_timeout.as_millis() as u64;
        let entries = self
            .pool
            .xautoclaim(&self.stream, &self.group, &self.consumer, min_idle_ms, max_records)
            .await
            .inspect_err(|_| self.group_ready.store(false, Ordering::Release))?;

        let mut malformed = Vec::new();
        let mut records = Vec::with_capacity(entries.len());
        for (id, mut fields) in entries {
            match fields.remove(BODY_FIELD) {
                Some(body) => records.push(QueueRecord::new(id, body)),
                None => malformed.push(id),
            }
        }
        self.discard_malformed(malformed).await;

        if !records.is_empty() {
            tracing::info!(
                stream = %self.stream,
                count = records.len(),
                "Reclaimed records past their visibility timeout"
            );
        }
        Ok(records)
    }

    /// New entries for the group, blocking up to `wait`.
    async fn read_new(
        &self,
        max_records: usize,
        wait: Duration,
    ) -> Result<Vec<QueueRecord>, BrokerError> {
        let mut reader = self.reader.lock().await;
        if reader.is_none() {
            *reader = Some(self.pool.dedicated_connection().await?);
        }
        let Some(conn) = reader.as_mut() else {
            return Err(BrokerError::Unavailable("no reader connection".to_string()));
        };

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(max_records);
        let wait_ms = wait.as_millis() as u64;
        if wait_ms > 0 {
            cmd.arg("BLOCK").arg(wait_ms);
        }
        cmd.arg("STREAMS").arg(&self.stream).arg(">");

        let reply: Option<StreamReadReply> = match cmd.query_async(conn).await {
            Ok(reply) => {
                self.pool.record_success();
                reply
            }
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    *reader = None;
                }
                if e.code() == Some("NOGROUP") {
                    self.group_ready.store(false, Ordering::Release);
                }
                self.pool.record_error(&e).await;
                return Err(BrokerError::Redis(e));
            }
        };
        drop(reader);

        let mut malformed = Vec::new();
        let mut records = Vec::new();
        for key in reply.map(|r| r.keys).unwrap_or_default() {
            for entry in key.ids {
                match entry.get::<String>(BODY_FIELD) {
                    Some(body) => records.push(QueueRecord::new(entry.id, body)),
                    None => malformed.push(entry.id),
                }
            }
        }
        self.discard_malformed(malformed).await;

        Ok(records)
    }

    /// Entries without a body can never be dispatched; acknowledge them so
    /// they do not cycle through redelivery forever.
    async fn discard_malformed(&self, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }

        tracing::warn!(
            stream = %self.stream,
            ids = ?ids,
            "Discarding stream entries without a body field"
        );
        if let Err(e) = self.pool.xack(&self.stream, &self.group, &ids).await {
            tracing::warn!(error = %e, "Failed to acknowledge malformed entries");
        }
    }
}

#[async_trait]
impl TopicPublisher for RedisStreamBroker {
    async fn publish(&self, topic: &str, message: &str) -> Result<String, BrokerError> {
        let id = self
            .pool
            .xadd_maxlen(topic, self.max_len, &[(BODY_FIELD, message)])
            .await?;

        tracing::debug!(topic = %topic, message_id = %id, "Message appended to Redis stream");
        Ok(id)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[async_trait]
impl QueueSource for RedisStreamBroker {
    async fn receive(
        &self,
        max_records: usize,
        wait: Duration,
    ) -> Result<Vec<QueueRecord>, BrokerError> {
        if max_records == 0 {
            return Ok(Vec::new());
        }

        self.ensure_group().await?;

        let reclaimed = self.reclaim(max_records).await?;
        if !reclaimed.is_empty() {
            return Ok(reclaimed);
        }

        self.read_new(max_records, wait).await
    }

    async fn ack(&self, records: &[QueueRecord]) -> Result<(), BrokerError> {
        let ids: Vec<String> = records
            .iter()
            .filter_map(|r| r.message_id.clone())
            .collect();

        let acked = self.pool.xack(&self.stream, &self.group, &ids).await?;
        tracing::debug!(stream = %self.stream, acked = acked, "Acknowledged records");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
