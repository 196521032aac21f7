//! Redis connection pool for the stream broker.
//!
//! Commands share one multiplexed connection. Blocking reads (`XREADGROUP ...
//! BLOCK`) must use [`RedisPool::dedicated_connection`] so they do not stall
//! publishes queued on the shared connection.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, RedisResult, Value};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

use super::{CircuitBreaker, CircuitState, RedisHealth};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Circuit breaker is open")]
    CircuitOpen,
}

/// A stream entry as returned by `XAUTOCLAIM`: id plus field map
pub type StreamEntry = (String, HashMap<String, String>);

pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    circuit_breaker: Arc<CircuitBreaker>,
    health: Arc<RedisHealth>,
    url: String,
}

impl RedisPool {
    pub fn new(
        config: &RedisConfig,
        circuit_breaker: Arc<CircuitBreaker>,
        health: Arc<RedisHealth>,
    ) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            circuit_breaker,
            health,
            url: config.url.clone(),
        })
    }

    /// Shared connection, established lazily.
    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        if !self.circuit_breaker.allow_request() {
            self.health.set_circuit_open();
            return Err(PoolError::CircuitOpen);
        }

        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let mut guard = self.connection.write().await;
        // Another task may have connected while we waited for the lock
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.open_connection().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// A connection of its own, for commands that block server-side.
    pub async fn dedicated_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        if !self.circuit_breaker.allow_request() {
            self.health.set_circuit_open();
            return Err(PoolError::CircuitOpen);
        }
        self.open_connection().await
    }

    async fn open_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        self.health.set_reconnecting();
        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                self.circuit_breaker.record_success();
                self.health.set_connected();
                tracing::info!(url = %self.url, "Redis connection established");
                Ok(conn)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Run a command on the shared connection, recording the outcome with the
    /// circuit breaker and dropping the connection on I/O failures.
    pub async fn execute<F, Fut, T>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;
        match f(conn).await {
            Ok(value) => {
                self.circuit_breaker.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_error(&e).await;
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Book-keeping for a failed command run on any connection from this pool.
    pub async fn record_error(&self, error: &RedisError) {
        if error.is_connection_dropped() || error.is_io_error() {
            *self.connection.write().await = None;
            self.health.set_reconnecting();
        }
        self.circuit_breaker.record_failure();
    }

    pub fn record_success(&self) {
        self.circuit_breaker.record_success();
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy() && self.circuit_breaker.state() == CircuitState::Closed
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    pub fn health(&self) -> &RedisHealth {
        &self.health
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Typed helpers for the stream commands the broker relies on.
#[async_trait::async_trait]
pub trait RedisStreamExt {
    /// `XADD key MAXLEN ~ maxlen * field value ...`, returning the entry id.
    async fn xadd_maxlen(
        &self,
        key: &str,
        maxlen: usize,
        fields: &[(&str, &str)],
    ) -> Result<String, PoolError>;

    /// `XGROUP CREATE key group 0 MKSTREAM`; an existing group is not an error.
    async fn ensure_group(&self, key: &str, group: &str) -> Result<(), PoolError>;

    /// `XAUTOCLAIM` entries idle for at least `min_idle_ms`, up to `count`.
    async fn xautoclaim(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<StreamEntry>, PoolError>;

    /// `XACK key group id ...`, returning the number acknowledged.
    async fn xack(&self, key: &str, group: &str, ids: &[String]) -> Result<u64, PoolError>;
}

#[async_trait::async_trait]
impl RedisStreamExt for RedisPool {
    async fn xadd_maxlen(
        &self,
        key: &str,
        maxlen: usize,
        fields: &[(&str, &str)],
    ) -> Result<String, PoolError> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(key).arg("MAXLEN").arg("~").arg(maxlen).arg("*");
        for (field, value) in fields {
            cmd.arg(*field).arg(*value);
        }

        self.execute(|mut conn| async move {
            let id: String = cmd.query_async(&mut conn).await?;
            Ok(id)
        })
        .await
    }

    async fn ensure_group(&self, key: &str, group: &str) -> Result<(), PoolError> {
        let result = self
            .execute(|mut conn| async move {
                let _: () = redis::cmd("XGROUP")
                    .arg("CREATE")
                    .arg(key)
                    .arg(group)
                    .arg("0")
                    .arg("MKSTREAM")
                    .query_async(&mut conn)
                    .await?;
                Ok(())
            })
            .await;

        match result {
            Err(PoolError::Redis(e)) if e.code() == Some("BUSYGROUP") => {
                // Group errors are not availability problems
                self.circuit_breaker.record_success();
                Ok(())
            }
            other => other,
        }
    }

    async fn xautoclaim(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<StreamEntry>, PoolError> {
        let reply = self
            .execute(|mut conn| async move {
                let reply: Value = redis::cmd("XAUTOCLAIM")
                    .arg(key)
                    .arg(group)
                    .arg(consumer)
                    .arg(min_idle_ms)
                    .arg("0-0")
                    .arg("COUNT")
                    .arg(count)
                    .query_async(&mut conn)
                    .await?;
                Ok(reply)
            })
            .await?;

        Ok(parse_autoclaim_entries(reply))
    }

    async fn xack(&self, key: &str, group: &str, ids: &[String]) -> Result<u64, PoolError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut cmd = redis::cmd("XACK");
        cmd.arg(key).arg(group);
        for id in ids {
            cmd.arg(id.as_str());
        }

        self.execute(|mut conn| async move {
            let acked: u64 = cmd.query_async(&mut conn).await?;
            Ok(acked)
        })
        .await
    }
}

/// `XAUTOCLAIM` replies `[next-id, [[id, [field, value, ...]], ...], (deleted-ids)]`.
/// Entries deleted from the stream show up as nil on older servers and are skipped.
fn parse_autoclaim_entries(reply: Value) -> Vec<StreamEntry> {
    let Value::Array(parts) = reply else {
        return Vec::new();
    };
    let Some(Value::Array(entries)) = parts.into_iter().nth(1) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| redis::from_redis_value::<StreamEntry>(entry).ok())
        .collect()
}
