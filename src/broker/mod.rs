//! Topic publishing and queue consumption.
//!
//! The publisher side (`TopicPublisher`) and the consumer side (`QueueSource`)
//! are separate traits so either can be faked independently in tests. Both
//! backends implement both:
//!
//! - `MemoryBroker`: in-process topic queues with visibility timeouts (default)
//! - `RedisStreamBroker`: topic = Redis stream, queue = consumer group
//!
//! Use `create_broker()` to build the configured backend.

mod memory_backend;
mod redis_backend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::BrokerConfig;
use crate::notification::QueueRecord;
use crate::redis::{PoolError, RedisPool};

pub use memory_backend::MemoryBroker;
pub use redis_backend::RedisStreamBroker;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Broker unavailable: {0}")]
    Unavailable(String),
}

impl From<PoolError> for BrokerError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Redis(e) => BrokerError::Redis(e),
            PoolError::CircuitOpen => {
                BrokerError::Unavailable("Circuit breaker is open".to_string())
            }
        }
    }
}

/// Publish side of the broker.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    /// Publish one serialized message to `topic`, returning the broker's message id.
    async fn publish(&self, topic: &str, message: &str) -> Result<String, BrokerError>;

    fn backend_name(&self) -> &'static str;
}

/// Consume side of the broker: a queue subscribed to the notification topic.
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Receive up to `max_records`, waiting at most `wait` for the first one.
    /// Returns an empty batch on timeout.
    ///
    /// Received records stay invisible until acknowledged or until the
    /// visibility timeout passes, after which they are delivered again.
    async fn receive(
        &self,
        max_records: usize,
        wait: Duration,
    ) -> Result<Vec<QueueRecord>, BrokerError>;

    /// Acknowledge records so they are never delivered again.
    async fn ack(&self, records: &[QueueRecord]) -> Result<(), BrokerError>;

    fn backend_name(&self) -> &'static str;
}

/// Both halves of one configured broker.
#[derive(Clone)]
pub struct Broker {
    pub publisher: Arc<dyn TopicPublisher>,
    pub queue: Arc<dyn QueueSource>,
}

/// Create the broker backend named by `config.backend`.
///
/// - `"redis"`: a `RedisStreamBroker` if a Redis pool is provided
/// - `"memory"` (default): a `MemoryBroker`
///
/// `topic` is the stream/topic the queue side consumes from.
pub fn create_broker(
    config: &BrokerConfig,
    topic: &str,
    redis_pool: Option<Arc<RedisPool>>,
) -> Broker {
    let visibility_timeout = Duration::from_secs(config.visibility_timeout_seconds);

    match config.backend.as_str() {
        "redis" => {
            if let Some(pool) = redis_pool {
                tracing::info!(
                    backend = "redis",
                    topic = %topic,
                    group = %config.consumer_group,
                    consumer = %config.consumer_name,
                    "Creating Redis stream broker"
                );
                let broker = Arc::new(RedisStreamBroker::new(
                    pool,
                    topic,
                    config.consumer_group.clone(),
                    config.consumer_name.clone(),
                    config.max_stream_length,
                    visibility_timeout,
                ));
                Broker {
                    publisher: broker.clone(),
                    queue: broker,
                }
            } else {
                tracing::warn!(
                    "Redis broker requested but no pool provided, falling back to memory"
                );
                memory_broker(topic, visibility_timeout)
            }
        }
        _ => {
            tracing::info!(backend = "memory", topic = %topic, "Creating memory broker");
            memory_broker(topic, visibility_timeout)
        }
    }
}

fn memory_broker(topic: &str, visibility_timeout: Duration) -> Broker {
    let broker = Arc::new(MemoryBroker::new(topic, visibility_timeout));
    Broker {
        publisher: broker.clone(),
        queue: broker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_defaults_to_memory() {
        let broker = create_broker(&BrokerConfig::default(), "notifications", None);
        assert_eq!(broker.publisher.backend_name(), "memory");
        assert_eq!(broker.queue.backend_name(), "memory");
    }

    #[test]
    fn test_factory_falls_back_without_pool() {
        let config = BrokerConfig {
            backend: "redis".to_string(),
            ..Default::default()
        };
        let broker = create_broker(&config, "notifications", None);
        assert_eq!(broker.publisher.backend_name(), "memory");
    }

    #[test]
    fn test_pool_error_conversion() {
        let err = BrokerError::from(PoolError::CircuitOpen);
        assert!(matches!(err, BrokerError::Unavailable(_)));
        assert_eq!(err.to_string(), "Broker unavailable: Circuit breaker is open");
    }
}
