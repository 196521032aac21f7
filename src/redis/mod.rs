//! Redis infrastructure for the stream broker
//!
//! - `RedisPool`: shared multiplexed connection plus dedicated connections for blocking reads
//! - `CircuitBreaker`: stops hammering Redis while it is down
//! - `ExponentialBackoff`: delays between consumer reconnect attempts
//! - `RedisHealth`: connection status for health checks and metrics

mod backoff;
mod circuit_breaker;
mod health;
pub mod pool;

use std::sync::Arc;
use std::time::Duration;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use health::{RedisHealth, RedisHealthStatus};
pub use pool::{PoolError, RedisPool, RedisStreamExt};

use crate::config::RedisConfig;

/// Build a pool with a circuit breaker configured from settings.
pub fn create_redis_pool(config: &RedisConfig) -> Result<Arc<RedisPool>, PoolError> {
    let breaker = CircuitBreaker::with_config(CircuitBreakerConfig {
        failure_threshold: config.circuit_breaker_failure_threshold,
        success_threshold: config.circuit_breaker_success_threshold,
        reset_timeout: Duration::from_secs(config.circuit_breaker_reset_timeout_seconds),
    });

    let pool = RedisPool::new(config, Arc::new(breaker), Arc::new(RedisHealth::new()))?;
    Ok(Arc::new(pool))
}

/// Backoff settings for the consumer loop, taken from the Redis section.
pub fn backoff_config(config: &RedisConfig) -> BackoffConfig {
    BackoffConfig {
        initial_delay: Duration::from_millis(config.backoff_initial_delay_ms),
        max_delay: Duration::from_millis(config.backoff_max_delay_ms),
        ..Default::default()
    }
}
