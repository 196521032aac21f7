//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::notification::DispatcherStatsSnapshot;
use crate::redis::RedisPool;
use crate::server::AppState;
use crate::triggers::ConsumerStatsSnapshot;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    pub broker: BrokerHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct BrokerHealthResponse {
    pub backend: String,
    pub topic: String,
    pub consumer_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct RedisHealthResponse {
    pub status: String,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub dispatcher: DispatcherStatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ConsumerStatsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisStats>,
}

#[derive(Debug, Serialize)]
pub struct RedisStats {
    pub status: String,
    pub connected: bool,
    pub circuit_breaker_state: String,
    pub connections_opened: u32,
    pub last_connected_ms: i64,
}

fn redis_health(pool: &RedisPool) -> RedisHealthResponse {
    RedisHealthResponse {
        status: pool.health().status().as_str().to_string(),
        connected: pool.health().is_healthy(),
    }
}

/// GET /health
///
/// `degraded` while the Redis broker is disconnected or its circuit is open.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis = state.redis_pool.as_deref().map(redis_health);
    let healthy = state
        .redis_pool
        .as_ref()
        .map_or(true, |pool| pool.is_healthy());

    let status = if healthy { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: Utc::now(),
        broker: BrokerHealthResponse {
            backend: state.broker.publisher.backend_name().to_string(),
            topic: state.publisher.topic().to_string(),
            consumer_enabled: state.consumer.is_some(),
        },
        redis,
    })
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let redis = state.redis_pool.as_ref().map(|pool| {
        let health = pool.health();
        RedisStats {
            status: health.status().as_str().to_string(),
            connected: health.is_healthy(),
            circuit_breaker_state: pool.circuit_state().as_str().to_string(),
            connections_opened: health.connections(),
            last_connected_ms: health.last_connected_ms(),
        }
    });

    Json(StatsResponse {
        dispatcher: state.dispatcher.stats(),
        consumer: state.consumer.as_ref().map(|c| c.stats()),
        redis,
    })
}
