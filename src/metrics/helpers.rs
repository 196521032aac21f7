//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::redis::RedisPool;

use super::{
    BATCHES_TOTAL, BATCH_SIZE, DELIVERIES_TOTAL, DELIVERY_LATENCY, PUBLISHES_TOTAL,
    PUBLISH_LATENCY, QUEUE_ACKED_TOTAL, QUEUE_RECEIVE_ERRORS_TOTAL, RECORDS_SKIPPED_TOTAL,
    REDIS_CIRCUIT_BREAKER_STATE, REDIS_CONNECTION_STATUS, REQUESTS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

fn result_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Helper struct for recording entry point outcomes
pub struct RequestMetrics;

impl RequestMetrics {
    /// Record the outcome ("ok", "invalid", "error") of a request on `endpoint`
    pub fn record(endpoint: &str, outcome: &str) {
        REQUESTS_TOTAL.with_label_values(&[endpoint, outcome]).inc();
    }
}

/// Helper struct for recording publish metrics
pub struct PublishMetrics;

impl PublishMetrics {
    /// Record one broker publish call
    pub fn record_publish(ok: bool, latency_secs: f64) {
        PUBLISHES_TOTAL.with_label_values(&[result_label(ok)]).inc();
        PUBLISH_LATENCY.observe(latency_secs);
    }
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record one provider call for `channel`
    pub fn record(channel: &str, ok: bool, latency_secs: f64) {
        DELIVERIES_TOTAL
            .with_label_values(&[channel, result_label(ok)])
            .inc();
        DELIVERY_LATENCY
            .with_label_values(&[channel])
            .observe(latency_secs);
    }
}

/// Helper struct for recording batch metrics
pub struct BatchMetrics;

impl BatchMetrics {
    /// Record a dispatched batch from `source` ("http" or "queue")
    pub fn record_batch(source: &str, records: usize, ok: bool) {
        BATCHES_TOTAL
            .with_label_values(&[source, result_label(ok)])
            .inc();
        BATCH_SIZE.observe(records as f64);
    }

    pub fn record_skipped() {
        RECORDS_SKIPPED_TOTAL.inc();
    }

    pub fn record_acked(count: usize) {
        QUEUE_ACKED_TOTAL.inc_by(count as u64);
    }

    pub fn record_receive_error() {
        QUEUE_RECEIVE_ERRORS_TOTAL.inc();
    }
}

/// Helper struct for Redis health gauges
pub struct RedisMetrics;

impl RedisMetrics {
    /// Refresh the Redis gauges from the pool's current state
    pub fn update(pool: &RedisPool) {
        REDIS_CONNECTION_STATUS.set(i64::from(pool.health().is_healthy()));
        REDIS_CIRCUIT_BREAKER_STATE.set(pool.circuit_state().as_gauge());
    }
}
