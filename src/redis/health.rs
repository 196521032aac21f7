//! Redis connection health tracking

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RedisHealthStatus {
    Healthy = 0,
    Reconnecting = 1,
    CircuitOpen = 2,
}

impl RedisHealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedisHealthStatus::Healthy => "healthy",
            RedisHealthStatus::Reconnecting => "reconnecting",
            RedisHealthStatus::CircuitOpen => "circuit_open",
        }
    }
}

/// Health of the broker's Redis connection as seen by the pool
pub struct RedisHealth {
    status: AtomicU8,
    last_connected_ms: AtomicI64,
    reconnections: AtomicU32,
}

impl RedisHealth {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(RedisHealthStatus::Reconnecting as u8),
            last_connected_ms: AtomicI64::new(0),
            reconnections: AtomicU32::new(0),
        }
    }

    pub fn set_connected(&self) {
        let previous = self
            .status
            .swap(RedisHealthStatus::Healthy as u8, Ordering::AcqRel);
        self.last_connected_ms
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Release);
        if previous != RedisHealthStatus::Healthy as u8 {
            self.reconnections.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn set_reconnecting(&self) {
        self.status
            .store(RedisHealthStatus::Reconnecting as u8, Ordering::Release);
    }

    pub fn set_circuit_open(&self) {
        self.status
            .store(RedisHealthStatus::CircuitOpen as u8, Ordering::Release);
    }

    pub fn status(&self) -> RedisHealthStatus {
        match self.status.load(Ordering::Acquire) {
            0 => RedisHealthStatus::Healthy,
            2 => RedisHealthStatus::CircuitOpen,
            _ => RedisHealthStatus::Reconnecting,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == RedisHealthStatus::Healthy
    }

    /// Milliseconds since epoch of the last successful connect, 0 if never
    pub fn last_connected_ms(&self) -> i64 {
        self.last_connected_ms.load(Ordering::Acquire)
    }

    /// Number of transitions into the healthy state
    pub fn connections(&self) -> u32 {
        self.reconnections.load(Ordering::Acquire)
    }
}

impl Default for RedisHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let health = RedisHealth::new();
        assert_eq!(health.status(), RedisHealthStatus::Reconnecting);
        assert!(!health.is_healthy());

        health.set_connected();
        assert!(health.is_healthy());
        assert!(health.last_connected_ms() > 0);

        health.set_circuit_open();
        assert_eq!(health.status().as_str(), "circuit_open");
    }

    #[test]
    fn test_counts_connections_once_per_recovery() {
        let health = RedisHealth::new();
        health.set_connected();
        health.set_connected();
        health.set_reconnecting();
        health.set_connected();
        assert_eq!(health.connections(), 2);
    }
}
