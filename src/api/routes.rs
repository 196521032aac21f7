use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;
use crate::triggers::{process_notifications, publish_notification};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Notification pipeline
        .nest(
            "/api/v1",
            Router::new()
                .route("/notifications", post(publish_notification))
                .route("/notifications/process", post(process_notifications)),
        )
}
