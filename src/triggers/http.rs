use axum::{extract::State, Json};

use crate::error::{MessageResponse, NotificationError, Result};
use crate::metrics::{BatchMetrics, RequestMetrics};
use crate::notification::QueueBatch;
use crate::server::AppState;

/// Response message for an accepted publish request
pub const NOTIFICATION_SENT: &str = "Notification sent";
/// Response message for a fully dispatched batch
pub const NOTIFICATIONS_PROCESSED: &str = "Notifications processed";

fn outcome<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(NotificationError::InvalidInput(_)) => "invalid",
        Err(_) => "error",
    }
}

/// POST /api/v1/notifications - validate a request and publish it to the topic
///
/// The body is taken as raw text so that malformed JSON reaches the publisher
/// and is reported like any other internal failure.
pub async fn publish_notification(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<MessageResponse>> {
    let result = state.publisher.publish(&body).await;
    RequestMetrics::record("publish", outcome(&result));
    result?;

    Ok(Json(MessageResponse {
        message: NOTIFICATION_SENT,
    }))
}

/// POST /api/v1/notifications/process - dispatch a pushed queue batch
pub async fn process_notifications(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<MessageResponse>> {
    let result = match serde_json::from_str::<QueueBatch>(&body) {
        Ok(batch) => {
            let dispatched = state.dispatcher.dispatch(&batch).await;
            BatchMetrics::record_batch("http", batch.len(), dispatched.is_ok());
            dispatched
        }
        Err(e) => Err(NotificationError::from(e)),
    };
    RequestMetrics::record("process", outcome(&result));
    result?;

    Ok(Json(MessageResponse {
        message: NOTIFICATIONS_PROCESSED,
    }))
}
