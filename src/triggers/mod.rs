//! Entry points that feed the notification pipeline.
//!
//! - HTTP: publish a request, or push a queue batch for dispatch
//! - Queue: background consumer pulling batches from the broker

mod http;
mod queue;

pub use http::{
    process_notifications, publish_notification, NOTIFICATIONS_PROCESSED, NOTIFICATION_SENT,
};
pub use queue::{ConsumerStatsSnapshot, QueueConsumer};
