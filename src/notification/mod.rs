//! Notification pipeline: validation, publishing and dispatch.
//!
//! - `validate()` / `parse_request()`: checks on an untyped request body
//! - `NotificationPublisher`: validate-and-publish to the notification topic
//! - `NotificationDispatcher`: fan a queue batch out to the SMS and email providers

mod dispatcher;
mod publisher;
mod types;
mod validator;

pub use dispatcher::{
    DispatchReport, DispatcherStats, DispatcherStatsSnapshot, NotificationDispatcher,
    EMAIL_SUBJECT,
};
pub use publisher::NotificationPublisher;
pub use types::{
    Channel, NotificationRequest, QueueBatch, QueueRecord, QueuedNotification,
    QueuedRecord,
};
pub use validator::{parse_request, validate};
