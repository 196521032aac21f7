use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::instrument;

use crate::broker::TopicPublisher;
use crate::error::NotificationError;
use crate::metrics::PublishMetrics;

use super::{parse_request, NotificationRequest};

/// Validates inbound requests and publishes them to the notification topic.
pub struct NotificationPublisher {
    broker: Arc<dyn TopicPublisher>,
    topic: String,
}

impl NotificationPublisher {
    pub fn new(broker: Arc<dyn TopicPublisher>, topic: impl Into<String>) -> Self {
        Self {
            broker,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Parse, validate and publish a raw request body.
    ///
    /// Unparseable JSON is a `Deserialization` error; a body that parses but
    /// fails validation is `InvalidInput` and nothing is published.
    #[instrument(skip(self, raw), fields(topic = %self.topic))]
    pub async fn publish(&self, raw: &str) -> Result<String, NotificationError> {
        let event: Value = serde_json::from_str(raw)?;
        tracing::info!(event = %event, "Received notification request");

        let request = parse_request(event)?;
        self.publish_request(&request).await
    }

    /// Publish an already validated request as the canonical payload.
    pub async fn publish_request(
        &self,
        request: &NotificationRequest,
    ) -> Result<String, NotificationError> {
        let payload = request.to_payload()?;

        let started = Instant::now();
        let result = self.broker.publish(&self.topic, &payload).await;
        PublishMetrics::record_publish(result.is_ok(), started.elapsed().as_secs_f64());

        let message_id = result?;
        tracing::info!(
            message_id = %message_id,
            channel = %request.channel,
            recipients = request.recipients.len(),
            "Notification published"
        );
        Ok(message_id)
    }
}
