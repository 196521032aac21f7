use std::fmt;

use serde::{Deserialize, Serialize};

/// Delivery channel for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Text message via the SMS provider
    Sms,
    /// Plain-text email via the email provider
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Email => "email",
        }
    }

    /// Parse the wire value; anything other than "sms" / "email" is unrecognised.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sms" => Some(Channel::Sms),
            "email" => Some(Channel::Email),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated notification request.
///
/// Serializes to the canonical topic payload: exactly
/// `{"type", "recipients", "message", "sender"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Channel, carried on the wire as `type`
    #[serde(rename = "type")]
    pub channel: Channel,
    /// Phone numbers or email addresses, in request order
    pub recipients: Vec<String>,
    /// Message body
    pub message: String,
    /// SMS sender ID or source email address, depending on channel
    pub sender: String,
}

impl NotificationRequest {
    pub fn new(
        channel: Channel,
        recipients: Vec<String>,
        message: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            recipients,
            message: message.into(),
            sender: sender.into(),
        }
    }

    /// Serialize to the canonical topic payload.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Payload of a queue record addressed to a known channel.
#[derive(Debug, Clone, Deserialize)]
pub struct QueuedNotification {
    #[serde(rename = "type")]
    pub channel: Channel,
    pub recipients: Vec<String>,
    pub message: String,
    pub sender: String,
}

/// A decoded queue record body.
#[derive(Debug, Clone)]
pub enum QueuedRecord {
    Deliver(QueuedNotification),
    /// `type` was absent or not "sms" / "email"; holds the raw value
    Unrouted(serde_json::Value),
}

impl QueuedRecord {
    /// Decode a record body. Only `type` is read from records that no
    /// channel handles, so they decode whatever else they carry.
    pub fn from_body(body: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(body)?;

        let routed = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .and_then(Channel::parse)
            .is_some();
        if !routed {
            let channel = value.get("type").cloned().unwrap_or_default();
            return Ok(QueuedRecord::Unrouted(channel));
        }

        serde_json::from_value(value).map(QueuedRecord::Deliver)
    }
}

/// One message delivered by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecord {
    /// Broker-assigned id, used for acknowledgement
    #[serde(
        rename = "messageId",
        alias = "message_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,
    /// Raw serialized notification request
    pub body: String,
}

impl QueueRecord {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            body: body.into(),
        }
    }

    pub fn from_body(body: impl Into<String>) -> Self {
        Self {
            message_id: None,
            body: body.into(),
        }
    }
}

/// Ordered batch of queue records handed to the dispatcher in one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueBatch {
    #[serde(rename = "Records", alias = "records")]
    pub records: Vec<QueueRecord>,
}

impl QueueBatch {
    pub fn new(records: Vec<QueueRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<QueueRecord>> for QueueBatch {
    fn from(records: Vec<QueueRecord>) -> Self {
        Self::new(records)
    }
}
