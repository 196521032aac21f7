//! Structural and semantic checks for inbound notification requests.
//!
//! Works on an untyped `serde_json::Value` so that absent fields, `null`
//! bodies and wrong types all fall out as a plain `false` instead of a
//! deserialization fault.

use serde_json::Value;

use crate::error::NotificationError;

use super::{Channel, NotificationRequest};

/// Returns true iff the request has a recognised `type`, a non-empty
/// `recipients` list of strings, and non-empty `message` and `sender`.
pub fn validate(request: &Value) -> bool {
    let Some(fields) = request.as_object() else {
        return false;
    };

    let channel_ok = fields
        .get("type")
        .and_then(Value::as_str)
        .and_then(Channel::parse)
        .is_some();

    let recipients_ok = fields
        .get("recipients")
        .and_then(Value::as_array)
        .is_some_and(|list| !list.is_empty() && list.iter().all(Value::is_string));

    channel_ok
        && recipients_ok
        && is_present(fields.get("message"))
        && is_present(fields.get("sender"))
}

fn is_present(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

/// Validate and convert into the typed request.
pub fn parse_request(request: Value) -> Result<NotificationRequest, NotificationError> {
    if !validate(&request) {
        return Err(NotificationError::InvalidInput(
            "request failed validation".to_string(),
        ));
    }

    serde_json::from_value(request).map_err(|e| NotificationError::InvalidInput(e.to_string()))
}
