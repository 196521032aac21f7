use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::broker::BrokerError;
use crate::providers::ProviderError;

/// Client-facing message for a rejected publish request.
pub const INVALID_INPUT_MESSAGE: &str = "Invalid input";
/// Client-facing message for every internal failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Delivery to {recipient} failed: {source}")]
    Delivery {
        recipient: String,
        #[source]
        source: ProviderError,
    },
}

impl NotificationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            NotificationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The only text a caller ever sees; details stay in the logs.
    pub fn client_message(&self) -> &'static str {
        match self {
            NotificationError::InvalidInput(_) => INVALID_INPUT_MESSAGE,
            _ => INTERNAL_ERROR_MESSAGE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            NotificationError::InvalidInput(_) => "INVALID_INPUT",
            NotificationError::Deserialization(_) => "DESERIALIZATION_ERROR",
            NotificationError::Broker(_) => "BROKER_ERROR",
            NotificationError::Delivery { .. } => "DELIVERY_ERROR",
        }
    }
}

/// Body shape shared by every pipeline response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Always log the detailed error server-side
        if status.is_server_error() {
            tracing::error!(
                code = %self.code(),
                status = %status.as_u16(),
                error = %self,
                "Request failed"
            );
        } else {
            tracing::warn!(
                code = %self.code(),
                status = %status.as_u16(),
                error = %self,
                "Request rejected"
            );
        }

        let body = MessageResponse {
            message: self.client_message(),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, NotificationError>;
