//! Channel providers that perform the actual deliveries.
//!
//! - `LogSmsProvider` / `LogEmailProvider`: log each delivery and succeed (default)
//! - `HttpSmsProvider` / `HttpEmailProvider`: POST JSON to a provider REST endpoint
//!
//! Use `create_providers()` to build the configured pair.

mod http_backend;
mod log_backend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ProviderConfig, ProvidersConfig};

pub use http_backend::{HttpEmailProvider, HttpSmsProvider};
pub use log_backend::{LogEmailProvider, LogSmsProvider};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// One text message to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub destination: String,
    pub message: String,
    /// Sender ID attribute shown to the recipient
    pub sender_id: String,
}

/// One plain-text email to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub source: String,
    pub destination: String,
    pub subject: String,
    pub body_text: String,
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send(&self, message: &SmsMessage) -> Result<(), ProviderError>;

    fn backend_name(&self) -> &'static str;
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError>;

    fn backend_name(&self) -> &'static str;
}

/// The SMS and email providers shared by every dispatch.
#[derive(Clone)]
pub struct Providers {
    pub sms: Arc<dyn SmsProvider>,
    pub email: Arc<dyn EmailProvider>,
}

/// Build both providers from configuration.
///
/// Backends are `"log"` and `"http"`; `"http"` requires an endpoint.
pub fn create_providers(config: &ProvidersConfig) -> Result<Providers, ProviderError> {
    let sms: Arc<dyn SmsProvider> = match config.sms.backend.as_str() {
        "log" => Arc::new(LogSmsProvider::new()),
        "http" => Arc::new(HttpSmsProvider::new(&config.sms)?),
        other => return Err(unknown_backend("sms", other)),
    };
    let email: Arc<dyn EmailProvider> = match config.email.backend.as_str() {
        "log" => Arc::new(LogEmailProvider::new()),
        "http" => Arc::new(HttpEmailProvider::new(&config.email)?),
        other => return Err(unknown_backend("email", other)),
    };

    tracing::info!(
        sms = sms.backend_name(),
        email = email.backend_name(),
        "Delivery providers configured"
    );

    Ok(Providers { sms, email })
}

fn unknown_backend(channel: &str, backend: &str) -> ProviderError {
    ProviderError::NotConfigured(format!(
        "unknown {channel} provider backend '{backend}' (expected \"log\" or \"http\")"
    ))
}

fn required_endpoint(config: &ProviderConfig, channel: &str) -> Result<String, ProviderError> {
    config
        .endpoint
        .clone()
        .filter(|endpoint| !endpoint.is_empty())
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!("{channel} endpoint is required for the http backend"))
        })
}
