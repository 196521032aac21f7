use async_trait::async_trait;

use super::{EmailMessage, EmailProvider, ProviderError, SmsMessage, SmsProvider};

/// Logs each SMS instead of sending it.
#[derive(Debug, Default)]
pub struct LogSmsProvider;

impl LogSmsProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SmsProvider for LogSmsProvider {
    async fn send(&self, message: &SmsMessage) -> Result<(), ProviderError> {
        tracing::info!(
            destination = %message.destination,
            sender_id = %message.sender_id,
            length = message.message.len(),
            "SMS delivered (log provider)"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "log"
    }
}

/// Logs each email instead of sending it.
#[derive(Debug, Default)]
pub struct LogEmailProvider;

impl LogEmailProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailProvider for LogEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        tracing::info!(
            source = %message.source,
            destination = %message.destination,
            subject = %message.subject,
            length = message.body_text.len(),
            "Email delivered (log provider)"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "log"
    }
}
