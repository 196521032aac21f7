//! REST providers.
//!
//! Both channels POST a JSON document to the configured endpoint, with the
//! API key as a bearer token. Any non-2xx status is a failed delivery, as is a
//! request that exceeds `timeout_ms`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use crate::config::ProviderConfig;

use super::{
    required_endpoint, EmailMessage, EmailProvider, ProviderError, SmsMessage, SmsProvider,
};

struct RestClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RestClient {
    fn new(config: &ProviderConfig, channel: &str) -> Result<Self, ProviderError> {
        let endpoint = required_endpoint(config, channel)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), ProviderError> {
        let mut request = self.client.post(&self.endpoint).json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.inspect_err(|e| {
            tracing::error!(endpoint = %self.endpoint, error = %e, "Provider request failed");
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(
            endpoint = %self.endpoint,
            status = %status,
            body = %body,
            "Provider rejected delivery"
        );
        Err(ProviderError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

pub struct HttpSmsProvider {
    client: RestClient,
}

impl HttpSmsProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: RestClient::new(config, "sms")?,
        })
    }
}

#[async_trait]
impl SmsProvider for HttpSmsProvider {
    #[instrument(skip(self, message), fields(destination = %message.destination))]
    async fn send(&self, message: &SmsMessage) -> Result<(), ProviderError> {
        let payload = json!({
            "phone_number": message.destination,
            "message": message.message,
            "attributes": {
                "sender_id": message.sender_id,
            },
        });
        self.client.post(&payload).await
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

pub struct HttpEmailProvider {
    client: RestClient,
}

impl HttpEmailProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: RestClient::new(config, "email")?,
        })
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    #[instrument(skip(self, message), fields(destination = %message.destination))]
    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        let payload = json!({
            "source": message.source,
            "destination": {
                "to_addresses": [message.destination],
            },
            "subject": message.subject,
            "body": {
                "text": message.body_text,
            },
        });
        self.client.post(&payload).await
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_config(server: &MockServer, route: &str) -> ProviderConfig {
        ProviderConfig {
            backend: "http".to_string(),
            endpoint: Some(format!("{}{}", server.uri(), route)),
            api_key: Some("secret".to_string()),
            timeout_ms: 10_000,
        }
    }

    fn sms() -> SmsMessage {
        SmsMessage {
            destination: "+15551234567".to_string(),
            message: "hi".to_string(),
            sender_id: "ACME".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sms_posts_payload_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sms"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({
                "phone_number": "+15551234567",
                "message": "hi",
                "attributes": { "sender_id": "ACME" },
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpSmsProvider::new(&provider_config(&server, "/sms")).unwrap();
        provider.send(&sms()).await.unwrap();
    }

    #[tokio::test]
    async fn test_email_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email"))
            .and(body_json(json!({
                "source": "noreply@acme.com",
                "destination": { "to_addresses": ["a@x.com"] },
                "subject": "Email notification from Notification Microservice",
                "body": { "text": "hello" },
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpEmailProvider::new(&provider_config(&server, "/email")).unwrap();
        let message = EmailMessage {
            source: "noreply@acme.com".to_string(),
            destination: "a@x.com".to_string(),
            subject: "Email notification from Notification Microservice".to_string(),
            body_text: "hello".to_string(),
        };
        provider.send(&message).await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sms"))
            .respond_with(ResponseTemplate::new(503).set_body_string("throttled"))
            .mount(&server)
            .await;

        let provider = HttpSmsProvider::new(&provider_config(&server, "/sms")).unwrap();
        let err = provider.send(&sms()).await.unwrap_err();
        match err {
            ProviderError::Rejected { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "throttled");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sms"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let mut config = provider_config(&server, "/sms");
        config.timeout_ms = 200;
        let provider = HttpSmsProvider::new(&config).unwrap();

        let err = provider.send(&sms()).await.unwrap_err();
        match err {
            ProviderError::Http(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
