//! Shared fakes for integration tests: recording providers and an
//! in-memory broker wired into a full `AppState`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use notification_dispatch_service::broker::{Broker, MemoryBroker};
use notification_dispatch_service::config::Settings;
use notification_dispatch_service::providers::{
    EmailMessage, EmailProvider, ProviderError, Providers, SmsMessage, SmsProvider,
};
use notification_dispatch_service::server::AppState;

pub const TOPIC: &str = "notifications";

/// Records every SMS and fails destinations listed in `failures`.
#[derive(Default)]
pub struct RecordingSms {
    pub sent: Mutex<Vec<SmsMessage>>,
    /// Remaining failures per destination
    pub failures: Mutex<HashMap<String, usize>>,
}

#[async_trait]
impl SmsProvider for RecordingSms {
    async fn send(&self, message: &SmsMessage) -> Result<(), ProviderError> {
        if take_failure(&self.failures, &message.destination) {
            return Err(rejected());
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Records every email and fails destinations listed in `failures`.
#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub failures: Mutex<HashMap<String, usize>>,
}

#[async_trait]
impl EmailProvider for RecordingEmail {
    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        if take_failure(&self.failures, &message.destination) {
            return Err(rejected());
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

impl RecordingSms {
    pub fn destinations(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.destination.clone()).collect()
    }
}

impl RecordingEmail {
    /// Fail the next `times` deliveries to `destination`
    pub fn fail(&self, destination: &str, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(destination.to_string(), times);
    }

    pub fn destinations(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.destination.clone()).collect()
    }
}

fn take_failure(failures: &Mutex<HashMap<String, usize>>, destination: &str) -> bool {
    let mut failures = failures.lock().unwrap();
    match failures.get_mut(destination) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

fn rejected() -> ProviderError {
    ProviderError::Rejected {
        status: 500,
        body: "provider unavailable".to_string(),
    }
}

pub struct TestApp {
    pub state: AppState,
    pub broker: Arc<MemoryBroker>,
    pub sms: Arc<RecordingSms>,
    pub email: Arc<RecordingEmail>,
}

/// Full application state over a memory broker and recording providers.
pub fn test_app(visibility_timeout: Duration) -> TestApp {
    test_app_with(Settings::with_topic(TOPIC), visibility_timeout)
}

pub fn test_app_with(settings: Settings, visibility_timeout: Duration) -> TestApp {
    let broker = Arc::new(MemoryBroker::new(
        settings.notification.topic.clone(),
        visibility_timeout,
    ));
    let sms = Arc::new(RecordingSms::default());
    let email = Arc::new(RecordingEmail::default());

    let state = AppState::new(
        settings,
        Broker {
            publisher: broker.clone(),
            queue: broker.clone(),
        },
        Providers {
            sms: sms.clone(),
            email: email.clone(),
        },
        None,
    );

    TestApp {
        state,
        broker,
        sms,
        email,
    }
}

pub fn request_body(channel: &str, recipients: &[&str]) -> String {
    serde_json::json!({
        "type": channel,
        "recipients": recipients,
        "message": "hi",
        "sender": "ACME",
    })
    .to_string()
}

/// Poll `condition` every 10ms until it holds or `timeout` passes.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
