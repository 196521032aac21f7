use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

/// Publisher settings. `topic` is the only value the pipeline itself needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// "memory" (default) or "redis"
    #[serde(default = "default_broker_backend")]
    pub backend: String,
    /// Run the background queue consumer
    #[serde(default = "default_true")]
    pub consumer_enabled: bool,
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,
    /// Maximum records per delivered batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// How long a receive call waits for the first record
    #[serde(default = "default_wait_time_ms")]
    pub wait_time_ms: u64,
    /// Unacknowledged records become visible again after this long
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_seconds: u64,
    /// Approximate cap on the Redis stream length
    #[serde(default = "default_max_stream_length")]
    pub max_stream_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_cb_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_cb_success_threshold")]
    pub circuit_breaker_success_threshold: u32,
    #[serde(default = "default_cb_reset_timeout")]
    pub circuit_breaker_reset_timeout_seconds: u64,
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial_delay_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_delay_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub sms: ProviderConfig,
    #[serde(default)]
    pub email: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// "log" (default) or "http"
    #[serde(default = "default_provider_backend")]
    pub backend: String,
    /// REST endpoint for the http backend
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bearer token sent to the provider
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    256 * 1024
}

fn default_true() -> bool {
    true
}

fn default_broker_backend() -> String {
    "memory".to_string()
}

fn default_consumer_group() -> String {
    "notification-dispatchers".to_string()
}

fn default_consumer_name() -> String {
    format!("dispatcher-{}", std::process::id())
}

fn default_batch_size() -> usize {
    10
}

fn default_wait_time_ms() -> u64 {
    1000
}

fn default_visibility_timeout() -> u64 {
    30
}

fn default_max_stream_length() -> usize {
    100_000
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_cb_failure_threshold() -> u32 {
    5
}

fn default_cb_success_threshold() -> u32 {
    2
}

fn default_cb_reset_timeout() -> u64 {
    30
}

fn default_backoff_initial() -> u64 {
    100
}

fn default_backoff_max() -> u64 {
    30_000
}

fn default_provider_backend() -> String {
    "log".to_string()
}

fn default_provider_timeout() -> u64 {
    10_000
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "notification-dispatch-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let topic = env::var("NOTIFICATION_TOPIC")
            .or_else(|_| env::var("NOTIFICATION_SNS_TOPIC_ARN"))
            .ok();

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("broker.backend", default_broker_backend())?
            .set_default("redis.url", default_redis_url())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // APP__BROKER__BATCH_SIZE=20, APP__PROVIDERS__SMS__BACKEND=http, ...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            // Well-known deployment variables
            .set_override_option("notification.topic", topic)?
            .set_override_option("server.host", env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", env::var("SERVER_PORT").ok())?
            .set_override_option("redis.url", env::var("REDIS_URL").ok())?;

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification.topic.trim().is_empty() {
            return Err(ConfigError::Message(
                "notification.topic is required (set NOTIFICATION_TOPIC)".to_string(),
            ));
        }
        if self.broker.batch_size == 0 {
            return Err(ConfigError::Message(
                "broker.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Settings for tests and local tooling, with every section defaulted.
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::default(),
            notification: NotificationConfig {
                topic: topic.into(),
            },
            broker: BrokerConfig::default(),
            redis: RedisConfig::default(),
            providers: ProvidersConfig::default(),
            otel: OtelConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: default_broker_backend(),
            consumer_enabled: true,
            consumer_group: default_consumer_group(),
            consumer_name: default_consumer_name(),
            batch_size: default_batch_size(),
            wait_time_ms: default_wait_time_ms(),
            visibility_timeout_seconds: default_visibility_timeout(),
            max_stream_length: default_max_stream_length(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            circuit_breaker_failure_threshold: default_cb_failure_threshold(),
            circuit_breaker_success_threshold: default_cb_success_threshold(),
            circuit_breaker_reset_timeout_seconds: default_cb_reset_timeout(),
            backoff_initial_delay_ms: default_backoff_initial(),
            backoff_max_delay_ms: default_backoff_max(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backend: default_provider_backend(),
            endpoint: None,
            api_key: None,
            timeout_ms: default_provider_timeout(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);

        let broker = BrokerConfig::default();
        assert_eq!(broker.backend, "memory");
        assert_eq!(broker.batch_size, 10);
        assert!(broker.consumer_enabled);

        let provider = ProviderConfig::default();
        assert_eq!(provider.backend, "log");
        assert!(provider.endpoint.is_none());
    }

    #[test]
    fn test_empty_topic_is_rejected() {
        let settings = Settings::with_topic("   ");
        assert!(settings.validate().is_err());

        let settings = Settings::with_topic("notifications");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_shipped_defaults_require_a_topic() {
        let settings: Settings = Config::builder()
            .add_source(File::with_name("config/default"))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(settings.notification.topic.is_empty());
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("NOTIFICATION_TOPIC"));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let mut settings = Settings::with_topic("notifications");
        settings.broker.batch_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_server_addr() {
        let mut settings = Settings::with_topic("notifications");
        settings.server.port = 9000;
        assert_eq!(settings.server_addr(), "0.0.0.0:9000");
    }

    #[test]
    fn test_deserialize_from_source() {
        let config = Config::builder()
            .set_default("notification.topic", "orders")
            .unwrap()
            .set_default("providers.sms.backend", "http")
            .unwrap()
            .set_default("providers.sms.endpoint", "https://sms.example.com/send")
            .unwrap()
            .build()
            .unwrap();

        let settings: Settings = config.try_deserialize().unwrap();
        assert_eq!(settings.notification.topic, "orders");
        assert_eq!(settings.providers.sms.backend, "http");
        assert_eq!(
            settings.providers.sms.endpoint.as_deref(),
            Some("https://sms.example.com/send")
        );
        assert_eq!(settings.providers.email.backend, "log");
    }
}
