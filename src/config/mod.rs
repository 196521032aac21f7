mod settings;

pub use settings::{
    BrokerConfig, NotificationConfig, OtelConfig, ProviderConfig, ProvidersConfig, RedisConfig,
    ServerConfig, Settings,
};
