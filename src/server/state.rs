use std::sync::Arc;
use std::time::Instant;

use crate::broker::{create_broker, Broker};
use crate::config::Settings;
use crate::notification::{NotificationDispatcher, NotificationPublisher};
use crate::providers::{create_providers, Providers};
use crate::redis::{backoff_config, create_redis_pool, RedisPool};
use crate::triggers::QueueConsumer;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub publisher: Arc<NotificationPublisher>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub broker: Broker,
    /// Present only for the Redis broker backend
    pub redis_pool: Option<Arc<RedisPool>>,
    /// Present when `broker.consumer_enabled` is set
    pub consumer: Option<Arc<QueueConsumer>>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the pipeline around an already built broker and providers.
    pub fn new(
        settings: Settings,
        broker: Broker,
        providers: Providers,
        redis_pool: Option<Arc<RedisPool>>,
    ) -> Self {
        let publisher = Arc::new(NotificationPublisher::new(
            broker.publisher.clone(),
            settings.notification.topic.clone(),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::from_providers(&providers));

        let consumer = settings.broker.consumer_enabled.then(|| {
            Arc::new(QueueConsumer::new(
                broker.queue.clone(),
                dispatcher.clone(),
                &settings.broker,
                backoff_config(&settings.redis),
            ))
        });

        Self {
            settings: Arc::new(settings),
            publisher,
            dispatcher,
            broker,
            redis_pool,
            consumer,
            start_time: Instant::now(),
        }
    }

    /// Build every long-lived client from configuration.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let redis_pool = if settings.broker.backend == "redis" {
            Some(create_redis_pool(&settings.redis)?)
        } else {
            None
        };

        let broker = create_broker(
            &settings.broker,
            &settings.notification.topic,
            redis_pool.clone(),
        );
        let providers = create_providers(&settings.providers)?;

        Ok(Self::new(settings, broker, providers, redis_pool))
    }
}
