use std::sync::Arc;

use tracing::info;

use super::{
    config::{Config, StoreKind},
    database::{RedisStore, init_redis},
    limiter::RateLimiter,
    store::{MemoryStore, Store, StoreError},
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>, StoreError> {
        let store: Arc<dyn Store> = match config.store {
            StoreKind::Redis => {
                let connection = init_redis(&config.redis_url).await?;

                Arc::new(RedisStore::new(connection, config.key_prefix.clone()))
            }
            StoreKind::Memory => {
                info!("Using in-memory store, data is lost on shutdown");

                MemoryStore::new()
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit,
            config.rate_limit_window,
        ));

        Arc::new(Self {
            config,
            store,
            limiter,
        })
    }
}
