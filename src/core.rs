//! Core sqlcache functionality
//!
//! This module contains the SqlCache struct: it opens the store and the
//! optional Redis cache named by an [`AppConfig`] and hands out the engine
//! that runs operation chains against them.

use std::sync::Arc;

use cache_system::{CacheManager, CacheParams};
use config::AppConfig;
use store_object::{Engine, SqlxStore, Store};
use tracing::info;

use crate::debug_log;
use crate::errors::SqlCacheError;

/// Store and cache handles for one application
#[derive(Debug, Clone)]
pub struct SqlCache {
    engine: Engine,
}

impl SqlCache {
    /// Connect the database and, when configured, the cache
    pub async fn connect(config: AppConfig) -> Result<Self, SqlCacheError> {
        config.validate()?;

        let store = SqlxStore::connect(&config.database).await?;
        let mut engine = Engine::new(Arc::new(store), config.engine.clone());

        if let Some(cache_config) = &config.cache {
            let manager = CacheManager::new(cache_config.clone())?;
            let params = CacheParams::new(
                Arc::new(manager),
                cache_config.default_ttl_seconds,
                &cache_config.namespace,
            );
            engine = engine.with_cache(params);
        }

        info!(
            dialect = %engine.dialect(),
            cache = engine.cache().is_some(),
            "sqlcache ready"
        );
        Ok(Self { engine })
    }

    /// Load configuration from the environment and connect
    pub async fn from_env() -> Result<Self, SqlCacheError> {
        Self::connect(AppConfig::load()?).await
    }

    /// Wrap an engine built over a custom store, e.g. a SQL Server client
    pub fn from_engine(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        self.engine.store()
    }

    /// Check store and cache connectivity
    pub async fn health_check(&self) -> Result<(), SqlCacheError> {
        self.engine.query_map("SELECT 1", &[]).await?;
        if let Some(cache) = self.engine.cache() {
            cache.params().backend.ping().await?;
        }
        debug_log!("health check passed");
        Ok(())
    }
}
