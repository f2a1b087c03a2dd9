//! Redis cache manager
//!
//! This module provides the CacheManager struct
//! for Redis operations and connection management.

use crate::backend::CacheBackend;
use crate::errors::CacheError;
use async_trait::async_trait;
use config::{CacheConfig, ConnectionDescriptor};
use redis::{AsyncCommands, Client};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Redis-based cache manager
#[derive(Clone)]
pub struct CacheManager {
    client: Arc<Client>,
    config: Arc<CacheConfig>,
    replicas: Arc<Vec<String>>,
    connection_pool: Arc<RwLock<Option<redis::aio::MultiplexedConnection>>>,
}

impl Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connection_status = {
            match self.connection_pool.try_read() {
                Ok(pool) => {
                    if pool.is_some() {
                        "connected"
                    } else {
                        "no_connection"
                    }
                }
                Err(_) => "lock_error",
            }
        };

        f.debug_struct("CacheManager")
            .field("namespace", &self.config.namespace)
            .field("replicas", &self.replicas)
            .field("connected", &connection_status)
            .finish()
    }
}

/// Translate a cache descriptor into the url form the redis client accepts.
///
/// The database index may be given as `?db=N` or as the path.
pub fn redis_url(descriptor: &ConnectionDescriptor) -> String {
    let db = descriptor
        .param("db")
        .map(str::to_string)
        .or_else(|| {
            let path = descriptor.path.trim_start_matches('/');
            (!path.is_empty()).then(|| path.to_string())
        })
        .unwrap_or_else(|| "0".to_string());

    let auth = match (descriptor.user.is_empty(), descriptor.password.is_empty()) {
        (true, true) => String::new(),
        (true, false) => format!(":{}@", descriptor.password),
        (false, true) => format!("{}@", descriptor.user),
        (false, false) => format!("{}:{}@", descriptor.user, descriptor.password),
    };

    format!(
        "redis://{}{}:{}/{}",
        auth,
        descriptor.host,
        descriptor.port.unwrap_or(6379),
        db
    )
}

impl CacheManager {
    /// Create a new cache manager; no connection is made until first use
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let descriptor = config.descriptor()?;
        let client = Client::open(redis_url(&descriptor).as_str())?;

        Ok(Self {
            client: Arc::new(client),
            replicas: Arc::new(descriptor.replicas()),
            config: Arc::new(config),
            connection_pool: Arc::new(RwLock::new(None)),
        })
    }

    /// Get or create Redis connection
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        let mut pool = self.connection_pool.write().await;

        if pool.is_none() {
            let connection = self.client.get_multiplexed_async_connection().await?;
            *pool = Some(connection);
        }

        Ok(pool
            .as_ref()
            .ok_or_else(|| CacheError::Connection("Failed to get connection from pool".into()))?
            .clone())
    }

    /// Replica endpoints from the `replicate` parameter.
    ///
    /// Commands are always sent to the primary endpoint.
    pub fn replicas(&self) -> &[String] {
        &self.replicas
    }

    /// Get current configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

#[async_trait]
impl CacheBackend for CacheManager {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.get_connection().await?;
        let cached: Option<String> = conn.get(key).await?;
        Ok(cached)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.set_ex(key, value, ttl_seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.get_connection().await?;
        let deleted: i32 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(CacheError::General(format!("unexpected PING reply: {}", pong)))
        }
    }
}
