use super::{CacheError, CacheStore};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default time allowed to establish a connection
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Redis-backed cache store
///
/// The multiplexed connection is established lazily and reused. When it
/// breaks, it is dropped and re-established on the next command; while Redis
/// is down every command fails fast with [`CacheError::Unavailable`].
pub struct RedisCacheStore {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    connect_timeout: Duration,
}

impl RedisCacheStore {
    /// Create a new Redis store
    ///
    /// # Errors
    ///
    /// Returns error if Redis URL is invalid. No connection is attempted here.
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| CacheError::Command(e.to_string()))?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    /// Set how long to wait for a connection
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Get a live connection, connecting if needed
    async fn get_connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let cached = self
            .connection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(conn) = cached {
            return Ok(conn);
        }

        let conn = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Unavailable("Redis connection timed out".to_string()))?
        .map_err(|e| CacheError::Unavailable(format!("Redis connection failed: {}", e)))?;

        info!("Connected to Redis");
        *self.connection.lock().unwrap_or_else(|e| e.into_inner()) = Some(conn.clone());
        Ok(conn)
    }

    /// Drop the cached connection after an I/O failure
    fn invalidate(&self, err: &redis::RedisError) -> CacheError {
        if err.is_io_error() || err.is_connection_dropped() {
            self.connection
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            warn!(error = %err, "Redis connection lost");
            CacheError::Unavailable(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }

    /// Ping the server
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if Redis cannot be reached.
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| self.invalidate(&e))?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.get_connection().await?;

        let data: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.invalidate(&e))?;

        debug!(key = %key, hit = data.is_some(), "Redis GET");
        Ok(data)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;

        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| self.invalidate(&e))?;

        debug!(key = %key, ttl_secs = ttl.as_secs(), "Redis SETEX");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
