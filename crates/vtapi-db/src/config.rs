//! Redis connection configuration.

use std::time::Duration;

use redis::{ConnectionInfo, IntoConnectionInfo};

use crate::error::{DbError, DbResult};

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Default time to wait for a pooled connection (seconds).
pub const DEFAULT_POOL_TIMEOUT_SECS: u64 = 5;

const DEFAULT_REDIS_ADDR: &str = "127.0.0.1:6379";

/// Repository connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Redis address (`host:port` or a full `redis://` URL)
    pub redis_addr: String,
    /// Optional password
    pub password: Option<String>,
    /// Logical database index
    pub database: i64,
    /// Maximum number of pooled connections
    pub pool_size: usize,
    /// How long a caller waits for a pooled connection
    pub pool_timeout: Duration,
    /// Sentinel addresses; when non-empty the master is discovered through them
    pub sentinel_addrs: Vec<String>,
    /// Master name monitored by the sentinels
    pub sentinel_master_name: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            redis_addr: DEFAULT_REDIS_ADDR.to_string(),
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            pool_timeout: Duration::from_secs(DEFAULT_POOL_TIMEOUT_SECS),
            sentinel_addrs: Vec::new(),
            sentinel_master_name: None,
        }
    }
}

impl RedisConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_addr: std::env::var("REDIS_ADDR")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_REDIS_ADDR.to_string()),
            password: std::env::var("REDIS_PASSWORD")
                .ok()
                .filter(|s| !s.is_empty()),
            database: std::env::var("REDIS_DB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            pool_size: std::env::var("REDIS_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_POOL_SIZE),
            pool_timeout: Duration::from_secs(
                std::env::var("REDIS_POOL_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_POOL_TIMEOUT_SECS),
            ),
            sentinel_addrs: std::env::var("SENTINEL_ADDRS")
                .map(|s| parse_addr_list(&s))
                .unwrap_or_default(),
            sentinel_master_name: std::env::var("SENTINEL_MASTER_NAME")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }

    /// Pool size with zero treated as "use the default".
    pub fn effective_pool_size(&self) -> usize {
        if self.pool_size == 0 {
            DEFAULT_POOL_SIZE
        } else {
            self.pool_size
        }
    }

    /// Pool timeout with zero treated as "use the default".
    pub fn effective_pool_timeout(&self) -> Duration {
        if self.pool_timeout.is_zero() {
            Duration::from_secs(DEFAULT_POOL_TIMEOUT_SECS)
        } else {
            self.pool_timeout
        }
    }

    pub fn uses_sentinel(&self) -> bool {
        !self.sentinel_addrs.is_empty()
    }

    /// Connection info for the configured address.
    pub fn connection_info(&self) -> DbResult<ConnectionInfo> {
        self.connection_info_for(&self.redis_addr)
    }

    /// Connection info for `addr`, carrying this config's credentials and database.
    pub fn connection_info_for(&self, addr: &str) -> DbResult<ConnectionInfo> {
        let url = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("redis://{}", addr)
        };

        let mut info = url
            .as_str()
            .into_connection_info()
            .map_err(|e| {
                DbError::configuration(format!("invalid redis address {:?}: {}", addr, e))
            })?;

        if let Some(ref password) = self.password {
            info.redis.password = Some(password.clone());
        }
        if self.database != 0 {
            info.redis.db = self.database;
        }
        Ok(info)
    }
}

fn parse_addr_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
