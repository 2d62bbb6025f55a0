//! Bounded pool of dedicated Redis connections.
//!
//! `WATCH` state lives on the connection, so every checkout hands out a
//! connection that no other operation touches until it is returned.
//! Connections that failed on the wire, or that were dropped with a `WATCH`
//! still pending, are discarded instead of returned.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::AsyncConnectionConfig;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Connection pool shared by all repository operations.
#[derive(Clone)]
pub struct RedisPool {
    client: redis::Client,
    idle: Arc<Mutex<Vec<MultiplexedConnection>>>,
    semaphore: Arc<Semaphore>,
    max_connections: usize,
    checkout_timeout: Duration,
}

impl RedisPool {
    /// Create a pool of at most `max_connections` connections.
    pub fn new(client: redis::Client, max_connections: usize, checkout_timeout: Duration) -> Self {
        let max_connections = max_connections.max(1);
        Self {
            client,
            idle: Arc::new(Mutex::new(Vec::with_capacity(max_connections))),
            semaphore: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            checkout_timeout,
        }
    }

    /// Check a connection out of the pool, opening one if none is idle.
    ///
    /// Waiting for a free slot and opening the connection share the
    /// checkout timeout; exceeding it yields `BackendUnavailable`. The same
    /// timeout bounds every reply on the connection once it is open.
    pub async fn get(&self) -> DbResult<PooledConnection> {
        tokio::time::timeout(self.checkout_timeout, self.checkout())
            .await
            .map_err(|_| {
                DbError::backend_unavailable(format!(
                    "timed out after {:?} waiting for a redis connection",
                    self.checkout_timeout
                ))
            })?
    }

    async fn checkout(&self) -> DbResult<PooledConnection> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DbError::backend_unavailable("connection pool closed"))?;

        let conn = match self.pop_idle() {
            Some(conn) => conn,
            None => {
                debug!(active = self.active(), "Opening redis connection");
                let config = AsyncConnectionConfig::new()
                    .set_connection_timeout(self.checkout_timeout)
                    .set_response_timeout(self.checkout_timeout);
                self.client
                    .get_multiplexed_async_connection_with_config(&config)
                    .await?
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            idle: Arc::clone(&self.idle),
            reusable: true,
            _permit: permit,
        })
    }

    fn pop_idle(&self) -> Option<MultiplexedConnection> {
        self.idle.lock().ok().and_then(|mut idle| idle.pop())
    }

    /// Connections currently checked out.
    pub fn active(&self) -> usize {
        self.max_connections - self.semaphore.available_permits()
    }

    /// Connections waiting to be reused.
    pub fn idle(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A checked-out connection; returned to the pool on drop.
pub struct PooledConnection {
    conn: Option<MultiplexedConnection>,
    idle: Arc<Mutex<Vec<MultiplexedConnection>>>,
    reusable: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Pass `result` through, retiring the connection if it failed on the wire.
    pub fn check<T>(&mut self, result: DbResult<T>) -> DbResult<T> {
        if let Err(ref err) = result {
            if err.poisons_connection() {
                self.reusable = false;
            }
        }
        result
    }

    /// Keep the connection out of the pool until [`Self::end_watch`].
    ///
    /// A connection dropped between `WATCH` and `EXEC` would otherwise carry
    /// the watched keys into the next checkout.
    pub(crate) fn begin_watch(&mut self) {
        self.reusable = false;
    }

    /// `EXEC` was answered, so the server has cleared the watched keys.
    pub(crate) fn end_watch(&mut self) {
        self.reusable = true;
    }
}

impl Deref for PooledConnection {
    type Target = MultiplexedConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection is only taken on drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection is only taken on drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if !self.reusable {
            debug!("Discarding redis connection");
            return;
        }
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(conn);
        }
    }
}
