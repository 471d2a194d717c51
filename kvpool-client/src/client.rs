//! # Redis Client Facade
//!
//! Purpose: One-call access to a pooled Redis-compatible store. Each call
//! borrows a handle, runs one command and gives the handle back.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `RedisClient` hides pooling and protocol details.
//! 2. **Borrow-Friendly API**: Accept `&[u8]` to avoid unnecessary copies.
//! 3. **Fail Fast**: An exhausted pool is `ClientError::PoolExhausted`; the
//!    facade never waits or retries.

use std::time::Duration;

use kvpool_common::{PoolConfig, PoolError};
use thiserror::Error;
use tracing::{debug, info};

use crate::pool::Pool;
use crate::redis::{RedisBackend, RedisConnection};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RESP2 framing or parse error.
    #[error("protocol error")]
    Protocol,
    /// Server returned an error reply.
    #[error("server error: {}", String::from_utf8_lossy(.message))]
    Server { message: Vec<u8> },
    /// Response type did not match the expected command response.
    #[error("unexpected response")]
    UnexpectedResponse,
    /// No idle handle was available.
    #[error("connection pool exhausted")]
    PoolExhausted,
    /// Address could not be resolved to a socket address.
    #[error("invalid address")]
    InvalidAddress,
    /// Pool setup or reconnect failure.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl ClientError {
    /// True when the connection can no longer be trusted and should be
    /// dropped rather than reused.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, ClientError::Io(_) | ClientError::Protocol)
    }
}

/// TTL state returned by the server, mirroring Redis semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTtl {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

/// Borrow-use-return facade over a Redis pool.
#[derive(Debug, Clone)]
pub struct RedisClient {
    pool: Pool<RedisBackend>,
}

impl RedisClient {
    /// Wraps an already initialized pool.
    pub fn new(pool: Pool<RedisBackend>) -> Self {
        RedisClient { pool }
    }

    /// Connects `capacity` handles to `spec` ("addr [password] db"),
    /// validating each one and failing on the first error.
    pub fn connect(spec: &str, capacity: usize) -> ClientResult<Self> {
        let config = PoolConfig {
            endpoint: spec.to_string(),
            capacity,
            ..PoolConfig::default()
        };
        Self::with_config(&config)
    }

    /// Builds the backend and pool described by `config`.
    pub fn with_config(config: &PoolConfig) -> ClientResult<Self> {
        let pool = Pool::new(RedisBackend::from_config(config));
        let report = pool.initialize_from_str(&config.endpoint, config.init_options())?;
        info!(
            pool = pool.id(),
            connected = report.connected,
            failed = report.failed,
            "redis client ready"
        );
        Ok(RedisClient { pool })
    }

    pub fn pool(&self) -> &Pool<RedisBackend> {
        &self.pool
    }

    /// Runs `op` on a borrowed connection.
    ///
    /// Connections that hit an I/O or framing error are closed before the
    /// handle goes back, so the next borrower reconnects.
    fn with_conn<T>(
        &self,
        command: &'static str,
        op: impl FnOnce(&mut RedisConnection) -> ClientResult<T>,
    ) -> ClientResult<T> {
        let mut handle = match self.pool.acquire() {
            Some(handle) => handle,
            None => {
                debug!(command, "redis pool exhausted");
                return Err(ClientError::PoolExhausted);
            }
        };

        let result = op(handle.connection()?);
        if let Err(err) = &result {
            debug!(command, error = %err, "redis command failed");
            if err.is_connection_fault() {
                handle.invalidate();
            }
        }
        result
    }

    /// Fetches a value by key.
    ///
    /// Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        self.with_conn("GET", |conn| conn.get(key))
    }

    /// Sets a value; `ttl` of `None` or zero means no expiry.
    pub fn set(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> ClientResult<()> {
        self.with_conn("SET", |conn| conn.set(key, value, ttl))
    }

    /// Deletes a key. Returns true when a key was removed.
    pub fn delete(&self, key: &[u8]) -> ClientResult<bool> {
        self.with_conn("DEL", |conn| conn.delete(key))
    }

    /// Deletes several keys; returns how many existed.
    pub fn multi_delete(&self, keys: &[&[u8]]) -> ClientResult<u64> {
        self.with_conn("DEL", |conn| conn.multi_delete(keys))
    }

    pub fn exists(&self, key: &[u8]) -> ClientResult<bool> {
        self.with_conn("EXISTS", |conn| conn.exists(key))
    }

    pub fn incr(&self, key: &[u8]) -> ClientResult<i64> {
        self.with_conn("INCR", |conn| conn.incr(key))
    }

    pub fn multi_get(&self, keys: &[&[u8]]) -> ClientResult<Vec<Option<Vec<u8>>>> {
        self.with_conn("MGET", |conn| conn.multi_get(keys))
    }

    pub fn keys(&self, pattern: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
        self.with_conn("KEYS", |conn| conn.keys(pattern))
    }

    /// Sets a time-to-live on a key. Returns true when the TTL was set.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> ClientResult<bool> {
        self.with_conn("EXPIRE", |conn| conn.expire(key, ttl))
    }

    pub fn ttl(&self, key: &[u8]) -> ClientResult<ClientTtl> {
        self.with_conn("TTL", |conn| conn.ttl(key))
    }

    /// Pings the server. Returns the raw response payload.
    pub fn ping(&self, payload: Option<&[u8]>) -> ClientResult<Vec<u8>> {
        self.with_conn("PING", |conn| conn.ping(payload))
    }

    /// Fetches server INFO output.
    pub fn info(&self) -> ClientResult<Vec<u8>> {
        self.with_conn("INFO", |conn| conn.info())
    }
}
