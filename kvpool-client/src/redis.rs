//! # Redis-Compatible Backend
//!
//! Purpose: Open TCP connections to a RESP2 server, authenticate, select the
//! logical database and expose the typed commands callers run through a
//! borrowed handle.
//!
//! ## Design Principles
//! 1. **Performance First**: Direct TCP writes, Nagle disabled, one reusable
//!    write buffer per connection.
//! 2. **Delegated Semantics**: Expiry and atomicity are the server's
//!    business; commands here only frame requests and shape replies.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use kvpool_common::{BoxError, PoolConfig, RedisEndpoint};

use crate::backend::Backend;
use crate::client::{ClientError, ClientResult, ClientTtl};
use crate::resp::{encode_command, RespReader, RespValue};

/// Connection factory for Redis-compatible servers.
#[derive(Debug, Clone, Default)]
pub struct RedisBackend {
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
}

impl RedisBackend {
    pub fn from_config(config: &PoolConfig) -> Self {
        RedisBackend {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        }
    }
}

impl Backend for RedisBackend {
    type Endpoint = RedisEndpoint;
    type Conn = RedisConnection;

    const KIND: &'static str = "redis";

    fn connect(&self, endpoint: &RedisEndpoint) -> Result<RedisConnection, BoxError> {
        Ok(RedisConnection::open(endpoint, self)?)
    }

    fn ping(&self, conn: &mut RedisConnection) -> Result<(), BoxError> {
        match conn.ping(None)?.as_slice() {
            b"PONG" => Ok(()),
            _ => Err(ClientError::UnexpectedResponse.into()),
        }
    }

    fn close(&self, conn: RedisConnection) {
        conn.shutdown();
    }
}

/// One TCP connection speaking RESP2.
pub struct RedisConnection {
    reader: RespReader<TcpStream>,
    write_buf: Vec<u8>,
}

impl RedisConnection {
    fn open(endpoint: &RedisEndpoint, backend: &RedisBackend) -> ClientResult<Self> {
        let stream = connect_stream(&endpoint.addr, backend.connect_timeout)?;
        stream.set_read_timeout(backend.read_timeout)?;
        stream.set_write_timeout(backend.write_timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        let mut conn = RedisConnection {
            reader: RespReader::new(stream),
            write_buf: Vec::with_capacity(256),
        };
        if let Some(password) = endpoint.password.as_deref() {
            conn.exec_ok(&[b"AUTH", password.as_bytes()])?;
        }
        if endpoint.db != 0 {
            let db = endpoint.db.to_string();
            conn.exec_ok(&[b"SELECT", db.as_bytes()])?;
        }
        Ok(conn)
    }

    /// Sends one raw command and reads its reply.
    pub fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        self.reader.read_value()
    }

    fn exec_ok(&mut self, args: &[&[u8]]) -> ClientResult<()> {
        match self.exec(args)?.into_result()? {
            RespValue::Simple(_) => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn exec_integer(&mut self, args: &[&[u8]]) -> ClientResult<i64> {
        match self.exec(args)?.into_result()? {
            RespValue::Integer(value) => Ok(value),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Fetches a value; `None` when the key is missing.
    pub fn get(&mut self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        match self.exec(&[b"GET", key])?.into_result()? {
            RespValue::Bulk(data) => Ok(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Sets a value, with an optional expiry.
    ///
    /// Whole seconds are sent as `EX`, anything finer as `PX`. A zero
    /// duration means no expiry.
    pub fn set(&mut self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> ClientResult<()> {
        match ttl.filter(|ttl| !ttl.is_zero()) {
            None => self.exec_ok(&[b"SET", key, value]),
            Some(ttl) if ttl.subsec_nanos() == 0 => {
                let seconds = ttl.as_secs().to_string();
                self.exec_ok(&[b"SET", key, value, b"EX", seconds.as_bytes()])
            }
            Some(ttl) => {
                let millis = ttl.as_millis().max(1).to_string();
                self.exec_ok(&[b"SET", key, value, b"PX", millis.as_bytes()])
            }
        }
    }

    /// Deletes a key. Returns true when a key was removed.
    pub fn delete(&mut self, key: &[u8]) -> ClientResult<bool> {
        Ok(self.exec_integer(&[b"DEL", key])? > 0)
    }

    /// Deletes several keys in one round trip; returns how many existed.
    pub fn multi_delete(&mut self, keys: &[&[u8]]) -> ClientResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut args: Vec<&[u8]> = Vec::with_capacity(keys.len() + 1);
        args.push(b"DEL");
        args.extend_from_slice(keys);
        Ok(self.exec_integer(&args)?.max(0) as u64)
    }

    pub fn exists(&mut self, key: &[u8]) -> ClientResult<bool> {
        Ok(self.exec_integer(&[b"EXISTS", key])? == 1)
    }

    /// Increments an integer value and returns the new value.
    pub fn incr(&mut self, key: &[u8]) -> ClientResult<i64> {
        self.exec_integer(&[b"INCR", key])
    }

    /// Fetches several keys; missing keys come back as `None`, in order.
    pub fn multi_get(&mut self, keys: &[&[u8]]) -> ClientResult<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut args: Vec<&[u8]> = Vec::with_capacity(keys.len() + 1);
        args.push(b"MGET");
        args.extend_from_slice(keys);
        match self.exec(&args)?.into_result()? {
            RespValue::Array(Some(items)) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::Bulk(data) => Ok(data),
                    _ => Err(ClientError::UnexpectedResponse),
                })
                .collect(),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Lists keys matching a glob-style pattern.
    pub fn keys(&mut self, pattern: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
        match self.exec(&[b"KEYS", pattern])?.into_result()? {
            RespValue::Array(Some(items)) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::Bulk(Some(key)) => Ok(key),
                    _ => Err(ClientError::UnexpectedResponse),
                })
                .collect(),
            RespValue::Array(None) => Ok(Vec::new()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Sets a time-to-live. Returns true when the TTL was set.
    ///
    /// Whole seconds go out as `EXPIRE`, anything finer as `PEXPIRE` with at
    /// least one millisecond. A zero duration expires the key immediately.
    pub fn expire(&mut self, key: &[u8], ttl: Duration) -> ClientResult<bool> {
        let reply = if ttl.subsec_nanos() == 0 {
            let seconds = ttl.as_secs().to_string();
            self.exec_integer(&[b"EXPIRE", key, seconds.as_bytes()])?
        } else {
            let millis = ttl.as_millis().max(1).to_string();
            self.exec_integer(&[b"PEXPIRE", key, millis.as_bytes()])?
        };
        Ok(reply == 1)
    }

    /// Returns TTL status for a key.
    pub fn ttl(&mut self, key: &[u8]) -> ClientResult<ClientTtl> {
        match self.exec_integer(&[b"TTL", key])? {
            -2 => Ok(ClientTtl::Missing),
            -1 => Ok(ClientTtl::NoExpiry),
            value if value >= 0 => Ok(ClientTtl::ExpiresIn(Duration::from_secs(value as u64))),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Pings the server. Returns the raw response payload.
    pub fn ping(&mut self, payload: Option<&[u8]>) -> ClientResult<Vec<u8>> {
        let response = match payload {
            Some(data) => self.exec(&[&b"PING"[..], data])?,
            None => self.exec(&[b"PING"])?,
        };
        match response.into_result()? {
            RespValue::Simple(text) => Ok(text),
            RespValue::Bulk(Some(data)) => Ok(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Fetches server INFO output.
    pub fn info(&mut self) -> ClientResult<Vec<u8>> {
        match self.exec(&[b"INFO"])?.into_result()? {
            RespValue::Bulk(Some(data)) => Ok(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn shutdown(self) {
        // The peer may already be gone; nothing useful to do with the error.
        let _ = self.reader.get_ref().shutdown(Shutdown::Both);
    }
}

fn connect_stream(addr: &str, timeout: Option<Duration>) -> ClientResult<TcpStream> {
    let addrs: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|_| ClientError::InvalidAddress)?
        .collect();

    let mut last_err = None;
    for addr in &addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.map_or(ClientError::InvalidAddress, ClientError::Io))
}
