//! # Pool Configuration
//!
//! Serde-backed settings for building a pool from a config file, plus the
//! per-initialization options the pool itself consumes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options for one `Pool::initialize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOptions {
    /// Number of handles created; fixed until the next initialization.
    pub capacity: usize,
    /// Ping every handle as it is created.
    pub validate_on_init: bool,
    /// Abort on the first connect/validation failure instead of continuing
    /// best-effort.
    pub fail_fast: bool,
}

impl InitOptions {
    pub fn new(capacity: usize) -> Self {
        InitOptions {
            capacity,
            validate_on_init: true,
            fail_fast: true,
        }
    }

    pub fn validate_on_init(mut self, validate: bool) -> Self {
        self.validate_on_init = validate;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// File-level pool configuration.
///
/// Every field has a default, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Endpoint string, e.g. "127.0.0.1:6379 secret 0".
    pub endpoint: String,
    /// Number of pooled handles.
    pub capacity: usize,
    /// Ping each handle during initialization.
    pub validate_on_init: bool,
    /// Abort initialization on the first failure.
    pub fail_fast: bool,
    /// Optional TCP connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Optional TCP read timeout in milliseconds.
    pub read_timeout_ms: Option<u64>,
    /// Optional TCP write timeout in milliseconds.
    pub write_timeout_ms: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            endpoint: "127.0.0.1:6379 0".to_string(),
            capacity: 8,
            validate_on_init: true,
            fail_fast: true,
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
        }
    }
}

impl PoolConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn init_options(&self) -> InitOptions {
        InitOptions::new(self.capacity)
            .validate_on_init(self.validate_on_init)
            .fail_fast(self.fail_fast)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}
