//! # Endpoint Specifications
//!
//! Purpose: Describe the single backend a pool connects to, either from
//! discrete fields or from the compact string form used in configuration.
//!
//! ## Grammar (Redis-compatible stores)
//! ```text
//! <address> [<password>] [<databaseIndex>]
//!
//! "host:1 pwd 3"  -> addr "host:1", password "pwd", db 3
//! "host:1 3"      -> addr "host:1", no password,    db 3
//! "host:1"        -> error (fewer than two tokens)
//! "host:1 secret" -> error (second of two tokens must be the db index)
//! ```
//!
//! ## Notes
//! - Older deployments accepted `"host:1 secret"` as db 0 and silently
//!   dropped the password. That form is rejected here so a misplaced
//!   password never turns into an unauthenticated connection.
//! - `Display` never prints credentials; it is what ends up in logs and in
//!   error messages.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing an endpoint string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Wrong number of whitespace-separated tokens.
    #[error("expected `<address> [<password>] <db>`, got {found} token(s)")]
    TokenCount { found: usize },
    /// The database index is not a non-negative integer.
    #[error("invalid database index `{0}`")]
    DbIndex(String),
    /// The address token is empty.
    #[error("empty address")]
    EmptyAddress,
    /// The connection URI has an unsupported scheme.
    #[error("connection uri must start with mongodb:// or mongodb+srv://")]
    Scheme,
}

/// Address, credentials and logical database of a Redis-compatible store.
#[derive(Clone, PartialEq, Eq)]
pub struct RedisEndpoint {
    /// Server address, e.g. "127.0.0.1:6379".
    pub addr: String,
    /// Optional AUTH password.
    pub password: Option<String>,
    /// Logical database selected after connecting.
    pub db: u32,
}

impl RedisEndpoint {
    /// Endpoint without password on database 0.
    pub fn new(addr: impl Into<String>) -> Self {
        RedisEndpoint {
            addr: addr.into(),
            password: None,
            db: 0,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = if password.is_empty() { None } else { Some(password) };
        self
    }

    pub fn with_db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }
}

impl FromStr for RedisEndpoint {
    type Err = ParseError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = spec.split_whitespace().collect();
        let (addr, password, db) = match tokens.as_slice() {
            [addr, db] => (*addr, None, *db),
            [addr, password, db] => (*addr, Some(*password), *db),
            _ => return Err(ParseError::TokenCount { found: tokens.len() }),
        };

        let db = db
            .parse::<u32>()
            .map_err(|_| ParseError::DbIndex(db.to_string()))?;

        let endpoint = RedisEndpoint::new(addr).with_db(db);
        Ok(match password {
            Some(password) => endpoint.with_password(password),
            None => endpoint,
        })
    }
}

impl fmt::Display for RedisEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.db)
    }
}

// Hand-written so `{:?}` in a log line cannot leak the password.
impl fmt::Debug for RedisEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisEndpoint")
            .field("addr", &self.addr)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .finish()
    }
}

/// Connection URI of a MongoDB deployment.
#[derive(Clone, PartialEq, Eq)]
pub struct MongoEndpoint {
    uri: String,
}

impl MongoEndpoint {
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl FromStr for MongoEndpoint {
    type Err = ParseError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let uri = spec.trim();
        let rest = uri
            .strip_prefix("mongodb://")
            .or_else(|| uri.strip_prefix("mongodb+srv://"))
            .ok_or(ParseError::Scheme)?;
        if rest.is_empty() {
            return Err(ParseError::EmptyAddress);
        }
        Ok(MongoEndpoint {
            uri: uri.to_string(),
        })
    }
}

impl fmt::Display for MongoEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Drop the `user:pass@` part of the authority, keep the rest.
        let (scheme, rest) = self.uri.split_once("://").unwrap_or(("", self.uri.as_str()));
        let authority_end = rest.find('/').unwrap_or(rest.len());
        match rest[..authority_end].rfind('@') {
            Some(at) => write!(f, "{}://***@{}", scheme, &rest[at + 1..]),
            None => write!(f, "{}://{}", scheme, rest),
        }
    }
}

impl fmt::Debug for MongoEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MongoEndpoint").field(&self.to_string()).finish()
    }
}
