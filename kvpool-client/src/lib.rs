//! # KvPool Client
//!
//! Purpose: Lend a fixed number of reusable connections to a key-value store
//! out to concurrent callers, and take them back when the callers are done.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Connections are created once, eagerly, and reused.
//! 2. **Fail Fast**: `acquire` never blocks and never grows the pool; an empty
//!    pool is reported to the caller, who owns the retry policy.
//! 3. **Minimal Locking**: The mutex is held only while moving idle handles.
//! 4. **Strategy Pattern**: The wire client is a `Backend`, so the same pool
//!    serves Redis-compatible stores and MongoDB.

mod backend;
mod client;
mod handle;
#[cfg(feature = "mongodb")]
mod mongo;
mod pool;
mod redis;
mod resp;

pub use backend::Backend;
pub use client::{ClientError, ClientResult, ClientTtl, RedisClient};
pub use handle::Handle;
#[cfg(feature = "mongodb")]
pub use mongo::{MongoBackend, MongoConnection};
pub use pool::{InitReport, Pool, PoolStats, Rejected};
pub use redis::{RedisBackend, RedisConnection};
pub use resp::RespValue;

pub use kvpool_common::{
    BoxError, InitOptions, MongoEndpoint, ParseError, PoolConfig, PoolError, PoolResult,
    RedisEndpoint,
};
