// kvpool-common - Shared endpoint, error and configuration types for KvPool
//
// This crate holds everything the pool and its backends agree on but that
// carries no I/O of its own.

pub mod config;
pub mod endpoint;
pub mod error;

// Re-export for convenience
pub use config::*;
pub use endpoint::*;
pub use error::*;
