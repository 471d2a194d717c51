//! # Error Taxonomy
//!
//! Errors a pool reports to its caller. Exhaustion is deliberately absent:
//! an empty pool is a normal outcome and surfaces as `None` from `acquire`.

use thiserror::Error;

use crate::endpoint::ParseError;

/// Backend-specific failure carried inside pool errors.
///
/// Each backend keeps its own error type; the pool only needs to display
/// and chain it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by pool initialization, handle creation and release.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The endpoint string did not match the expected grammar.
    #[error("malformed endpoint: {0}")]
    Parse(#[from] ParseError),
    /// Transport-level failure while opening a connection.
    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: BoxError,
    },
    /// Connection opened but the liveness probe failed.
    #[error("liveness probe against {endpoint} failed: {source}")]
    Validation {
        endpoint: String,
        #[source]
        source: BoxError,
    },
    /// A pool must hold at least one handle.
    #[error("pool capacity must be at least 1")]
    ZeroCapacity,
    /// Re-initialization would orphan handles that are still borrowed.
    #[error("cannot re-initialize while {on_loan} handle(s) are on loan")]
    HandlesOnLoan { on_loan: usize },
    /// The handle was lent by a different pool.
    #[error("handle belongs to pool #{owner}, not pool #{pool}")]
    ForeignHandle { pool: u64, owner: u64 },
    /// The handle was created outside any pool.
    #[error("handle has no owning pool")]
    Unowned,
}

impl PoolError {
    /// Builds a `Connect` error naming the endpoint.
    pub fn connect(endpoint: &impl std::fmt::Display, source: impl Into<BoxError>) -> Self {
        PoolError::Connect {
            endpoint: endpoint.to_string(),
            source: source.into(),
        }
    }

    /// Builds a `Validation` error naming the endpoint.
    pub fn validation(endpoint: &impl std::fmt::Display, source: impl Into<BoxError>) -> Self {
        PoolError::Validation {
            endpoint: endpoint.to_string(),
            source: source.into(),
        }
    }

    /// True for failures that happened while talking to the backend.
    pub fn is_network(&self) -> bool {
        matches!(self, PoolError::Connect { .. } | PoolError::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_error_names_endpoint() {
        let err = PoolError::connect(&"10.0.0.1:6379/0", "connection refused");
        assert!(err.is_network());
        assert_eq!(
            err.to_string(),
            "could not connect to 10.0.0.1:6379/0: connection refused"
        );
    }

    #[test]
    fn parse_error_is_not_network() {
        let err = PoolError::from(ParseError::TokenCount { found: 1 });
        assert!(!err.is_network());
        assert!(matches!(err, PoolError::Parse(_)));
    }
}
