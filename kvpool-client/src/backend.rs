//! # Backend Contract
//!
//! The pool never speaks a wire protocol itself. A `Backend` knows how to
//! open, probe and close one connection; everything else (GET, SET, ...)
//! lives on the connection type and is used through a borrowed handle.

use std::fmt;
use std::str::FromStr;

use kvpool_common::{BoxError, ParseError};

/// Connection factory for one kind of key-value store.
pub trait Backend: Send + Sync + 'static {
    /// Address and credentials of the single endpoint a pool talks to.
    type Endpoint: FromStr<Err = ParseError> + fmt::Display + fmt::Debug + Send + Sync + 'static;
    /// One live connection.
    type Conn: Send + 'static;

    /// Short backend name used in log fields.
    const KIND: &'static str;

    /// Opens a new connection (including any auth/database handshake).
    fn connect(&self, endpoint: &Self::Endpoint) -> Result<Self::Conn, BoxError>;

    /// One-shot liveness probe.
    fn ping(&self, conn: &mut Self::Conn) -> Result<(), BoxError>;

    /// Releases the connection. Called at most once per connection.
    fn close(&self, conn: Self::Conn);
}
