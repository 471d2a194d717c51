//! # Connection Handle
//!
//! Purpose: Own one backend connection and find its way home to the pool
//! that lent it.
//!
//! ## Design Principles
//! 1. **RAII**: Dropping a pooled handle returns it, so an early `?` in the
//!    caller cannot leak a slot.
//! 2. **Weak Back-Reference**: A handle never keeps its pool alive; if the
//!    pool is gone the connection is simply closed.
//! 3. **Lazy Reconnect**: A handle whose connection failed (best-effort
//!    initialization, or an invalidated connection) reconnects once on its
//!    next use and reports the failure if the endpoint is still unreachable.

use std::fmt;
use std::sync::{Arc, Weak};

use kvpool_common::{PoolError, PoolResult};
use tracing::debug;

use crate::backend::Backend;
use crate::pool::PoolInner;

/// Back-reference plus the owner tag checked on release.
pub(crate) struct Owner<B: Backend> {
    pub(crate) pool: Weak<PoolInner<B>>,
    pub(crate) id: u64,
}

/// One connection to the backend, either lent by a pool or standalone.
pub struct Handle<B: Backend> {
    pub(crate) conn: Option<B::Conn>,
    endpoint: Arc<B::Endpoint>,
    backend: Arc<B>,
    pub(crate) owner: Option<Owner<B>>,
}

impl<B: Backend> Handle<B> {
    /// Opens a standalone handle that belongs to no pool.
    ///
    /// `validate` pings the connection once; the error tells "could not
    /// open" (`PoolError::Connect`) apart from "opened but failed the probe"
    /// (`PoolError::Validation`).
    pub fn connect(backend: Arc<B>, endpoint: B::Endpoint, validate: bool) -> PoolResult<Self> {
        let conn = open(backend.as_ref(), &endpoint, validate)?;
        Ok(Handle {
            conn: Some(conn),
            endpoint: Arc::new(endpoint),
            backend,
            owner: None,
        })
    }

    pub(crate) fn pooled(
        conn: Option<B::Conn>,
        endpoint: Arc<B::Endpoint>,
        backend: Arc<B>,
        owner: Owner<B>,
    ) -> Self {
        Handle {
            conn,
            endpoint,
            backend,
            owner: Some(owner),
        }
    }

    pub fn endpoint(&self) -> &B::Endpoint {
        &self.endpoint
    }

    /// False when the handle holds no open connection.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Id of the pool that lent this handle, if any.
    pub fn owner_id(&self) -> Option<u64> {
        self.owner.as_ref().map(|owner| owner.id)
    }

    /// Borrows the live connection, reconnecting once if there is none.
    pub fn connection(&mut self) -> PoolResult<&mut B::Conn> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                debug!(kind = B::KIND, endpoint = %self.endpoint, "reconnecting handle");
                self.backend
                    .connect(&self.endpoint)
                    .map_err(|source| PoolError::connect(&self.endpoint, source))?
            }
        };
        Ok(self.conn.insert(conn))
    }

    /// Closes the connection after an I/O or protocol failure.
    ///
    /// The handle keeps its pool slot; the next `connection()` call dials
    /// again.
    pub fn invalidate(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.backend.close(conn);
        }
    }

    /// Closes a standalone handle.
    ///
    /// A pooled handle is returned to its pool instead: the pool owns the
    /// slot and closes its connections on `drain` or when it is dropped.
    pub fn close(mut self) {
        self.finish();
    }

    /// Returns the handle to the pool that lent it.
    ///
    /// A standalone handle has nowhere to go and is handed back unchanged.
    #[must_use = "a standalone handle is returned and closes when dropped"]
    pub fn return_to_pool(mut self) -> Option<Self> {
        if self.owner.is_none() {
            return Some(self);
        }
        self.give_back();
        None
    }

    fn give_back(&mut self) {
        let Some(owner) = self.owner.take() else {
            return;
        };
        let conn = self.conn.take();
        match owner.pool.upgrade() {
            Some(pool) => pool.check_in(conn),
            None => {
                if let Some(conn) = conn {
                    self.backend.close(conn);
                }
            }
        }
    }

    fn finish(&mut self) {
        if self.owner.is_some() {
            self.give_back();
        } else if let Some(conn) = self.conn.take() {
            self.backend.close(conn);
        }
    }
}

impl<B: Backend> Drop for Handle<B> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<B: Backend> fmt::Debug for Handle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &B::KIND)
            .field("endpoint", &self.endpoint)
            .field("connected", &self.conn.is_some())
            .field("owner", &self.owner_id())
            .finish()
    }
}

/// Opens one connection and optionally probes it.
pub(crate) fn open<B: Backend>(
    backend: &B,
    endpoint: &B::Endpoint,
    validate: bool,
) -> PoolResult<B::Conn> {
    let mut conn = backend
        .connect(endpoint)
        .map_err(|source| PoolError::connect(endpoint, source))?;

    if validate {
        if let Err(source) = backend.ping(&mut conn) {
            backend.close(conn);
            return Err(PoolError::validation(endpoint, source));
        }
        debug!(kind = B::KIND, endpoint = %endpoint, "ping ok");
    }

    Ok(conn)
}
