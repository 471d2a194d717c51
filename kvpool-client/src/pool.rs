//! # Connection Pool
//!
//! Purpose: Lend a fixed number of pre-built connections to concurrent
//! callers and take them back, without ever blocking on capacity.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Exactly `capacity` handles are created up
//!    front; the pool never grows or dials on demand.
//! 2. **Minimal Locking**: `acquire`/`release` hold the mutex only to move a
//!    connection in or out of the idle stack. No I/O happens under the lock
//!    except during `initialize`, which callers run before sharing the pool.
//! 3. **Fail Fast**: An empty pool returns `None`; backoff and retry belong
//!    to the caller.
//! 4. **LIFO Reuse**: The most recently returned connection is lent next,
//!    which keeps hot connections hot.
//!
//! ## Invariants
//! - `idle.len() + on_loan == capacity` whenever the lock is released.
//! - A connection is either idle or on loan, never both (handles are moved,
//!   not shared).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kvpool_common::{InitOptions, PoolError, PoolResult};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::handle::{open, Handle, Owner};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Outcome of a successful `initialize`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Handles created with a working connection.
    pub connected: usize,
    /// Handles created disconnected (best-effort mode only).
    pub failed: usize,
}

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub idle: usize,
    pub on_loan: usize,
}

struct PoolState<B: Backend> {
    endpoint: Option<Arc<B::Endpoint>>,
    // `None` marks a handle whose connection could not be opened.
    idle: Vec<Option<B::Conn>>,
    on_loan: usize,
    capacity: usize,
    // Set by `drain`: returned connections are closed instead of kept.
    draining: bool,
}

pub(crate) struct PoolInner<B: Backend> {
    id: u64,
    backend: Arc<B>,
    state: Mutex<PoolState<B>>,
}

impl<B: Backend> PoolInner<B> {
    fn lock(&self) -> MutexGuard<'_, PoolState<B>> {
        // The guarded state is only touched by non-panicking O(1) code.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a lent connection back. The caller has already matched owners.
    pub(crate) fn check_in(&self, conn: Option<B::Conn>) {
        let mut state = self.lock();
        state.on_loan = state.on_loan.saturating_sub(1);
        if !state.draining {
            state.idle.push(conn);
            return;
        }

        state.capacity = state.capacity.saturating_sub(1);
        drop(state);
        if let Some(conn) = conn {
            self.backend.close(conn);
        }
        debug!(kind = B::KIND, pool = self.id, "closed connection returned while draining");
    }
}

impl<B: Backend> Drop for PoolInner<B> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for conn in state.idle.drain(..).flatten() {
            self.backend.close(conn);
        }
    }
}

/// Fixed-capacity pool of connections to a single endpoint.
///
/// Cloning is cheap and yields another reference to the same pool.
pub struct Pool<B: Backend> {
    inner: Arc<PoolInner<B>>,
}

impl<B: Backend> Clone for Pool<B> {
    fn clone(&self) -> Self {
        Pool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> Pool<B> {
    /// Creates an empty pool. Call `initialize` before lending.
    pub fn new(backend: B) -> Self {
        Pool {
            inner: Arc::new(PoolInner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                backend: Arc::new(backend),
                state: Mutex::new(PoolState {
                    endpoint: None,
                    idle: Vec::new(),
                    on_loan: 0,
                    capacity: 0,
                    draining: false,
                }),
            }),
        }
    }

    /// Process-unique id; lent handles carry it as their owner tag.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Creates `options.capacity` handles to `endpoint`.
    ///
    /// With `fail_fast` the first connect or validation failure aborts:
    /// connections opened so far are closed and the pool is left empty.
    /// Without it, failed handles are kept disconnected and counted in the
    /// report; each one retries the connect on its first use.
    ///
    /// Re-initialization replaces the pool contents, and is refused while
    /// any handle is on loan.
    pub fn initialize(&self, endpoint: B::Endpoint, options: InitOptions) -> PoolResult<InitReport> {
        if options.capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }

        let backend = self.inner.backend.as_ref();
        let mut state = self.inner.lock();
        if state.on_loan > 0 {
            warn!(
                kind = B::KIND,
                pool = self.inner.id,
                on_loan = state.on_loan,
                "re-initialization refused"
            );
            return Err(PoolError::HandlesOnLoan {
                on_loan: state.on_loan,
            });
        }

        info!(
            kind = B::KIND,
            pool = self.inner.id,
            endpoint = %endpoint,
            capacity = options.capacity,
            "pool initialization begin"
        );

        for conn in state.idle.drain(..).flatten() {
            backend.close(conn);
        }
        state.capacity = 0;
        state.draining = false;
        state.endpoint = None;

        let mut idle = Vec::with_capacity(options.capacity);
        let mut report = InitReport::default();
        for slot in 0..options.capacity {
            match open(backend, &endpoint, options.validate_on_init) {
                Ok(conn) => {
                    idle.push(Some(conn));
                    report.connected += 1;
                }
                Err(err) if options.fail_fast => {
                    warn!(kind = B::KIND, pool = self.inner.id, slot, error = %err, "pool initialization aborted");
                    for conn in idle.into_iter().flatten() {
                        backend.close(conn);
                    }
                    return Err(err);
                }
                Err(err) => {
                    warn!(kind = B::KIND, pool = self.inner.id, slot, error = %err, "handle left disconnected");
                    idle.push(None);
                    report.failed += 1;
                }
            }
        }

        state.idle = idle;
        state.capacity = options.capacity;
        state.endpoint = Some(Arc::new(endpoint));
        info!(
            kind = B::KIND,
            pool = self.inner.id,
            connected = report.connected,
            failed = report.failed,
            "pool initialization end"
        );
        Ok(report)
    }

    /// Parses `spec` and initializes from it.
    pub fn initialize_from_str(&self, spec: &str, options: InitOptions) -> PoolResult<InitReport> {
        let endpoint = spec.parse::<B::Endpoint>()?;
        self.initialize(endpoint, options)
    }

    /// Lends the most recently returned handle, or `None` when exhausted.
    pub fn acquire(&self) -> Option<Handle<B>> {
        let lent = {
            let mut state = self.inner.lock();
            let lent = match state.endpoint.clone() {
                Some(endpoint) => state.idle.pop().map(|conn| (conn, endpoint)),
                None => None,
            };
            if lent.is_some() {
                state.on_loan += 1;
            }
            lent
        };
        let Some((conn, endpoint)) = lent else {
            debug!(kind = B::KIND, pool = self.inner.id, "no idle handle");
            return None;
        };

        let owner = Owner {
            pool: Arc::downgrade(&self.inner),
            id: self.inner.id,
        };
        Some(Handle::pooled(
            conn,
            endpoint,
            Arc::clone(&self.inner.backend),
            owner,
        ))
    }

    /// Takes a handle back.
    ///
    /// Handles lent by another pool, or created standalone, are refused and
    /// handed back inside the error untouched.
    pub fn release(&self, mut handle: Handle<B>) -> Result<(), Rejected<B>> {
        let owner = match handle.owner_id() {
            Some(owner) => owner,
            None => return Err(self.reject(handle, PoolError::Unowned)),
        };
        if owner != self.inner.id {
            let error = PoolError::ForeignHandle {
                pool: self.inner.id,
                owner,
            };
            return Err(self.reject(handle, error));
        }

        handle.owner = None;
        let conn = handle.conn.take();
        self.inner.check_in(conn);
        Ok(())
    }

    fn reject(&self, handle: Handle<B>, error: PoolError) -> Rejected<B> {
        warn!(kind = B::KIND, pool = self.inner.id, error = %error, "release rejected");
        Rejected { handle, error }
    }

    /// Idle handle count. A racy snapshot, not a reservation.
    pub fn size(&self) -> usize {
        self.inner.lock().idle.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        PoolStats {
            capacity: state.capacity,
            idle: state.idle.len(),
            on_loan: state.on_loan,
        }
    }

    /// Closes every idle connection and stops taking handles back.
    ///
    /// Capacity shrinks to the number of handles still on loan; each of those
    /// is closed when it comes back. Returns the number of idle handles
    /// removed. `initialize` is allowed again once nothing is on loan.
    pub fn drain(&self) -> usize {
        let (idle, on_loan) = {
            let mut state = self.inner.lock();
            let idle = std::mem::take(&mut state.idle);
            state.capacity = state.on_loan;
            state.draining = true;
            (idle, state.on_loan)
        };

        let removed = idle.len();
        for conn in idle.into_iter().flatten() {
            self.inner.backend.close(conn);
        }
        info!(kind = B::KIND, pool = self.inner.id, removed, on_loan, "pool drained");
        removed
    }
}

impl<B: Backend> fmt::Debug for Pool<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("kind", &B::KIND)
            .field("id", &self.inner.id)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A handle `release` refused, with the reason.
pub struct Rejected<B: Backend> {
    handle: Handle<B>,
    error: PoolError,
}

impl<B: Backend> Rejected<B> {
    pub fn error(&self) -> &PoolError {
        &self.error
    }

    pub fn into_handle(self) -> Handle<B> {
        self.handle
    }

    pub fn into_parts(self) -> (Handle<B>, PoolError) {
        (self.handle, self.error)
    }
}

impl<B: Backend> fmt::Debug for Rejected<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("handle", &self.handle)
            .field("error", &self.error)
            .finish()
    }
}

impl<B: Backend> fmt::Display for Rejected<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "release rejected: {}", self.error)
    }
}

impl<B: Backend> std::error::Error for Rejected<B> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
