//! In-memory backend for exercising pool bookkeeping without a network.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use kvpool_client::{Backend, BoxError, Handle, RedisEndpoint};
use tracing_subscriber::EnvFilter;

/// Routes pool logs through the test harness; `RUST_LOG=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared counters and failure switches, kept by the test after the
/// backend has moved into a pool.
#[derive(Debug)]
pub struct Counters {
    pub down: AtomicBool,
    pub ping_fails: AtomicBool,
    pub max_connects: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl Counters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct MockBackend {
    pub counters: Arc<Counters>,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend {
            counters: Arc::new(Counters {
                down: AtomicBool::new(false),
                ping_fails: AtomicBool::new(false),
                max_connects: AtomicUsize::new(usize::MAX),
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }),
        }
    }
}

#[derive(Debug)]
pub struct MockConn {
    pub id: usize,
}

impl Backend for MockBackend {
    type Endpoint = RedisEndpoint;
    type Conn = MockConn;

    const KIND: &'static str = "mock";

    fn connect(&self, _endpoint: &RedisEndpoint) -> Result<MockConn, BoxError> {
        let counters = &self.counters;
        if counters.down.load(Ordering::SeqCst)
            || counters.opened() >= counters.max_connects.load(Ordering::SeqCst)
        {
            return Err("connection refused".into());
        }
        Ok(MockConn {
            id: counters.opened.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn ping(&self, _conn: &mut MockConn) -> Result<(), BoxError> {
        if self.counters.ping_fails.load(Ordering::SeqCst) {
            return Err("no PONG".into());
        }
        Ok(())
    }

    fn close(&self, _conn: MockConn) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn endpoint() -> RedisEndpoint {
    "cache.internal:6379 0".parse().expect("endpoint")
}

pub fn conn_id(handle: &mut Handle<MockBackend>) -> usize {
    handle.connection().expect("connected").id
}
