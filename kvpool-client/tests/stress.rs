mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use proptest::sample::Index;
use rand::Rng;

use kvpool_client::{InitOptions, Pool};

use common::{endpoint, init_tracing, MockBackend};

proptest! {
    #[test]
    fn capacity_is_conserved(
        capacity in 1usize..12,
        ops in prop::collection::vec((any::<bool>(), any::<Index>()), 1..200),
    ) {
        let pool = Pool::new(MockBackend::new());
        pool.initialize(endpoint(), InitOptions::new(capacity)).unwrap();
        let mut held = Vec::new();

        for (borrow, pick) in ops {
            if borrow {
                match pool.acquire() {
                    Some(handle) => held.push(handle),
                    None => prop_assert_eq!(held.len(), capacity),
                }
            } else if !held.is_empty() {
                let handle = held.swap_remove(pick.index(held.len()));
                prop_assert!(pool.release(handle).is_ok());
            }

            let stats = pool.stats();
            prop_assert_eq!(stats.capacity, capacity);
            prop_assert_eq!(stats.idle + stats.on_loan, capacity);
            prop_assert_eq!(stats.on_loan, held.len());
        }

        drop(held);
        prop_assert_eq!(pool.size(), capacity);
    }
}

#[test]
fn round_trip_under_load() {
    const CAPACITY: usize = 20;
    const CYCLES: usize = 100;
    init_tracing();

    let backend = MockBackend::new();
    let pool = Pool::new(backend.clone());
    pool.initialize(endpoint(), InitOptions::new(CAPACITY))
        .expect("initialize");

    let in_use = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let exhausted = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..CYCLES)
        .map(|_| {
            let pool = pool.clone();
            let in_use = Arc::clone(&in_use);
            let peak = Arc::clone(&peak);
            let exhausted = Arc::clone(&exhausted);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                loop {
                    let Some(mut handle) = pool.acquire() else {
                        // Caller-side backoff; the pool itself never waits.
                        exhausted.fetch_add(1, Ordering::Relaxed);
                        thread::sleep(Duration::from_micros(rng.gen_range(50..500)));
                        continue;
                    };

                    let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    handle.connection().expect("connected");
                    thread::sleep(Duration::from_millis(rng.gen_range(0..5)));
                    in_use.fetch_sub(1, Ordering::SeqCst);

                    pool.release(handle).expect("release");
                    break;
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker");
    }

    let stats = pool.stats();
    assert_eq!(stats.capacity, CAPACITY);
    assert_eq!(stats.idle, CAPACITY);
    assert_eq!(stats.on_loan, 0);
    assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
    // No connection was created beyond the initial population.
    assert_eq!(backend.counters.opened(), CAPACITY);
    assert_eq!(backend.counters.closed(), 0);
}
