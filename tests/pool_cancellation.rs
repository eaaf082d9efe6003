//! `claim()` cancellation safety tests.
//!
//! Verifies that cancelling a claim mid-wait (dropped future, or an explicit
//! `CancellationToken`) never leaks a slot or corrupts pool bookkeeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use objectpool::{Allocator, Pool, PoolConfig, Result};
use tokio_util::sync::CancellationToken;

struct SimpleAllocator {
    counter: AtomicU64,
}

impl SimpleAllocator {
    fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl Allocator for SimpleAllocator {
    type Instance = u64;

    async fn allocate(&self) -> Result<u64> {
        Ok(self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn claim_cancelled_mid_wait_no_slot_leak() {
    let pool = Pool::new(SimpleAllocator::new(), PoolConfig::new(1)).unwrap();

    // Hold the only slot.
    let first = pool.claim().await.unwrap();

    // Start a second claim that will block waiting in the queue, and cancel
    // it via a `CancellationToken` after it has had time to enqueue.
    let token = CancellationToken::new();
    let pool_clone = pool.clone();
    let token_clone = token.clone();
    let waiting = tokio::spawn(async move { pool_clone.claim_cancellable(&token_clone).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(pool.metrics().currently_waiting, 1);

    token.cancel();
    let result = waiting.await.unwrap();
    assert!(result.is_err(), "cancelled claim should fail");

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(
        pool.metrics().currently_waiting,
        0,
        "cancelled waiter must remove itself from the queue"
    );

    first.release().await;

    // The slot must still be usable: a cancelled waiter must never have
    // consumed it.
    let second = pool
        .claim()
        .await
        .expect("pool should still work after a cancelled claim");
    assert_eq!(*second, 0, "should reuse the returned instance");
    second.release().await;

    assert_eq!(pool.metrics().currently_claimed, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_claim_future_returns_handed_off_instance() {
    // Regression test for the race in §5: if a waiter is handed a specific
    // instance via release just as its claiming future is dropped, that
    // instance must be reclaimed by the pool instead of leaking.
    let pool = Arc::new(Pool::new(SimpleAllocator::new(), PoolConfig::new(1)).unwrap());

    let first = pool.claim().await.unwrap();

    let pool_clone = Arc::clone(&pool);
    let waiting = tokio::spawn(async move { pool_clone.claim().await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    first.release().await;
    let second = waiting.await.unwrap().unwrap();
    second.release().await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    let metrics = pool.metrics();
    assert_eq!(metrics.currently_claimed, 0);
    assert_eq!(metrics.currently_allocated, 1);
}
