//! Graceful shutdown tests (§8 scenario 5).
//!
//! Verifies that `shutdown()`:
//! 1. destroys idle instances immediately,
//! 2. rejects new claims with `PoolNotRunning`,
//! 3. waits for claimed instances to drain before completing, and
//! 4. is idempotent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use objectpool::{Allocator, Error, Pool, PoolConfig, Result};

struct TrackingAllocator {
    deallocate_count: Arc<AtomicU32>,
}

impl Allocator for TrackingAllocator {
    type Instance = String;

    async fn allocate(&self) -> Result<String> {
        Ok("instance".to_string())
    }

    async fn deallocate(&self, _instance: String) -> Result<()> {
        self.deallocate_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn shutdown_destroys_idle_then_drains_claimed() {
    let deallocate_count = Arc::new(AtomicU32::new(0));
    let pool = Pool::new(
        TrackingAllocator {
            deallocate_count: Arc::clone(&deallocate_count),
        },
        PoolConfig::new(2),
    )
    .unwrap();

    let h1 = pool.claim().await.unwrap();
    let h2 = pool.claim().await.unwrap();

    // Return h1 to create an idle instance; h2 stays claimed.
    h1.release().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.metrics().currently_allocated, 2);
    assert_eq!(pool.metrics().currently_claimed, 1);

    let pool_for_shutdown = pool.clone();
    let shutdown = tokio::spawn(async move { pool_for_shutdown.shutdown().await });

    // The idle instance is destroyed right away.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(deallocate_count.load(Ordering::SeqCst), 1);

    // Shutdown must not complete until the claimed instance is released.
    assert!(!shutdown.is_finished());

    h2.release().await;
    shutdown.await.unwrap();

    assert_eq!(deallocate_count.load(Ordering::SeqCst), 2);
    let metrics = pool.metrics();
    assert_eq!(metrics.currently_allocated, 0);
    assert_eq!(metrics.currently_claimed, 0);
    assert_eq!(metrics.currently_waiting, 0);
}

#[tokio::test]
async fn claims_after_shutdown_fail_immediately() {
    let pool = Pool::new(
        TrackingAllocator {
            deallocate_count: Arc::new(AtomicU32::new(0)),
        },
        PoolConfig::new(1),
    )
    .unwrap();

    pool.shutdown().await;

    let result = pool.claim().await;
    assert!(matches!(result, Err(Error::PoolNotRunning)));
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let pool = Pool::new(
        TrackingAllocator {
            deallocate_count: Arc::new(AtomicU32::new(0)),
        },
        PoolConfig::new(1),
    )
    .unwrap();

    pool.shutdown().await;
    // A second call must also resolve rather than hang.
    pool.shutdown().await;
}

#[tokio::test]
async fn waiters_are_woken_with_pool_not_running_on_shutdown() {
    let pool = Arc::new(
        Pool::new(
            TrackingAllocator {
                deallocate_count: Arc::new(AtomicU32::new(0)),
            },
            PoolConfig::new(1),
        )
        .unwrap(),
    );

    let held = pool.claim().await.unwrap();

    let pool_clone = Arc::clone(&pool);
    let waiter = tokio::spawn(async move { pool_clone.claim().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.metrics().currently_waiting, 1);

    let pool_for_shutdown = Arc::clone(&pool);
    let shutdown = tokio::spawn(async move { pool_for_shutdown.shutdown().await });

    let waiter_result = waiter.await.unwrap();
    assert!(matches!(waiter_result, Err(Error::PoolNotRunning)));

    held.release().await;
    shutdown.await.unwrap();
}
