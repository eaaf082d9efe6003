//! Concurrent stress test for the pool core.
//!
//! Verifies that 50 concurrent tasks doing random claim/release/invalidate
//! cycles never violate `currently_allocated <= max_size`, never corrupt the
//! counters, and never deadlock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use objectpool::{Allocator, Pool, PoolConfig, Result};
use tokio::task::JoinSet;

struct StressAllocator {
    create_count: AtomicU64,
}

impl StressAllocator {
    fn new() -> Self {
        Self {
            create_count: AtomicU64::new(0),
        }
    }
}

impl Allocator for StressAllocator {
    type Instance = u64;

    async fn allocate(&self) -> Result<u64> {
        let id = self.create_count.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_micros(100)).await;
        Ok(id)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_50_tasks_random_claim_release_invalidate() {
    let pool = Arc::new(Pool::new(StressAllocator::new(), PoolConfig::new(10)).unwrap());
    let success_count = Arc::new(AtomicU64::new(0));
    let mut set = JoinSet::new();

    for task_id in 0..50 {
        let pool = Arc::clone(&pool);
        let success_count = Arc::clone(&success_count);
        set.spawn(async move {
            for i in 0..20 {
                let Ok(handle) = pool.claim_timeout(Duration::from_secs(5)).await else {
                    continue;
                };
                let Some(handle) = handle else { continue };

                let metrics = pool.metrics();
                assert!(metrics.currently_allocated <= 10);

                tokio::time::sleep(Duration::from_micros(50)).await;

                if (task_id + i) % 7 == 0 {
                    handle.invalidate().await;
                } else {
                    handle.release().await;
                }
                success_count.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    while let Some(result) = set.join_next().await {
        result.expect("stress task should not panic");
    }

    assert_eq!(success_count.load(Ordering::SeqCst), 50 * 20);

    let metrics = pool.metrics();
    assert_eq!(metrics.currently_claimed, 0);
    assert_eq!(metrics.currently_waiting, 0);
    assert!(metrics.currently_allocated <= 10);
}
