// Basic pooled connection example.
//
// Demonstrates warm core-fill, claim/release, idle-timeout eviction, and
// graceful shutdown against a simulated database connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use objectpool::{Allocator, IdleTimeoutPolicy, Pool, PoolConfig, Result};

/// Simulated database connection.
#[derive(Debug)]
struct DbConnection {
    id: u64,
    query_count: u64,
}

struct DbAllocator {
    next_id: AtomicU64,
}

impl Allocator for DbAllocator {
    type Instance = DbConnection;

    async fn allocate(&self) -> Result<DbConnection> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        println!("  [allocate] new connection #{id}");
        Ok(DbConnection { id, query_count: 0 })
    }

    async fn activate(&self, conn: &mut DbConnection) -> Result<()> {
        println!("  [activate] connection #{} returning to service", conn.id);
        Ok(())
    }

    async fn passivate(&self, conn: &mut DbConnection) -> Result<()> {
        conn.query_count = 0;
        Ok(())
    }

    async fn deallocate(&self, conn: DbConnection) -> Result<()> {
        println!("  [deallocate] closing connection #{}", conn.id);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Basic Pool Example ===\n");

    let config = PoolConfig::new(8)
        .with_core_size(2)
        .with_expiration_policy(Arc::new(IdleTimeoutPolicy::new(Duration::from_secs(120))));

    println!("Pool config: max_size=8, core_size=2, idle_timeout=120s\n");

    let pool = Pool::new(
        DbAllocator {
            next_id: AtomicU64::new(1),
        },
        config,
    )?;
    println!("Pool created, warm core will fill in the background\n");

    // Give the eager core-fill a moment to run.
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("Metrics after core-fill: {:?}\n", pool.metrics());

    println!("Claiming connections...");
    let mut conn1 = pool.claim().await?;
    conn1.query_count += 5;
    println!("  conn #{}: ran {} queries", conn1.id, conn1.query_count);

    let mut conn2 = pool.claim().await?;
    conn2.query_count += 3;
    println!("  conn #{}: ran {} queries", conn2.id, conn2.query_count);

    conn1.release().await;
    conn2.release().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let conn3 = pool.claim().await?;
    println!("  re-claimed connection #{} from idle", conn3.id);
    conn3.release().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("\nPool metrics: {:?}", pool.metrics());

    pool.shutdown().await;
    println!("\nPool shut down cleanly.");

    Ok(())
}
