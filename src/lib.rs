#![warn(missing_docs)]

//! A generic, in-process, concurrency-safe bounded object pool.
//!
//! Clients [`claim`](Pool::claim) a [`PooledObject`], use it, then either let
//! it drop (equivalent to [`release`](PooledObject::release)) or explicitly
//! call [`release`](PooledObject::release) / [`invalidate`](PooledObject::invalidate).
//! Construction, activation, passivation, and destruction of the underlying
//! instance are delegated to a user-supplied [`Allocator`]; idle-instance
//! eviction is delegated to a pluggable [`ExpirationPolicy`].
//!
//! ```no_run
//! use objectpool::{Allocator, Pool, PoolConfig, Result};
//!
//! struct Conn;
//!
//! struct ConnAllocator;
//!
//! impl Allocator for ConnAllocator {
//!     type Instance = Conn;
//!
//!     async fn allocate(&self) -> Result<Conn> {
//!         Ok(Conn)
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let pool = Pool::new(ConnAllocator, PoolConfig::new(10))?;
//! let conn = pool.claim().await?;
//! conn.release().await;
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod policy;
pub mod pool;
mod waiter;

pub use allocator::Allocator;
pub use config::{PoolConfig, Spawner, TokioSpawner};
pub use error::{Error, Result};
pub use handle::PooledObject;
pub use metrics::PoolMetrics;
pub use policy::{ExpirationPolicy, HandleMeta, IdleTimeoutPolicy};
pub use pool::Pool;
