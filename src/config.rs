//! Pool configuration.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::policy::ExpirationPolicy;

/// Schedules the pool's background eviction/shutdown-draining work.
///
/// Rust analogue of a thread factory: since the pool's background worker is
/// an async task rather than an OS thread, a `Spawner` is just a place to
/// hand that task to whatever executor the embedder wants it to run on.
/// Defaults to [`TokioSpawner`], which calls `tokio::spawn`.
pub trait Spawner: Send + Sync + 'static {
    /// Schedule `fut` to run to completion in the background.
    fn spawn(&self, fut: Pin<Box<dyn Future<Output = ()> + Send>>);
}

/// Default [`Spawner`] backed by `tokio::spawn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, fut: Pin<Box<dyn Future<Output = ()> + Send>>) {
        tokio::spawn(fut);
    }
}

/// Pool configuration.
///
/// Only `max_size` is required; everything else defaults to "no extra
/// behavior" (no warm core, no eviction, the default Tokio spawner).
pub struct PoolConfig {
    /// Upper bound on concurrently-allocated instances. Must be `>= 1`.
    pub max_size: usize,
    /// Lower bound on allocated instances maintained while running.
    /// Must be `<= max_size`. Default: `0`.
    pub core_size: usize,
    /// Eviction policy for idle instances. `None` disables the background
    /// eviction worker entirely.
    pub expiration_policy: Option<Arc<dyn ExpirationPolicy>>,
    /// Schedules the background eviction/shutdown worker task.
    pub spawner: Arc<dyn Spawner>,
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("max_size", &self.max_size)
            .field("core_size", &self.core_size)
            .field("expiration_policy", &self.expiration_policy.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 1,
            core_size: 0,
            expiration_policy: None,
            spawner: Arc::new(TokioSpawner),
        }
    }
}

impl PoolConfig {
    /// Start from the defaults with the given `max_size`.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Default::default()
        }
    }

    /// Set the warm core size.
    #[must_use]
    pub fn with_core_size(mut self, core_size: usize) -> Self {
        self.core_size = core_size;
        self
    }

    /// Install an eviction policy, enabling the background eviction worker.
    #[must_use]
    pub fn with_expiration_policy(mut self, policy: Arc<dyn ExpirationPolicy>) -> Self {
        self.expiration_policy = Some(policy);
        self
    }

    /// Override the background-task spawner.
    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Reject configurations that cannot be satisfied: zero max size, or a
    /// core size larger than the max.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::configuration("max_size must be >= 1"));
        }
        if self.core_size > self.max_size {
            return Err(Error::configuration("core_size must be <= max_size"));
        }
        Ok(())
    }
}
