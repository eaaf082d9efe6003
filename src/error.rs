//! Error types returned by the pool.
//!
//! A timed claim that simply runs out of time is *not* represented here: per
//! the pool's design, a timeout is a sentinel `None` return from
//! [`crate::Pool::claim_timeout`], not an exception.

use std::error::Error as StdError;

/// Boxed source error from a user-supplied [`crate::Allocator`] callback.
type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors produced by pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `max_size` was zero, or `core_size` exceeded `max_size`.
    #[error("invalid pool configuration: {reason}")]
    Configuration {
        /// Human-readable description of the violated constraint.
        reason: String,
    },

    /// A claim or `shutdown()`-triggered drain was attempted while the pool
    /// was not `Running` (it is shutting down or already terminated).
    #[error("pool is not running")]
    PoolNotRunning,

    /// `Allocator::allocate` failed while satisfying a claim or during eager
    /// core-fill. The reserved capacity slot has already been released by
    /// the time this error is observed.
    #[error("allocator failed to construct a new instance")]
    AllocationFailed(#[source] BoxError),

    /// The claiming task was cancelled (its future was dropped) while
    /// waiting for a handle. Rust's analogue of the spec's thread-interrupt
    /// case: there is no separate signal to deliver, the future is simply
    /// not polled to completion.
    #[error("claim was interrupted before a handle became available")]
    Interrupted,
}

/// Convenience alias used throughout the crate's public API.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn allocation_failed<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::AllocationFailed(Box::new(source))
    }
}
