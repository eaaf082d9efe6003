//! The user-supplied lifecycle contract for a pool's underlying resource.

use std::future::Future;

use crate::error::Result;

/// Constructs, revives, rests, and tears down the instances a [`crate::Pool`]
/// manages.
///
/// Only [`allocate`](Allocator::allocate) is required. The other three hooks
/// default to no-ops, matching a resource that needs no reset-before-reuse
/// step (e.g. a plain in-memory buffer) — an allocator for anything
/// stateful (a connection, a file handle) will usually override
/// [`activate`](Allocator::activate) and [`passivate`](Allocator::passivate)
/// at least.
///
/// Implementations are plain callback bundles, not trait objects: the pool
/// is generic over a single concrete `Allocator`, so these methods use
/// native `impl Future` return types rather than `#[async_trait]`.
pub trait Allocator: Send + Sync + 'static {
    /// The instance type this allocator produces and the pool manages.
    type Instance: Send + 'static;

    /// Construct a brand-new, ready-to-use instance.
    ///
    /// Called on the first hand-out of a handle and during eager core-fill.
    /// May fail; a failure here never leaves a capacity slot reserved (see
    /// the pool's claim algorithm).
    fn allocate(&self) -> impl Future<Output = Result<Self::Instance>> + Send;

    /// Bring an idle instance back to active use immediately before it is
    /// handed out to a claimer.
    ///
    /// Not called on the very first hand-out after [`allocate`](Self::allocate)
    /// — construction *is* the initial activation. Default: no-op success.
    fn activate(
        &self,
        _instance: &mut Self::Instance,
    ) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Put an instance to rest immediately after release, before it is
    /// returned to the idle set (or handed directly to a waiter).
    ///
    /// Default: no-op success.
    fn passivate(
        &self,
        _instance: &mut Self::Instance,
    ) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Permanently release the resources backing an instance.
    ///
    /// Called on invalidate, eviction, or shutdown. Failures here are never
    /// surfaced to a caller (see the pool's error handling design) — they
    /// are logged and the instance is forcibly dropped regardless.
    /// Default: no-op success.
    fn deallocate(&self, instance: Self::Instance) -> impl Future<Output = Result<()>> + Send {
        async {
            drop(instance);
            Ok(())
        }
    }
}
