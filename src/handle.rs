//! The RAII handle clients hold while an instance is claimed.

use std::ops::{Deref, DerefMut};

use crate::allocator::Allocator;
use crate::pool::{Entry, Pool};

/// An exclusively-claimed instance, returned by [`Pool::claim`],
/// [`Pool::claim_timeout`], and [`Pool::claim_cancellable`].
///
/// Opaque beyond [`release`](Self::release), [`invalidate`](Self::invalidate),
/// and dereferencing to the underlying instance. Dropping a `PooledObject`
/// without calling either consuming method returns it to the pool exactly
/// as [`release`](Self::release) would — the same passivate-then-reuse
/// logic simply runs on a background task instead of being awaited inline,
/// following the same RAII shape the pool's own internals use for
/// in-flight, cancelled waiters.
pub struct PooledObject<A: Allocator> {
    pool: Pool<A>,
    entry: Option<Entry<A::Instance>>,
}

impl<A: Allocator> PooledObject<A> {
    pub(crate) fn new(pool: Pool<A>, entry: Entry<A::Instance>) -> Self {
        Self {
            pool,
            entry: Some(entry),
        }
    }

    fn entry(&self) -> &Entry<A::Instance> {
        self.entry
            .as_ref()
            .expect("entry is only None after release/invalidate, which consume self")
    }

    /// The handle's monotonic id, stable for as long as this instance is
    /// claimed.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.entry().id
    }

    /// Return this instance to the pool for reuse (after passivation), or
    /// hand it straight to a waiting claimer if one is already queued.
    pub async fn release(mut self) {
        let entry = self.entry.take().expect("release called once");
        self.pool.release_entry(entry).await;
    }

    /// Destroy this instance instead of returning it to the pool, freeing
    /// its slot for a fresh allocation.
    pub async fn invalidate(mut self) {
        let entry = self.entry.take().expect("invalidate called once");
        self.pool.invalidate_entry(entry).await;
    }
}

impl<A: Allocator> Deref for PooledObject<A> {
    type Target = A::Instance;

    fn deref(&self) -> &Self::Target {
        &self.entry().instance
    }
}

impl<A: Allocator> DerefMut for PooledObject<A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self
            .entry
            .as_mut()
            .expect("entry is only None after release/invalidate, which consume self")
            .instance
    }
}

impl<A> std::fmt::Debug for PooledObject<A>
where
    A: Allocator,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledObject")
            .field("id", &self.entry.as_ref().map(|e| e.id))
            .finish_non_exhaustive()
    }
}

impl<A: Allocator> Drop for PooledObject<A> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.pool.spawn_release(entry);
        }
    }
}
