//! Per-waiter queue slot used by the claim/release engine.
//!
//! A bare semaphore cannot express the pool's exact hand-off semantics: a
//! release must be able to give a *specific* instance to *exactly* the head
//! waiter, while a destruction that merely frees a slot must instead tell
//! the head waiter "a slot is free, go retry the normal claim path." Two
//! distinct wake reasons need two distinct outcomes, so each waiter gets its
//! own slot: a `Notify` to wake it and a small mutex-guarded cell recording
//! which of the two happened.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::pool::Entry;

/// What a waiter was woken up for.
pub(crate) enum Outcome<I> {
    /// Still waiting; nothing has happened yet.
    Pending,
    /// A release handed this specific instance directly to the waiter. It
    /// still needs activation before hand-out, exactly like an idle-set hit.
    Handle(Entry<I>),
    /// A slot became free (a destruction completed); the waiter should
    /// retry the claim algorithm from the top rather than receive an
    /// instance directly.
    SlotFree,
}

/// One entry in the pool's FIFO waiter queue.
///
/// If a waiter is dropped (its claim future was cancelled, or a timeout
/// elapsed) after it was already handed an instance but before it could act
/// on that hand-off, `reclaim` is invoked with that instance so it is
/// returned to the pool instead of silently dropped. This is what makes
/// claim cancellation safe to race against a concurrent release.
pub(crate) struct WaiterHandle<I> {
    notify: Notify,
    outcome: Mutex<Outcome<I>>,
    reclaim: Box<dyn Fn(Entry<I>) + Send + Sync>,
}

impl<I> WaiterHandle<I> {
    pub(crate) fn new(reclaim: Box<dyn Fn(Entry<I>) + Send + Sync>) -> Arc<Self> {
        Arc::new(Self {
            notify: Notify::new(),
            outcome: Mutex::new(Outcome::Pending),
            reclaim,
        })
    }

    /// Hand `entry` directly to this waiter (the release hand-off path).
    pub(crate) fn fulfill_with_handle(&self, entry: Entry<I>) {
        *self.outcome.lock() = Outcome::Handle(entry);
        self.notify.notify_one();
    }

    /// Signal that some slot became free; the waiter should retry from the
    /// top of the claim algorithm.
    pub(crate) fn fulfill_slot_free(&self) {
        *self.outcome.lock() = Outcome::SlotFree;
        self.notify.notify_one();
    }

    /// Wait for an outcome, consuming whichever is posted.
    ///
    /// Race-free by construction: `notify.notified()` is created *before*
    /// the outcome is checked, so a `fulfill_*` call that lands between the
    /// check and the `.await` is not missed — the permit `Notify` stores is
    /// captured by the already-created future regardless of timing.
    pub(crate) async fn wait(&self) -> Outcome<I> {
        loop {
            let notified = self.notify.notified();
            {
                let mut guard = self.outcome.lock();
                if !matches!(&*guard, Outcome::Pending) {
                    return std::mem::replace(&mut *guard, Outcome::Pending);
                }
            }
            notified.await;
        }
    }
}

impl<I> Drop for WaiterHandle<I> {
    fn drop(&mut self) {
        let outcome = std::mem::replace(&mut *self.outcome.lock(), Outcome::Pending);
        if let Outcome::Handle(entry) = outcome {
            (self.reclaim)(entry);
        }
    }
}
