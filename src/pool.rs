//! The pool core: claim/release engine, eviction worker, shutdown
//! coordinator.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::allocator::Allocator;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::handle::PooledObject;
use crate::metrics::PoolMetrics;
use crate::policy::HandleMeta;
use crate::waiter::{Outcome, WaiterHandle};

/// One allocated instance together with the bookkeeping the pool needs to
/// make lifecycle and eviction decisions about it.
pub(crate) struct Entry<I> {
    pub(crate) id: u64,
    pub(crate) instance: I,
    created_at: Instant,
    last_claimed_at: Instant,
    last_released_at: Option<Instant>,
    claim_count: u64,
}

impl<I> Entry<I> {
    fn meta(&self) -> HandleMeta {
        HandleMeta {
            created_at: self.created_at,
            last_claimed_at: self.last_claimed_at,
            last_released_at: self.last_released_at,
            claim_count: self.claim_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Running,
    ShuttingDown,
    Terminated,
}

struct PoolState<I> {
    /// Idle instances, LRU at the front, MRU at the back: claims pop from
    /// the back (warmest first), eviction sweeps from the front.
    idle: VecDeque<Entry<I>>,
    /// Strict FIFO: new waiters push to the back, hand-offs pop the front.
    waiters: VecDeque<Arc<WaiterHandle<I>>>,
    claimed_count: usize,
    /// Slots not yet allocated. Decremented the instant the pool commits to
    /// constructing a new instance (claim-time fresh allocation or eager
    /// core-fill) and incremented only once that instance is destroyed —
    /// under the same lock as everything else, so `idle + claimed` can
    /// never be observed exceeding `max_size`, even transiently.
    remaining_capacity: usize,
    total_allocated: u64,
    total_claimed: u64,
    lifecycle: Lifecycle,
}

impl<I> PoolState<I> {
    fn currently_allocated(&self) -> usize {
        self.idle.len() + self.claimed_count
    }
}

struct PoolInner<A: Allocator> {
    allocator: A,
    config: PoolConfig,
    state: Mutex<PoolState<A::Instance>>,
    next_id: AtomicU64,
    shutdown_notify: Notify,
}

/// A bounded, concurrency-safe object pool.
///
/// Cheaply cloneable: `Pool<A>` is a thin handle around a shared, reference
/// counted inner state, following the same shape as the underlying
/// instances' own handles ([`PooledObject`]).
pub struct Pool<A: Allocator> {
    inner: Arc<PoolInner<A>>,
}

impl<A: Allocator> Clone for Pool<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Allocator> std::fmt::Debug for Pool<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

/// Outcome of the fast (non-waiting) portion of the claim algorithm.
enum FastClaim<I> {
    /// A freshly allocated instance — no activation required, construction
    /// is the initial activation.
    Fresh(Entry<I>),
    /// An instance pulled from the idle set — activation required.
    FromIdle(Entry<I>),
    /// No idle instance and no spare capacity; the caller has already been
    /// pushed onto the waiter queue (in the same lock acquisition that made
    /// this decision) and must now wait on this handle.
    MustWait(Arc<WaiterHandle<I>>),
}

/// Decision made while holding the lock, before any callback runs.
enum FastClaimDecision<I> {
    FromIdle(Entry<I>),
    Reserved,
    MustWait(Arc<WaiterHandle<I>>),
}

impl<A: Allocator> Pool<A> {
    /// Construct a new pool. Fails if `config` is invalid (see
    /// [`PoolConfig::validate`]).
    pub fn new(allocator: A, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let max_size = config.max_size;
        let inner = Arc::new(PoolInner {
            allocator,
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                waiters: VecDeque::new(),
                claimed_count: 0,
                remaining_capacity: max_size,
                total_allocated: 0,
                total_claimed: 0,
                lifecycle: Lifecycle::Running,
            }),
            next_id: AtomicU64::new(1),
            shutdown_notify: Notify::new(),
        });
        let pool = Self { inner };
        if pool.inner.config.core_size > 0 || pool.inner.config.expiration_policy.is_some() {
            pool.spawn_maintenance_worker();
        }
        tracing::info!(
            max_size = pool.inner.config.max_size,
            core_size = pool.inner.config.core_size,
            "pool created"
        );
        Ok(pool)
    }

    /// Block until a handle becomes available or the pool terminates.
    pub async fn claim(&self) -> Result<PooledObject<A>> {
        loop {
            match self.try_fast_claim().await? {
                FastClaim::Fresh(entry) => {
                    tracing::debug!(handle_id = entry.id, "claimed fresh instance");
                    return Ok(PooledObject::new(self.clone(), entry));
                }
                FastClaim::FromIdle(entry) => {
                    if let Some(entry) = self.activate(entry).await {
                        tracing::debug!(handle_id = entry.id, "claimed idle instance");
                        return Ok(PooledObject::new(self.clone(), entry));
                    }
                    continue;
                }
                FastClaim::MustWait(waiter) => match self.wait_for_handoff(waiter).await? {
                    Some(entry) => {
                        tracing::debug!(handle_id = entry.id, "claimed via waiter hand-off");
                        return Ok(PooledObject::new(self.clone(), entry));
                    }
                    None => continue,
                },
            }
        }
    }

    /// As [`claim`](Self::claim), but returns `Ok(None)` instead of blocking
    /// past `timeout`. Matches the design's "timeout is a sentinel, not an
    /// exception": this never returns `Err` for a timed-out wait.
    ///
    /// Cancel-safe by construction: `tokio::time::timeout` simply drops the
    /// inner `claim()` future when time runs out, and that future's waiter
    /// bookkeeping (see [`WaiterQueueGuard`]) is itself drop-safe.
    pub async fn claim_timeout(&self, timeout: Duration) -> Result<Option<PooledObject<A>>> {
        match tokio::time::timeout(timeout, self.claim()).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => {
                tracing::warn!(?timeout, "timed claim expired");
                Ok(None)
            }
        }
    }

    /// As [`claim`](Self::claim), but also resolves to
    /// [`Error::Interrupted`] if `token` is cancelled first. Rust's
    /// analogue of the spec's "thread interrupted during wait" case.
    pub async fn claim_cancellable(&self, token: &CancellationToken) -> Result<PooledObject<A>> {
        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Interrupted),
            result = self.claim() => result,
        }
    }

    /// A consistent snapshot of the pool's counters.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let state = self.inner.state.lock();
        PoolMetrics {
            currently_claimed: state.claimed_count,
            currently_waiting: state.waiters.len(),
            core_size: self.inner.config.core_size,
            max_size: self.inner.config.max_size,
            currently_allocated: state.currently_allocated(),
            total_allocated: state.total_allocated,
            total_claimed: state.total_claimed,
        }
    }

    /// Begin graceful shutdown. Idempotent: concurrent or repeated calls all
    /// resolve once the pool reaches `Terminated`.
    pub async fn shutdown(&self) {
        let just_started = {
            let mut state = self.inner.state.lock();
            if state.lifecycle == Lifecycle::Running {
                state.lifecycle = Lifecycle::ShuttingDown;
                true
            } else {
                false
            }
        };

        if just_started {
            tracing::info!(metrics = ?self.metrics(), "pool shutdown initiated");

            let waiters: Vec<_> = {
                let mut state = self.inner.state.lock();
                std::mem::take(&mut state.waiters).into_iter().collect()
            };
            for waiter in waiters {
                // Retrying the claim algorithm under a non-Running state
                // fails with `PoolNotRunning`; reusing the slot-free wake
                // reason is sufficient, no separate outcome is needed.
                waiter.fulfill_slot_free();
            }

            let idle: Vec<_> = {
                let mut state = self.inner.state.lock();
                std::mem::take(&mut state.idle).into_iter().collect()
            };
            for entry in idle {
                self.destroy(entry.instance).await;
            }

            self.maybe_complete_shutdown();
        }

        loop {
            let notified = self.inner.shutdown_notify.notified();
            {
                let state = self.inner.state.lock();
                if state.lifecycle == Lifecycle::Terminated {
                    break;
                }
            }
            notified.await;
        }
    }

    // -- internal claim helpers -------------------------------------------------

    async fn try_fast_claim(&self) -> Result<FastClaim<A::Instance>> {
        // The waiter, if one is needed, is built before the lock is taken
        // (it only captures an `Arc` clone) so that registering it onto
        // `state.waiters` happens in the *same* critical section as the
        // decision that no idle instance and no spare capacity exist.
        // Deciding "must wait" and enqueuing as a waiter as two separate
        // lock acquisitions would open a window where a concurrent release
        // places a handle in idle (finding the waiter queue still empty)
        // that never gets handed to anyone — violating invariant 4 (no
        // waiter may coexist with a non-empty idle set).
        let inner = Arc::clone(&self.inner);
        let waiter = WaiterHandle::new(Box::new(move |entry| {
            let pool = Pool {
                inner: Arc::clone(&inner),
            };
            pool.spawn_release(entry);
        }));

        let decision = {
            let mut state = self.inner.state.lock();
            if state.lifecycle != Lifecycle::Running {
                return Err(Error::PoolNotRunning);
            }
            if let Some(mut entry) = state.idle.pop_back() {
                state.claimed_count += 1;
                state.total_claimed += 1;
                entry.claim_count += 1;
                entry.last_claimed_at = Instant::now();
                FastClaimDecision::FromIdle(entry)
            } else if state.remaining_capacity > 0 {
                state.remaining_capacity -= 1;
                FastClaimDecision::Reserved
            } else {
                state.waiters.push_back(Arc::clone(&waiter));
                FastClaimDecision::MustWait(waiter)
            }
        };

        match decision {
            FastClaimDecision::FromIdle(entry) => Ok(FastClaim::FromIdle(entry)),
            FastClaimDecision::MustWait(waiter) => Ok(FastClaim::MustWait(waiter)),
            FastClaimDecision::Reserved => {
                // Holds the reservation made above. If the allocate() await
                // is dropped before resolving (claim_timeout/claim_cancellable
                // cancelling the in-flight claim), the guard's Drop restores
                // remaining_capacity and wakes a waiter instead of leaking
                // the slot permanently below max_size.
                let reservation = ReservationGuard {
                    pool: self,
                    active: true,
                };
                match self.inner.allocator.allocate().await {
                    Ok(instance) => {
                        reservation.disarm();
                        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                        let now = Instant::now();
                        let entry = Entry {
                            id,
                            instance,
                            created_at: now,
                            last_claimed_at: now,
                            last_released_at: None,
                            claim_count: 1,
                        };
                        let mut state = self.inner.state.lock();
                        state.total_allocated += 1;
                        state.claimed_count += 1;
                        state.total_claimed += 1;
                        Ok(FastClaim::Fresh(entry))
                    }
                    Err(err) => Err(Error::allocation_failed(err)),
                }
            }
        }
    }

    /// Await either a direct hand-off or a slot-free retry signal for a
    /// waiter already registered on the queue by [`try_fast_claim`].
    async fn wait_for_handoff(
        &self,
        waiter: Arc<WaiterHandle<A::Instance>>,
    ) -> Result<Option<Entry<A::Instance>>> {
        let guard = WaiterQueueGuard {
            pool: self,
            waiter: &waiter,
            resolved: false,
        };
        let outcome = waiter.wait().await;
        guard.disarm();

        match outcome {
            Outcome::Handle(mut entry) => {
                entry.claim_count += 1;
                entry.last_claimed_at = Instant::now();
                {
                    let mut state = self.inner.state.lock();
                    state.total_claimed += 1;
                }
                Ok(self.activate(entry).await)
            }
            Outcome::Pending => unreachable!("wait() never returns Pending"),
            Outcome::SlotFree => {
                let lifecycle = self.inner.state.lock().lifecycle;
                if lifecycle != Lifecycle::Running {
                    return Err(Error::PoolNotRunning);
                }
                Ok(None)
            }
        }
    }

    /// Apply `activate` (the reuse hook). On failure, best-effort destroy
    /// and report failure so the caller retries the claim loop.
    async fn activate(&self, entry: Entry<A::Instance>) -> Option<Entry<A::Instance>> {
        // `entry` is already counted in claimed_count (popped from idle, or
        // handed off by a waiter). If the activate() await is dropped before
        // resolving, the guard's Drop spawns the same invalidate path used
        // by a normal release/invalidate, so the instance and its slot are
        // never silently dropped along with the cancelled future.
        let mut guard = ActivationGuard {
            pool: self,
            entry: Some(entry),
        };
        let result = self
            .inner
            .allocator
            .activate(&mut guard.instance_mut().instance)
            .await;
        let entry = guard.take();

        match result {
            Ok(()) => Some(entry),
            Err(err) => {
                tracing::warn!(
                    handle_id = entry.id,
                    error = %err,
                    "activation failed, destroying instance"
                );
                {
                    let mut state = self.inner.state.lock();
                    state.claimed_count -= 1;
                }
                self.destroy(entry.instance).await;
                None
            }
        }
    }

    // -- release / invalidate ----------------------------------------------------

    pub(crate) async fn release_entry(&self, entry: Entry<A::Instance>) {
        let running = self.inner.state.lock().lifecycle == Lifecycle::Running;
        if !running {
            {
                let mut state = self.inner.state.lock();
                state.claimed_count -= 1;
            }
            self.destroy(entry.instance).await;
            self.maybe_complete_shutdown();
            return;
        }
        self.passivate_and_place(entry).await;
    }

    async fn passivate_and_place(&self, mut entry: Entry<A::Instance>) {
        match self.inner.allocator.passivate(&mut entry.instance).await {
            Ok(()) => {
                entry.last_released_at = Some(Instant::now());
                let waiter = {
                    let mut state = self.inner.state.lock();
                    state.waiters.pop_front()
                };
                if let Some(waiter) = waiter {
                    tracing::debug!(
                        handle_id = entry.id,
                        "handing off released instance to waiter"
                    );
                    waiter.fulfill_with_handle(entry);
                } else {
                    tracing::debug!(handle_id = entry.id, "released instance returned to idle");
                    let mut state = self.inner.state.lock();
                    state.claimed_count -= 1;
                    state.idle.push_back(entry);
                }
            }
            Err(err) => {
                tracing::warn!(
                    handle_id = entry.id,
                    error = %err,
                    "passivate failed, destroying instance"
                );
                {
                    let mut state = self.inner.state.lock();
                    state.claimed_count -= 1;
                }
                self.destroy(entry.instance).await;
            }
        }
    }

    pub(crate) async fn invalidate_entry(&self, entry: Entry<A::Instance>) {
        {
            let mut state = self.inner.state.lock();
            state.claimed_count -= 1;
        }
        self.destroy(entry.instance).await;
        self.maybe_complete_shutdown();
    }

    /// Run `Allocator::deallocate` outside the lock, then record the freed
    /// capacity and wake one waiter (if any) to retry the claim algorithm.
    async fn destroy(&self, instance: A::Instance) {
        if let Err(err) = self.inner.allocator.deallocate(instance).await {
            tracing::warn!(error = %err, "deallocate failed; instance dropped anyway");
        }
        let waiter = {
            let mut state = self.inner.state.lock();
            state.remaining_capacity += 1;
            state.waiters.pop_front()
        };
        if let Some(waiter) = waiter {
            waiter.fulfill_slot_free();
        }
    }

    fn maybe_complete_shutdown(&self) {
        let should_notify = {
            let mut state = self.inner.state.lock();
            if state.lifecycle == Lifecycle::ShuttingDown && state.claimed_count == 0 {
                state.lifecycle = Lifecycle::Terminated;
                true
            } else {
                false
            }
        };
        if should_notify {
            tracing::info!("pool terminated");
            self.inner.shutdown_notify.notify_waiters();
        }
    }

    pub(crate) fn spawn_release(&self, entry: Entry<A::Instance>) {
        let pool = self.clone();
        self.inner.config.spawner.spawn(Box::pin(async move {
            pool.release_entry(entry).await;
        }));
    }

    pub(crate) fn spawn_invalidate(&self, entry: Entry<A::Instance>) {
        let pool = self.clone();
        self.inner.config.spawner.spawn(Box::pin(async move {
            pool.invalidate_entry(entry).await;
        }));
    }

    // -- maintenance worker (eviction + core-fill) -------------------------------

    fn spawn_maintenance_worker(&self) {
        let pool = self.clone();
        self.inner.config.spawner.spawn(Box::pin(async move {
            pool.maintenance_loop().await;
        }));
    }

    async fn maintenance_loop(self) {
        let interval = self
            .inner
            .config
            .expiration_policy
            .as_ref()
            .map_or(Duration::from_secs(1), |p| p.next_check_delay());

        // Eager core-fill happens once up front, before the first sweep
        // interval elapses, so invariant 2 (`currentlyAllocated >= core_size`
        // while RUNNING) holds shortly after construction rather than only
        // after the worker's first scheduled tick.
        self.fill_core().await;

        loop {
            tokio::time::sleep(interval).await;
            if self.inner.state.lock().lifecycle == Lifecycle::Terminated {
                tracing::trace!("maintenance worker exiting: pool terminated");
                return;
            }
            self.sweep_expired().await;
            self.fill_core().await;
        }
    }

    async fn sweep_expired(&self) {
        let Some(policy) = self.inner.config.expiration_policy.clone() else {
            return;
        };
        let now = Instant::now();
        let expired: Vec<_> = {
            let mut state = self.inner.state.lock();
            if state.lifecycle != Lifecycle::Running {
                return;
            }
            let mut keep = VecDeque::with_capacity(state.idle.len());
            let mut expired = Vec::new();
            while let Some(entry) = state.idle.pop_front() {
                if policy.should_evict(&entry.meta(), now) {
                    expired.push(entry);
                } else {
                    keep.push_back(entry);
                }
            }
            state.idle = keep;
            expired
        };
        for entry in expired {
            tracing::debug!(handle_id = entry.id, "evicting expired idle instance");
            self.destroy(entry.instance).await;
        }
    }

    async fn fill_core(&self) {
        loop {
            let should_fill = {
                let mut state = self.inner.state.lock();
                if state.lifecycle != Lifecycle::Running {
                    return;
                }
                if state.currently_allocated() >= self.inner.config.core_size
                    || state.remaining_capacity == 0
                {
                    false
                } else {
                    state.remaining_capacity -= 1;
                    true
                }
            };
            if !should_fill {
                return;
            }
            match self.inner.allocator.allocate().await {
                Ok(instance) => {
                    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                    let now = Instant::now();
                    let entry = Entry {
                        id,
                        instance,
                        created_at: now,
                        last_claimed_at: now,
                        last_released_at: None,
                        claim_count: 0,
                    };
                    let mut state = self.inner.state.lock();
                    state.total_allocated += 1;
                    state.idle.push_back(entry);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "core-fill allocation failed");
                    let mut state = self.inner.state.lock();
                    state.remaining_capacity += 1;
                    return;
                }
            }
        }
    }
}

/// Removes a still-queued waiter from the pool's waiter queue if the
/// claiming future is dropped before a hand-off occurs. If a hand-off has
/// already happened, `WaiterHandle::drop` (triggered once every `Arc` to it
/// — including the one this guard would otherwise keep alive — goes away)
/// reclaims the handed-off instance instead.
struct WaiterQueueGuard<'a, A: Allocator> {
    pool: &'a Pool<A>,
    waiter: &'a Arc<WaiterHandle<A::Instance>>,
    resolved: bool,
}

impl<A: Allocator> WaiterQueueGuard<'_, A> {
    /// Called once `wait()` has returned an outcome: no queue cleanup is
    /// needed, the waiter was already popped (hand-off) or is about to be
    /// ignored (slot-free, handled by the caller).
    fn disarm(mut self) {
        self.resolved = true;
    }
}

impl<A: Allocator> Drop for WaiterQueueGuard<'_, A> {
    fn drop(&mut self) {
        if !self.resolved {
            let mut state = self.pool.inner.state.lock();
            state.waiters.retain(|w| !Arc::ptr_eq(w, self.waiter));
        }
    }
}

/// Restores a capacity reservation made by `try_fast_claim` if the
/// subsequent `allocate()` await is dropped before resolving, instead of
/// completing normally through `disarm()`. Without this, a cancelled claim
/// racing a slow allocate would shrink the pool below `max_size` forever.
struct ReservationGuard<'a, A: Allocator> {
    pool: &'a Pool<A>,
    active: bool,
}

impl<A: Allocator> ReservationGuard<'_, A> {
    /// Called once `allocate()` has resolved successfully: the reservation
    /// is now a real, claimed instance, not a slot to give back.
    fn disarm(mut self) {
        self.active = false;
    }
}

impl<A: Allocator> Drop for ReservationGuard<'_, A> {
    fn drop(&mut self) {
        if self.active {
            let waiter = {
                let mut state = self.pool.inner.state.lock();
                state.remaining_capacity += 1;
                state.waiters.pop_front()
            };
            if let Some(waiter) = waiter {
                waiter.fulfill_slot_free();
            }
        }
    }
}

/// Keeps an already-claimed `Entry` cancel-safe across the `activate()`
/// await. `Entry` itself has no `Drop` impl, so without this guard a
/// cancelled claim future would drop a live instance mid-activation with
/// no `deallocate` call and no `claimed_count` decrement. On drop without
/// `take()`, spawns the same invalidate path a normal release/invalidate
/// uses.
struct ActivationGuard<'a, A: Allocator> {
    pool: &'a Pool<A>,
    entry: Option<Entry<A::Instance>>,
}

impl<A: Allocator> ActivationGuard<'_, A> {
    fn instance_mut(&mut self) -> &mut Entry<A::Instance> {
        self.entry.as_mut().expect("entry present until taken")
    }

    /// Called once `activate()` has resolved (success or failure): the
    /// caller takes ownership back to run its own handling.
    fn take(mut self) -> Entry<A::Instance> {
        self.entry.take().expect("entry present until taken")
    }
}

impl<A: Allocator> Drop for ActivationGuard<'_, A> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.pool.spawn_invalidate(entry);
        }
    }
}
