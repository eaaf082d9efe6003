//! Expiration policy contract and the built-in idle-timeout policy.

use std::time::{Duration, Instant};

/// Read-only view of a handle's bookkeeping, passed to an
/// [`ExpirationPolicy`] so it can decide whether the handle should be
/// evicted.
///
/// Policies are meant to be pure functions of this data; side effects
/// (mutating shared state, performing I/O) are undefined behavior for a
/// policy, not a supported extension point.
#[derive(Debug, Clone, Copy)]
pub struct HandleMeta {
    /// When the underlying instance was first allocated.
    pub created_at: Instant,
    /// When the instance was last activated for hand-out (the most recent
    /// `allocate` or `activate` call, whichever is more recent).
    pub last_claimed_at: Instant,
    /// When the instance was last returned via release.
    pub last_released_at: Option<Instant>,
    /// Number of times this handle has been successfully claimed.
    pub claim_count: u64,
}

/// Decides whether an idle handle should be evicted by the background
/// sweep.
pub trait ExpirationPolicy: Send + Sync + 'static {
    /// Return `true` if the handle described by `meta` should be destroyed.
    fn should_evict(&self, meta: &HandleMeta, now: Instant) -> bool;

    /// How long the eviction worker should sleep between sweeps.
    ///
    /// Default: 1 second, matching the canonical default described for the
    /// eviction worker.
    fn next_check_delay(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// The canonical built-in policy: evict an idle handle once it has gone
/// unclaimed for longer than `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct IdleTimeoutPolicy {
    timeout: Duration,
    check_interval: Duration,
}

impl IdleTimeoutPolicy {
    /// Evict handles idle for longer than `timeout`, sweeping at the
    /// default 1-second interval.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            check_interval: Duration::from_secs(1),
        }
    }

    /// Override the sweep interval (default: 1 second).
    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }
}

impl ExpirationPolicy for IdleTimeoutPolicy {
    fn should_evict(&self, meta: &HandleMeta, now: Instant) -> bool {
        now.duration_since(meta.last_claimed_at) > self.timeout
    }

    fn next_check_delay(&self) -> Duration {
        self.check_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_claimed(age: Duration) -> (HandleMeta, Instant) {
        let now = Instant::now();
        let meta = HandleMeta {
            created_at: now,
            last_claimed_at: now,
            last_released_at: None,
            claim_count: 1,
        };
        (meta, now + age)
    }

    #[test]
    fn evicts_once_timeout_elapsed() {
        let policy = IdleTimeoutPolicy::new(Duration::from_millis(100));
        let (meta, future) = meta_claimed(Duration::from_millis(200));
        assert!(policy.should_evict(&meta, future));
    }

    #[test]
    fn does_not_evict_before_timeout() {
        let policy = IdleTimeoutPolicy::new(Duration::from_secs(10));
        let (meta, future) = meta_claimed(Duration::from_millis(5));
        assert!(!policy.should_evict(&meta, future));
    }

    #[test]
    fn default_check_delay_is_one_second() {
        let policy = IdleTimeoutPolicy::new(Duration::from_secs(1));
        assert_eq!(policy.next_check_delay(), Duration::from_secs(1));
    }
}
