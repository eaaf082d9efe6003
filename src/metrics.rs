//! Point-in-time snapshot of pool counters.

/// A consistent snapshot of a pool's counters, taken under its internal
/// lock at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetrics {
    /// Number of handles currently claimed (in use by some caller).
    pub currently_claimed: usize,
    /// Number of callers currently blocked in `claim`/`claim_timeout`.
    pub currently_waiting: usize,
    /// Configured warm-core size.
    pub core_size: usize,
    /// Configured maximum pool size.
    pub max_size: usize,
    /// Number of allocated instances, idle or claimed (`idle + claimed`).
    pub currently_allocated: usize,
    /// Running total of instances ever constructed via `Allocator::allocate`.
    pub total_allocated: u64,
    /// Running total of successful claims ever returned.
    pub total_claimed: u64,
}
