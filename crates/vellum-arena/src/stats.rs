//! Arena traffic counters.

/// A snapshot of arena usage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Successful allocations since creation.
    pub allocations: u64,
    /// Frees since creation.
    pub frees: u64,
    /// Requests refused (budget, ceiling, or engine null).
    pub failed_allocations: u64,
    /// Ranges currently live.
    pub live_allocations: usize,
    /// Bytes currently live.
    pub live_bytes: usize,
    /// High-water mark of `live_bytes`.
    pub peak_bytes: usize,
}

impl ArenaStats {
    /// Whether every allocation has been freed.
    pub fn is_balanced(&self) -> bool {
        self.live_allocations == 0 && self.allocations == self.frees
    }
}
