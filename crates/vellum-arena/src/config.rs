//! Arena configuration parameters.

use vellum_core::ConfigError;

/// Budget applied in front of the engine's allocator.
///
/// The engine's own allocator may grow without bound; the arena refuses
/// requests that would take the live total past `capacity_bytes`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Maximum bytes live at once across all allocations.
    ///
    /// Default: 512 MiB. Must be at least 1 and fit the engine's 32-bit
    /// address space.
    pub capacity_bytes: usize,

    /// Maximum size of a single allocation.
    ///
    /// Default: 256 MiB. Must not exceed `capacity_bytes`.
    pub max_allocation_bytes: usize,
}

impl ArenaConfig {
    /// Default live-byte budget.
    pub const DEFAULT_CAPACITY_BYTES: usize = 512 * 1024 * 1024;

    /// Default per-allocation ceiling.
    pub const DEFAULT_MAX_ALLOCATION_BYTES: usize = 256 * 1024 * 1024;

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_bytes == 0 {
            return Err(ConfigError::Zero {
                field: "capacity_bytes",
            });
        }
        if self.max_allocation_bytes == 0 {
            return Err(ConfigError::Zero {
                field: "max_allocation_bytes",
            });
        }
        if self.capacity_bytes as u64 > u64::from(u32::MAX) {
            return Err(ConfigError::Inconsistent {
                field: "capacity_bytes",
                value: self.capacity_bytes as u64,
                bound_field: "engine address space",
                bound: u64::from(u32::MAX),
            });
        }
        if self.max_allocation_bytes > self.capacity_bytes {
            return Err(ConfigError::Inconsistent {
                field: "max_allocation_bytes",
                value: self.max_allocation_bytes as u64,
                bound_field: "capacity_bytes",
                bound: self.capacity_bytes as u64,
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: Self::DEFAULT_CAPACITY_BYTES,
            max_allocation_bytes: Self::DEFAULT_MAX_ALLOCATION_BYTES,
        }
    }
}
