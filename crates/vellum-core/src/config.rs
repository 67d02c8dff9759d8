//! Render limits and configuration errors.
//!
//! Every configuration struct in the workspace validates itself with a
//! `validate()` method returning [`ConfigError`]; constructors call it
//! before touching the engine.

use thiserror::Error;

/// Errors detected while validating a configuration struct.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A limit that must be at least one was zero.
    #[error("{field} must be at least 1")]
    Zero {
        /// Name of the offending field.
        field: &'static str,
    },
    /// Two limits contradict each other.
    #[error("{field} ({value}) exceeds {bound_field} ({bound})")]
    Inconsistent {
        /// Name of the field that is too large.
        field: &'static str,
        /// Its value.
        value: u64,
        /// Name of the field bounding it.
        bound_field: &'static str,
        /// The bounding value.
        bound: u64,
    },
    /// A background thread could not be spawned.
    #[error("thread spawn failed: {reason}")]
    ThreadSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
}

/// Upper bounds applied to every render request before allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderLimits {
    /// Maximum bitmap width in pixels. Default: 16384.
    pub max_width: u32,
    /// Maximum bitmap height in pixels. Default: 16384.
    pub max_height: u32,
    /// Maximum `width * height`. Default: 2^26 (256 MiB of BGRA).
    pub max_pixels: u64,
}

impl RenderLimits {
    /// Default per-axis maximum.
    pub const DEFAULT_MAX_EDGE: u32 = 16_384;

    /// Default pixel budget.
    pub const DEFAULT_MAX_PIXELS: u64 = 1 << 26;

    /// Validate the limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_width == 0 {
            return Err(ConfigError::Zero { field: "max_width" });
        }
        if self.max_height == 0 {
            return Err(ConfigError::Zero { field: "max_height" });
        }
        if self.max_pixels == 0 {
            return Err(ConfigError::Zero { field: "max_pixels" });
        }
        Ok(())
    }
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_width: Self::DEFAULT_MAX_EDGE,
            max_height: Self::DEFAULT_MAX_EDGE,
            max_pixels: Self::DEFAULT_MAX_PIXELS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_validate() {
        assert!(RenderLimits::default().validate().is_ok());
    }

    #[test]
    fn zero_width_is_rejected() {
        let limits = RenderLimits {
            max_width: 0,
            ..RenderLimits::default()
        };
        assert_eq!(
            limits.validate(),
            Err(ConfigError::Zero { field: "max_width" })
        );
    }

    #[test]
    fn zero_pixel_budget_is_rejected() {
        let limits = RenderLimits {
            max_pixels: 0,
            ..RenderLimits::default()
        };
        assert!(matches!(limits.validate(), Err(ConfigError::Zero { .. })));
    }
}
