//! Library and render-worker configuration.

use vellum_arena::ArenaConfig;
use vellum_core::{ConfigError, RenderLimits};

use crate::render::BYTES_PER_PIXEL;

/// Everything [`Library::new`](crate::Library::new) needs besides the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Budget for allocations inside the engine's memory.
    pub arena: ArenaConfig,
    /// Bounds applied to every render request.
    pub render: RenderLimits,
    /// Maximum nesting walked by recursive tree reads such as the outline.
    ///
    /// Default: 100. Must be at least 1.
    pub max_tree_depth: usize,
    /// Create a form-fill environment for each document and attach every
    /// loaded page to it. Default: `false`.
    pub form_fill: bool,
}

impl LibraryConfig {
    /// Default outline depth limit.
    pub const DEFAULT_MAX_TREE_DEPTH: usize = 100;

    /// Validate every nested section, then check that the largest bitmap
    /// the render limits admit fits a single arena allocation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arena.validate()?;
        self.render.validate()?;
        let bitmap_bytes = self
            .render
            .max_pixels
            .saturating_mul(u64::from(BYTES_PER_PIXEL));
        let max_allocation = self.arena.max_allocation_bytes as u64;
        if bitmap_bytes > max_allocation {
            return Err(ConfigError::Inconsistent {
                field: "render.max_pixels * 4",
                value: bitmap_bytes,
                bound_field: "arena.max_allocation_bytes",
                bound: max_allocation,
            });
        }
        if self.max_tree_depth == 0 {
            return Err(ConfigError::Zero {
                field: "max_tree_depth",
            });
        }
        Ok(())
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            render: RenderLimits::default(),
            max_tree_depth: Self::DEFAULT_MAX_TREE_DEPTH,
            form_fill: false,
        }
    }
}

/// Settings for [`RenderWorker::spawn`](crate::RenderWorker::spawn).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Configuration of the worker's own library.
    pub library: LibraryConfig,
    /// Jobs that may wait in the queue before submitters block.
    /// Default: 16. Must be at least 1.
    pub queue_capacity: usize,
    /// OS thread name. Default: `"vellum-render"`.
    pub thread_name: String,
}

impl WorkerConfig {
    /// Default job queue bound.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

    /// Validate the library section and the queue bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.library.validate()?;
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "queue_capacity",
            });
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            library: LibraryConfig::default(),
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            thread_name: "vellum-render".into(),
        }
    }
}
