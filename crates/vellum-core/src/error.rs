//! Error taxonomy for the Vellum layer.
//!
//! Organized by concern: lifecycle ([`DisposedError`]), allocation
//! ([`ArenaError`]), render geometry ([`DimensionError`]), configuration
//! ([`ConfigError`]), and the crate-wide [`Error`] that wraps them together
//! with engine-call and ownership-graph failures.
//!
//! Lifecycle violations and allocation failures always surface as typed
//! errors. Data accessors that merely read a value out of the engine prefer
//! returning `None` over raising.

use thiserror::Error;

use crate::config::ConfigError;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// An operation was attempted on a handle that has already been disposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("{kind} has been disposed")]
pub struct DisposedError {
    /// What kind of handle it was (e.g. `"page"`, `"document"`).
    pub kind: &'static str,
}

/// Errors raised by the arena.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The request exceeds the remaining arena budget, or the engine's
    /// allocator returned its null offset.
    #[error("out of memory: requested {requested} bytes, {available} bytes available")]
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
        /// Bytes still available under the arena budget at the time of the request.
        available: usize,
    },
    /// Zero-byte allocations are rejected; every marshalled value carries at
    /// least a terminator.
    #[error("zero-sized allocation requested")]
    ZeroSized,
    /// A single request larger than the per-allocation ceiling.
    #[error("allocation of {requested} bytes exceeds the per-allocation limit of {limit} bytes")]
    TooLarge {
        /// Number of bytes requested.
        requested: usize,
        /// Configured per-allocation ceiling.
        limit: usize,
    },
    /// A read or write would leave the bounds of an allocation or of the
    /// engine's memory region.
    #[error("access at offset {offset} of {len} bytes is outside a region of {size} bytes")]
    OutOfBounds {
        /// Offset of the access, relative to the region start.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Size of the region.
        size: usize,
    },
}

/// Requested render dimensions that cannot be turned into a bitmap.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DimensionError {
    /// Width or height is NaN or infinite.
    #[error("{axis} must be finite, got {value}")]
    NonFinite {
        /// `"width"` or `"height"`.
        axis: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// Width or height is zero or negative (after rounding to whole pixels).
    #[error("{axis} must be positive, got {value}")]
    NonPositive {
        /// `"width"` or `"height"`.
        axis: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// Width or height exceeds the configured maximum.
    #[error("{axis} {value} exceeds the maximum of {max}")]
    ExceedsMaximum {
        /// `"width"` or `"height"`.
        axis: &'static str,
        /// The rejected value.
        value: f64,
        /// The configured maximum.
        max: u32,
    },
    /// `width * height` exceeds the configured pixel budget.
    #[error("{width}x{height} exceeds the pixel budget of {max_pixels}")]
    TooManyPixels {
        /// Rounded width.
        width: u32,
        /// Rounded height.
        height: u32,
        /// Configured pixel budget.
        max_pixels: u64,
    },
    /// `width * height * 4` does not fit the engine's 32-bit address space.
    #[error("{width}x{height} overflows the bitmap byte-size computation")]
    ByteSizeOverflow {
        /// Rounded width.
        width: u32,
        /// Rounded height.
        height: u32,
    },
}

/// Failure codes reported by the engine's `get_last_error` entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineErrorCode {
    /// No error recorded.
    Success,
    /// Unknown error.
    Unknown,
    /// File not found or could not be opened.
    File,
    /// Not a PDF, or the file is corrupted.
    Format,
    /// Password required or incorrect.
    Password,
    /// Unsupported security scheme.
    Security,
    /// Page not found or content error.
    Page,
    /// A code outside the documented range.
    Other(u32),
}

impl EngineErrorCode {
    /// Map a raw `get_last_error` value.
    pub fn from_raw(code: u32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Unknown,
            2 => Self::File,
            3 => Self::Format,
            4 => Self::Password,
            5 => Self::Security,
            6 => Self::Page,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Unknown => write!(f, "unknown error"),
            Self::File => write!(f, "file error"),
            Self::Format => write!(f, "format error"),
            Self::Password => write!(f, "password required or incorrect"),
            Self::Security => write!(f, "unsupported security scheme"),
            Self::Page => write!(f, "page error"),
            Self::Other(code) => write!(f, "engine error code {code}"),
        }
    }
}

/// The crate-wide error type.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    /// Operation attempted after disposal.
    #[error(transparent)]
    Disposed(#[from] DisposedError),
    /// The arena could not satisfy a request.
    #[error(transparent)]
    Arena(#[from] ArenaError),
    /// Render dimensions were rejected before any allocation was made.
    #[error(transparent)]
    Dimension(#[from] DimensionError),
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A fallible engine call returned its failure sentinel.
    #[error("engine call {call} failed: {code}")]
    EngineCall {
        /// Entry-point name.
        call: &'static str,
        /// The engine's last-error code at the time of failure.
        code: EngineErrorCode,
    },
    /// The engine refused to open the document.
    #[error("document could not be opened: {code}")]
    DocumentLoadFailed {
        /// The engine's last-error code.
        code: EngineErrorCode,
    },
    /// Page index outside `0..count`.
    #[error("page index {index} out of range for a document with {count} pages")]
    PageIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of pages in the document.
        count: usize,
    },
    /// The engine failed to load an in-range page.
    #[error("page {index} could not be loaded: {code}")]
    PageLoadFailed {
        /// Requested index.
        index: usize,
        /// The engine's last-error code.
        code: EngineErrorCode,
    },
    /// An operation that is not valid in the current state of a state machine.
    #[error("{operation} is not valid while {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The state the object was in.
        state: &'static str,
    },
    /// A recursive tree walk went deeper than the configured limit.
    #[error("tree depth limit of {limit} exceeded")]
    DepthLimitExceeded {
        /// The configured limit.
        limit: usize,
    },
    /// `release()` called on a page with no outstanding borrows.
    #[error("page {page_index} released more times than it was retained")]
    BorrowUnderflow {
        /// Index of the page within its document.
        page_index: usize,
    },
    /// Document disposal refused because pages are still borrowed.
    #[error("{pages} page(s) still hold {borrows} outstanding borrow(s)")]
    OutstandingBorrows {
        /// Number of pages with a non-zero borrow count.
        pages: usize,
        /// Sum of their borrow counts.
        borrows: usize,
    },
    /// An argument could not be marshalled or is out of its domain.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the problem.
        reason: String,
    },
}

impl Error {
    /// Shorthand for [`Error::Disposed`].
    pub fn disposed(kind: &'static str) -> Self {
        Self::Disposed(DisposedError { kind })
    }

    /// Whether this error reports a use-after-dispose.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping_is_stable() {
        assert_eq!(EngineErrorCode::from_raw(0), EngineErrorCode::Success);
        assert_eq!(EngineErrorCode::from_raw(3), EngineErrorCode::Format);
        assert_eq!(EngineErrorCode::from_raw(4), EngineErrorCode::Password);
        assert_eq!(EngineErrorCode::from_raw(6), EngineErrorCode::Page);
        assert_eq!(EngineErrorCode::from_raw(99), EngineErrorCode::Other(99));
    }

    #[test]
    fn arena_error_converts_into_error() {
        let e: Error = ArenaError::ZeroSized.into();
        assert_eq!(e, Error::Arena(ArenaError::ZeroSized));
    }

    #[test]
    fn disposed_display_names_kind() {
        assert_eq!(Error::disposed("page").to_string(), "page has been disposed");
        assert!(Error::disposed("font").is_disposed());
    }

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
