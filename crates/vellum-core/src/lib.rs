//! Core types for the Vellum document engine layer.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by every other Vellum crate: typed engine handles,
//! the error taxonomy, the lifecycle primitives that every handle wrapper
//! is built on, render limits, and small geometry value types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod dispose;
pub mod error;
pub mod geometry;
pub mod id;

pub use config::{ConfigError, RenderLimits};
pub use dispose::{Disposable, DisposableHandle, Lifecycle, LifecycleState};
pub use error::{ArenaError, DimensionError, DisposedError, EngineErrorCode, Error, Result};
pub use geometry::{Color, Rect, Rotation};
pub use id::{
    AnnotationHandle, BitmapHandle, BookmarkHandle, DestHandle, DocumentHandle, FontHandle,
    FormHandle, PageHandle, PageObjectHandle, SearchHandle, TextPageHandle,
};
