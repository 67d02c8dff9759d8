//! Vellum: safe handles over a foreign PDF engine.
//!
//! This facade re-exports the public API of the Vellum sub-crates. Most
//! users only need this crate plus an [`engine::Engine`] implementation.
//!
//! # Quick start
//!
//! ```rust
//! use vellum::prelude::*;
//! use vellum_test_utils::fixtures::{self, SAMPLE};
//!
//! let library = Library::new(fixtures::engine(), LibraryConfig::default()).unwrap();
//! let doc = library.open_document(SAMPLE, None).unwrap();
//! let page = doc.get_page(0).unwrap();
//!
//! let bitmap = page.render(&RenderOptions::new(64.0, 48.0)).unwrap();
//! assert_eq!(bitmap.pixels.len(), 64 * 48 * 4);
//!
//! page.dispose().unwrap();
//! doc.dispose().unwrap();
//! assert!(library.arena_stats().is_balanced());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `vellum-core` | Handles, errors, disposal, geometry |
//! | [`arena`] | `vellum-arena` | Allocations inside engine memory |
//! | [`engine`] | `vellum-engine` | The `Engine` trait and status codes |
//! | [`doc`] | `vellum-doc` | Library, documents, pages, rendering |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Handles, error taxonomy, and the disposal protocol (`vellum-core`).
pub use vellum_core as types;

/// Scoped and owned allocations in engine memory (`vellum-arena`).
pub use vellum_arena as arena;

/// The engine boundary (`vellum-engine`).
///
/// Implement [`engine::Engine`] to bind a real engine build.
pub use vellum_engine as engine;

/// The ownership graph and rendering (`vellum-doc`).
pub use vellum_doc as doc;

/// Common imports for typical Vellum usage.
///
/// ```rust
/// use vellum::prelude::*;
/// ```
pub mod prelude {
    // Disposal and errors
    pub use vellum_core::{Disposable, DisposedError, Error, Result};

    // Geometry
    pub use vellum_core::{Color, Rect, Rotation};

    // Engine boundary
    pub use vellum_engine::Engine;

    // Ownership graph
    pub use vellum_doc::{
        Annotation, Bookmark, Document, Font, Library, LibraryConfig, Page, PageObject,
    };

    // Rendering
    pub use vellum_doc::{
        ProgressStatus, ProgressiveRender, RenderOptions, RenderWorker, RenderedBitmap,
        WorkerConfig,
    };
}
