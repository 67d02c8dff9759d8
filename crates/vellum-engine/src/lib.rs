//! The foreign PDF engine, as a trait.
//!
//! The engine is reached only through a fixed table of entry points that
//! take opaque integer handles and offsets into its flat memory. [`Engine`]
//! is that table. Concrete engines (a loaded PDFium module, or the
//! in-process fake in `vellum-test-utils`) implement it; `vellum-doc`
//! builds the safe ownership layer on top.
//!
//! Conventions shared by every method:
//!
//! - Handles are `u32`; `0` means null or failure.
//! - Pointers are byte offsets into [`FlatMemory`](vellum_arena::FlatMemory);
//!   `0` means null.
//! - Two-phase string getters return the required byte size (including the
//!   terminator) and write only when `buflen` is large enough.
//! - Every call may record a failure code for [`Engine::get_last_error`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod entry;
pub mod status;

pub use engine::Engine;
pub use status::{AnnotationSubtype, BitmapFormat, PageObjectType, RenderStatus};
