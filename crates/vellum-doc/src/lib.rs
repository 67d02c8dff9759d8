//! Safe ownership layer over a foreign PDF engine.
//!
//! The engine knows only integer handles and offsets into its own flat
//! memory. This crate turns those into an ownership graph:
//!
//! ```text
//! Library ──owns──► Runtime (engine + arena)
//!    │
//!    └─open_document─► Document ──owns──► Page ──owns──► text index
//!                         │                 ▲
//!                         │                 └──borrows── Annotation, PageObject,
//!                         │                              Font, ProgressiveRender
//!                         └──owns──► source buffer, form environment
//! ```
//!
//! Ownership rules:
//!
//! - A document releases every page it tracks before closing itself.
//! - A page disposed while borrowed defers its native release until the
//!   last borrow is returned.
//! - Every handle is disposed explicitly or, failing that, on drop.
//!
//! All types are `!Send`: one [`Library`] serves one thread, and the core
//! never spawns threads. [`RenderWorker`] is an optional helper layered on
//! top for parallel rendering.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod annotation;
mod bookmark;
mod borrow;
pub mod config;
mod document;
mod font;
mod form;
mod library;
mod marshal;
mod page;
mod page_object;
pub mod progressive;
pub mod render;
mod text;
pub mod worker;

pub use annotation::Annotation;
pub use bookmark::Bookmark;
pub use config::{LibraryConfig, WorkerConfig};
pub use document::{Document, STANDARD_METADATA_TAGS};
pub use font::Font;
pub use library::Library;
pub use page::Page;
pub use page_object::PageObject;
pub use progressive::{ProgressStatus, ProgressiveRender};
pub use render::{bgra_to_rgba, validate_dimensions, BitmapSize, RenderOptions, RenderedBitmap};
pub use text::{SearchOptions, TextMatch};
pub use worker::{RenderTicket, RenderWorker};
