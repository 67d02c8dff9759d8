//! Test utilities for Vellum development.
//!
//! [`FakeEngine`] implements the engine boundary in process: a flat
//! `Vec<u8>` memory with a first-fit allocator, generation-checked handle
//! tables, and documents served from [`FakeDocument`] models. A
//! [`FakeProbe`] stays with the test after the engine has been moved into a
//! library and reports call order, open objects, live mallocs, and protocol
//! violations. [`fixtures`] holds the documents most tests start from.
//! [`init_tracing`] routes the layer's logs to the test harness.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod fake;
pub mod fixtures;
mod handles;
mod memory;
mod model;
mod probe;

pub use fake::FakeEngine;
pub use model::{
    FakeAnnotation, FakeBookmark, FakeDocument, FakeFont, FakeObject, FakePage, DEFAULT_PAINT,
};
pub use probe::{Call, FakeProbe, ObjectKind, MALLOC};

/// Install a test-writer subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
