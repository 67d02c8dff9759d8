//! Benchmark profiles for the Vellum ownership layer.
//!
//! - [`reference_library`]: a fake engine serving [`REFERENCE_DOCUMENT`]
//! - [`progressive_library`]: the same, with an incremental render of
//!   configurable length

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use vellum_core::Result;
use vellum_doc::{Library, LibraryConfig, RenderOptions};
use vellum_test_utils::{FakeDocument, FakeEngine, FakePage};

/// Bytes the reference profile's engine recognises.
pub const REFERENCE_DOCUMENT: &[u8] = b"%PDF-1.7 bench-reference";

/// Pages in the reference document.
pub const REFERENCE_PAGES: usize = 16;

/// The reference document: 16 US-letter pages.
pub fn reference_document() -> FakeDocument {
    (0..REFERENCE_PAGES).fold(FakeDocument::default(), |doc, _| {
        doc.page(FakePage::sized(612.0, 792.0))
    })
}

/// A library whose engine serves the reference document.
pub fn reference_library() -> Result<Library> {
    library_over(FakeEngine::new().with_document(REFERENCE_DOCUMENT, reference_document()))
}

/// A library whose reference pages each take `steps` continuation calls.
pub fn progressive_library(steps: u32) -> Result<Library> {
    let document = (0..REFERENCE_PAGES).fold(FakeDocument::default(), |doc, _| {
        doc.page(FakePage::sized(612.0, 792.0).progressive_steps(steps))
    });
    library_over(FakeEngine::new().with_document(REFERENCE_DOCUMENT, document))
}

fn library_over(engine: FakeEngine) -> Result<Library> {
    engine.probe().disable_call_log();
    Library::new(engine, LibraryConfig::default())
}

/// Thumbnail options: a 1/4 scale target for a US-letter page.
pub fn thumbnail_options() -> RenderOptions {
    RenderOptions::new(153.0, 198.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_profile_opens() {
        let library = reference_library().unwrap();
        let doc = library.open_document(REFERENCE_DOCUMENT, None).unwrap();
        assert_eq!(doc.page_count().unwrap(), REFERENCE_PAGES);
    }
}
