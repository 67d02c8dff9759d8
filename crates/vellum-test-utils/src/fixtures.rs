//! Reusable documents.
//!
//! Each fixture pairs the bytes a test hands to `open_document` with the
//! model the fake engine serves for them:
//!
//! - [`three_pages`]: three plain pages, the smallest multi-page document.
//! - [`sample`]: two pages with text, labels, annotations, a text object
//!   with an embedded font, metadata, and a two-level outline.
//! - [`cyclic_outline`]: an outline whose sibling chain loops back on itself.
//! - [`deep_outline`]: a single chain of nested outline nodes.
//! - [`progressive`]: one page whose incremental render takes `steps`
//!   continue calls before finishing.

use vellum_core::{Color, Rect};

use crate::fake::FakeEngine;
use crate::model::{FakeAnnotation, FakeBookmark, FakeDocument, FakeFont, FakeObject, FakePage};

pub const THREE_PAGES: &[u8] = b"%PDF-1.7 three-pages";
pub const SAMPLE: &[u8] = b"%PDF-1.7 sample";
pub const CYCLIC_OUTLINE: &[u8] = b"%PDF-1.7 cyclic-outline";
pub const DEEP_OUTLINE: &[u8] = b"%PDF-1.7 deep-outline";
pub const PROGRESSIVE: &[u8] = b"%PDF-1.7 progressive";
pub const LOCKED: &[u8] = b"%PDF-1.7 locked";

/// Password of the [`LOCKED`] document.
pub const LOCKED_PASSWORD: &str = "hunter2";

/// Text of page 0 of [`SAMPLE`].
pub const SAMPLE_TEXT: &str = "The quick brown fox jumps over the lazy dog. The End.";

pub fn three_pages() -> FakeDocument {
    FakeDocument::with_pages(3)
}

pub fn sample() -> FakeDocument {
    let font = FakeFont::new("Helvetica-Bold", 700, true);
    let first = FakePage::sized(612.0, 792.0)
        .text(SAMPLE_TEXT)
        .label("i")
        .annotation(
            FakeAnnotation::new(9, Rect::new(72.0, 700.0, 300.0, 720.0))
                .color(Color::rgba(0xFF, 0xEB, 0x3B, 0x80)),
        )
        .annotation(FakeAnnotation::new(2, Rect::new(72.0, 600.0, 200.0, 614.0)))
        .object(FakeObject::text(Rect::new(72.0, 690.0, 400.0, 710.0), font))
        .object(FakeObject::path(Rect::new(0.0, 0.0, 612.0, 2.0)))
        .object(FakeObject::image(Rect::new(100.0, 100.0, 300.0, 250.0)));
    let second = FakePage::sized(842.0, 595.0)
        .text("Appendix")
        .label("ii")
        .rotation(1);
    FakeDocument {
        permissions: 0xFFFF_F0C4,
        file_version: Some(17),
        ..FakeDocument::default()
    }
    .page(first)
    .page(second)
    .metadata("Title", "Sample Document")
    .metadata("Author", "Vellum Fixtures")
    .metadata("Producer", "vellum-test-utils")
    .outline(
        0,
        vec![
            FakeBookmark::new("Chapter 1").dest(0).child(2).sibling(1),
            FakeBookmark::new("Appendix").dest(1),
            FakeBookmark::new("Section 1.1").dest(0),
        ],
    )
}

/// Node 2's sibling points back at node 0.
pub fn cyclic_outline() -> FakeDocument {
    FakeDocument::with_pages(1).outline(
        0,
        vec![
            FakeBookmark::new("A").dest(0).sibling(1),
            FakeBookmark::new("B").sibling(2),
            FakeBookmark::new("C").sibling(0),
        ],
    )
}

/// `depth` nodes, each the only child of the previous one.
pub fn deep_outline(depth: usize) -> FakeDocument {
    let nodes = (0..depth)
        .map(|i| {
            let node = FakeBookmark::new(format!("Level {i}"));
            if i + 1 < depth {
                node.child(i + 1)
            } else {
                node
            }
        })
        .collect();
    FakeDocument::with_pages(1).outline(0, nodes)
}

pub fn progressive(steps: u32) -> FakeDocument {
    FakeDocument::default().page(FakePage::sized(200.0, 100.0).progressive_steps(steps))
}

pub fn locked() -> FakeDocument {
    FakeDocument::with_pages(1).password(LOCKED_PASSWORD)
}

/// An engine serving every fixture above, with default progressive steps.
pub fn engine() -> FakeEngine {
    FakeEngine::new()
        .with_document(THREE_PAGES, three_pages())
        .with_document(SAMPLE, sample())
        .with_document(CYCLIC_OUTLINE, cyclic_outline())
        .with_document(DEEP_OUTLINE, deep_outline(8))
        .with_document(PROGRESSIVE, progressive(3))
        .with_document(LOCKED, locked())
}
