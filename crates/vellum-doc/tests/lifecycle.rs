//! Integration tests: ownership graph and disposal rules.
//!
//! Every scenario runs against the fake engine, whose probe reports which
//! engine objects are still open and which protocol rules were broken.

use vellum_core::{Disposable, Error};
use vellum_doc::{Document, Library, LibraryConfig};
use vellum_engine::entry;
use vellum_test_utils::fixtures::{self, SAMPLE, THREE_PAGES};
use vellum_test_utils::{FakeProbe, ObjectKind};

fn library() -> (Library, FakeProbe) {
    vellum_test_utils::init_tracing();
    let engine = fixtures::engine();
    let probe = engine.probe();
    let library = Library::new(engine, LibraryConfig::default()).unwrap();
    (library, probe)
}

fn open(library: &Library, bytes: &[u8]) -> Document {
    library.open_document(bytes, None).unwrap()
}

// ── Idempotent disposal ─────────────────────────────────────────────

#[test]
fn every_handle_disposes_twice_without_error() {
    let (library, probe) = library();
    let doc = open(&library, SAMPLE);
    let page = doc.get_page(0).unwrap();
    let annotation = page.annotation(0).unwrap();
    let object = page.object(0).unwrap();
    let font = object.font().unwrap().expect("text object has a font");

    for _ in 0..2 {
        font.dispose().unwrap();
        object.dispose().unwrap();
        annotation.dispose().unwrap();
    }
    for _ in 0..2 {
        page.dispose().unwrap();
    }
    for _ in 0..2 {
        doc.dispose().unwrap();
    }

    assert!(font.is_disposed() && object.is_disposed() && annotation.is_disposed());
    assert!(page.is_disposed() && doc.is_disposed());
    assert_eq!(probe.count(entry::CLOSE_PAGE), 1);
    assert_eq!(probe.count(entry::PAGE_CLOSE_ANNOT), 1);
    assert_eq!(probe.count(entry::CLOSE_DOCUMENT), 1);
    drop((font, object, annotation, page, doc, library));
    probe.assert_released();
}

#[test]
fn operations_after_dispose_report_disposed() {
    let (library, _probe) = library();
    let doc = open(&library, THREE_PAGES);
    let page = doc.get_page(0).unwrap();
    page.dispose().unwrap();
    match page.width() {
        Err(Error::Disposed(e)) => assert_eq!(e.kind, "page"),
        other => panic!("expected Disposed, got {other:?}"),
    }
    doc.dispose().unwrap();
    assert!(doc.page_count().unwrap_err().is_disposed());
    assert!(doc.get_page(0).unwrap_err().is_disposed());
}

// ── Independent page instances ──────────────────────────────────────

#[test]
fn same_index_twice_yields_independent_pages() {
    let (library, probe) = library();
    let doc = open(&library, THREE_PAGES);
    let first = doc.get_page(1).unwrap();
    let second = doc.get_page(1).unwrap();
    assert_ne!(first.handle(), second.handle());
    assert_eq!(doc.tracked_page_count(), 2);

    first.dispose().unwrap();
    assert!(first.is_released());
    assert!(!second.is_released());
    assert_eq!(second.index(), 1);
    assert_eq!(second.width().unwrap(), 612.0);
    assert_eq!(doc.tracked_page_count(), 1);
    assert_eq!(probe.open(ObjectKind::Page), 1);
}

#[test]
fn out_of_range_page_index_is_rejected() {
    let (library, _probe) = library();
    let doc = open(&library, THREE_PAGES);
    match doc.get_page(3) {
        Err(Error::PageIndexOutOfRange { index, count }) => assert_eq!((index, count), (3, 3)),
        other => panic!("expected PageIndexOutOfRange, got {other:?}"),
    }
    assert_eq!(doc.tracked_page_count(), 0);
}

#[test]
fn engine_page_load_failure_is_typed() {
    let (library, probe) = library();
    let doc = open(&library, THREE_PAGES);
    probe.fail_next(entry::LOAD_PAGE);
    match doc.get_page(0) {
        Err(Error::PageLoadFailed { index, .. }) => assert_eq!(index, 0),
        other => panic!("expected PageLoadFailed, got {other:?}"),
    }
    assert_eq!(doc.tracked_page_count(), 0);
    assert!(doc.get_page(0).is_ok());
}

// ── Borrow counting ─────────────────────────────────────────────────

#[test]
fn disposed_page_waits_for_last_release() {
    let (library, probe) = library();
    let doc = open(&library, THREE_PAGES);
    let page = doc.get_page(0).unwrap();
    for _ in 0..3 {
        page.retain().unwrap();
    }
    page.dispose().unwrap();

    for remaining in (1..=3).rev() {
        assert!(!page.is_released(), "released with {remaining} borrows left");
        assert_eq!(probe.open(ObjectKind::Page), 1);
        page.release().unwrap();
    }
    assert!(page.is_released());
    assert_eq!(probe.open(ObjectKind::Page), 0);
    assert_eq!(probe.count(entry::CLOSE_PAGE), 1);

    match page.release() {
        Err(Error::BorrowUnderflow { page_index }) => assert_eq!(page_index, 0),
        other => panic!("expected BorrowUnderflow, got {other:?}"),
    }
    assert_eq!(probe.count(entry::CLOSE_PAGE), 1);
    probe.assert_no_violations();
}

#[test]
fn retain_after_dispose_is_refused() {
    let (library, _probe) = library();
    let doc = open(&library, THREE_PAGES);
    let page = doc.get_page(0).unwrap();
    page.retain().unwrap();
    page.dispose().unwrap();
    assert!(page.retain().unwrap_err().is_disposed());
    assert_eq!(page.borrow_count(), 1);
    page.release().unwrap();
    assert!(page.is_released());
}

#[test]
fn release_without_retain_underflows() {
    let (library, _probe) = library();
    let doc = open(&library, THREE_PAGES);
    let page = doc.get_page(2).unwrap();
    match page.release() {
        Err(Error::BorrowUnderflow { page_index }) => assert_eq!(page_index, 2),
        other => panic!("expected BorrowUnderflow, got {other:?}"),
    }
    assert!(!page.is_released());
}

#[test]
fn disposed_but_borrowed_page_stays_tracked() {
    let (library, _probe) = library();
    let doc = open(&library, THREE_PAGES);
    let page = doc.get_page(0).unwrap();
    page.retain().unwrap();
    page.dispose().unwrap();
    assert_eq!(doc.tracked_page_count(), 1);
    assert_eq!(doc.borrowed_page_count(), 1);
    page.release().unwrap();
    assert_eq!(doc.tracked_page_count(), 0);
}

// ── Borrowers outliving their page ─────────────────────────────────

#[test]
fn font_keeps_disposed_page_alive() {
    let (library, probe) = library();
    let doc = open(&library, SAMPLE);
    let page = doc.get_page(0).unwrap();
    let object = page.object(0).unwrap();
    let font = object.font().unwrap().expect("text object has a font");
    object.dispose().unwrap();
    assert_eq!(page.borrow_count(), 1);

    page.dispose().unwrap();
    assert!(!page.is_released());
    assert_eq!(probe.open(ObjectKind::Page), 1);
    assert_eq!(font.base_name().unwrap().as_deref(), Some("Helvetica-Bold"));
    assert_eq!(font.weight().unwrap(), Some(700));
    assert!(font.is_embedded().unwrap());

    font.dispose().unwrap();
    assert!(page.is_released());
    assert_eq!(probe.open(ObjectKind::Page), 0);
    assert_eq!(doc.tracked_page_count(), 0);
    probe.assert_no_violations();
}

#[test]
fn annotation_closes_before_page() {
    let (library, probe) = library();
    let doc = open(&library, SAMPLE);
    let page = doc.get_page(0).unwrap();
    let annotation = page.annotation(0).unwrap();
    page.dispose().unwrap();
    assert!(!page.is_released());

    annotation.dispose().unwrap();
    let annot_closed = probe
        .position(entry::PAGE_CLOSE_ANNOT, annotation.handle().raw())
        .expect("annotation closed");
    let page_closed = probe
        .position(entry::CLOSE_PAGE, page.handle().raw())
        .expect("page closed");
    assert!(annot_closed < page_closed);
    probe.assert_no_violations();
}

#[test]
fn dropped_views_return_their_borrows() {
    let (library, probe) = library();
    let doc = open(&library, SAMPLE);
    let page = doc.get_page(0).unwrap();
    {
        let _annotation = page.annotation(1).unwrap();
        let object = page.object(0).unwrap();
        let _font = object.font().unwrap();
        assert_eq!(page.borrow_count(), 3);
    }
    assert_eq!(page.borrow_count(), 0);
    assert_eq!(probe.open(ObjectKind::Annotation), 0);
}

// ── Document teardown ───────────────────────────────────────────────

#[test]
fn document_releases_pages_then_handle_then_buffer() {
    let (library, probe) = library();
    let doc = open(&library, THREE_PAGES);
    let first = doc.get_page(0).unwrap();
    let second = doc.get_page(2).unwrap();
    probe.clear_calls();

    doc.dispose().unwrap();

    let close_first = probe.position(entry::CLOSE_PAGE, first.handle().raw()).unwrap();
    let close_second = probe.position(entry::CLOSE_PAGE, second.handle().raw()).unwrap();
    let close_doc = probe.position(entry::CLOSE_DOCUMENT, doc.handle().raw()).unwrap();
    assert!(close_first < close_doc);
    assert!(close_second < close_doc);
    assert!(first.is_released() && second.is_released());
    // The fake flags a source buffer freed while its document is open.
    probe.assert_no_violations();
    assert!(library.arena_stats().is_balanced());
    assert_eq!(probe.live_mallocs(), 0);
}

#[test]
fn dispose_refuses_while_pages_are_borrowed() {
    let (library, probe) = library();
    let doc = open(&library, SAMPLE);
    let page = doc.get_page(0).unwrap();
    let object = page.object(1).unwrap();
    page.retain().unwrap();

    match doc.dispose() {
        Err(Error::OutstandingBorrows { pages, borrows }) => assert_eq!((pages, borrows), (1, 2)),
        other => panic!("expected OutstandingBorrows, got {other:?}"),
    }
    assert!(!doc.is_disposed());
    assert_eq!(doc.page_count().unwrap(), 2);
    assert_eq!(probe.count(entry::CLOSE_DOCUMENT), 0);

    object.dispose().unwrap();
    page.release().unwrap();
    doc.dispose().unwrap();
    assert!(page.is_released());
}

#[test]
fn force_dispose_releases_borrowed_pages() {
    let (library, probe) = library();
    let doc = open(&library, SAMPLE);
    let page = doc.get_page(0).unwrap();
    let object = page.object(0).unwrap();
    let font = object.font().unwrap().expect("text object has a font");

    doc.force_dispose();
    assert!(doc.is_disposed());
    assert!(page.is_released());
    assert!(object.kind().unwrap_err().is_disposed());
    assert!(font.base_name().unwrap_err().is_disposed());

    font.dispose().unwrap();
    object.dispose().unwrap();
    assert_eq!(page.borrow_count(), 0);
    assert_eq!(probe.count(entry::CLOSE_PAGE), 1);
    drop((font, object, page, doc, library));
    probe.assert_released();
}

#[test]
fn force_dispose_closes_open_annotations_before_the_page() {
    let (library, probe) = library();
    let doc = open(&library, SAMPLE);
    let page = doc.get_page(0).unwrap();
    let annotation = page.annotation(0).unwrap();
    let kept = page.annotation(1).unwrap();
    kept.dispose().unwrap();
    probe.clear_calls();

    doc.force_dispose();
    let annot_closed = probe
        .position(entry::PAGE_CLOSE_ANNOT, annotation.handle().raw())
        .expect("annotation closed");
    let page_closed = probe
        .position(entry::CLOSE_PAGE, page.handle().raw())
        .expect("page closed");
    assert!(annot_closed < page_closed);
    assert_eq!(probe.open(ObjectKind::Annotation), 0);
    assert!(annotation.subtype().unwrap_err().is_disposed());

    annotation.dispose().unwrap();
    assert_eq!(probe.count(entry::PAGE_CLOSE_ANNOT), 1);
    assert_eq!(page.borrow_count(), 0);
    probe.assert_no_violations();
    drop((annotation, kept, page, doc, library));
    probe.assert_released();
}

#[test]
fn dropped_document_is_reclaimed() {
    let (library, probe) = library();
    let (first, second);
    {
        let doc = open(&library, THREE_PAGES);
        first = doc.get_page(0).unwrap();
        second = doc.get_page(1).unwrap();
        assert!(!first.is_disposed() && !second.is_disposed());
    }
    assert!(first.is_released() && second.is_released());
    assert!(first.is_disposed());
    assert_eq!(probe.open(ObjectKind::Page), 0);
    assert_eq!(probe.open(ObjectKind::Document), 0);
    assert!(library.arena_stats().is_balanced());
    probe.assert_no_violations();
}

#[test]
fn engine_outlives_library_while_documents_are_open() {
    let (library, probe) = library();
    let doc = open(&library, THREE_PAGES);
    drop(library);
    assert!(!probe.is_destroyed());
    assert_eq!(doc.page_count().unwrap(), 3);
    drop(doc);
    assert!(probe.is_destroyed());
    probe.assert_released();
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn native_release_happens_on_the_last_release(n in 0usize..12) {
            let (library, probe) = library();
            let doc = open(&library, THREE_PAGES);
            let page = doc.get_page(0).unwrap();
            for _ in 0..n {
                page.retain().unwrap();
            }
            page.dispose().unwrap();
            for _ in 0..n {
                prop_assert!(!page.is_released());
                page.release().unwrap();
            }
            prop_assert!(page.is_released());
            let underflow = matches!(page.release(), Err(Error::BorrowUnderflow { .. }));
            prop_assert!(underflow);
            prop_assert_eq!(probe.count(entry::CLOSE_PAGE), 1);
        }

        #[test]
        fn any_dispose_order_of_views_releases_everything(order in Just(vec![0usize, 1, 2, 3]).prop_shuffle()) {
            let (library, probe) = library();
            let doc = open(&library, SAMPLE);
            let page = doc.get_page(0).unwrap();
            let annotation = page.annotation(0).unwrap();
            let object = page.object(0).unwrap();
            let font = object.font().unwrap().unwrap();
            let views: [&dyn Disposable; 4] = [&annotation, &object, &font, &page];
            for i in order {
                views[i].dispose().unwrap();
            }
            prop_assert!(page.is_released());
            doc.dispose().unwrap();
            drop((font, object, annotation, page, doc, library));
            prop_assert!(probe.violations().is_empty(), "{:?}", probe.violations());
        }
    }
}
