//! Integration tests: one-shot and incremental rendering.

use vellum_core::{Color, DimensionError, Disposable, Error, RenderLimits};
use vellum_doc::{Library, LibraryConfig, ProgressStatus, RenderOptions};
use vellum_engine::entry;
use vellum_test_utils::fixtures::{self, PROGRESSIVE, SAMPLE, THREE_PAGES};
use vellum_test_utils::{FakeDocument, FakeEngine, FakePage, FakeProbe, ObjectKind, DEFAULT_PAINT};

const PAINT_RGBA: [u8; 4] = [DEFAULT_PAINT[2], DEFAULT_PAINT[1], DEFAULT_PAINT[0], DEFAULT_PAINT[3]];

fn library_with(engine: FakeEngine, config: LibraryConfig) -> (Library, FakeProbe) {
    vellum_test_utils::init_tracing();
    let probe = engine.probe();
    let library = Library::new(engine, config).unwrap();
    (library, probe)
}

fn library() -> (Library, FakeProbe) {
    library_with(fixtures::engine(), LibraryConfig::default())
}

fn single_page(page: FakePage) -> (Library, FakeProbe) {
    let engine = FakeEngine::new().with_document(PROGRESSIVE, FakeDocument::default().page(page));
    library_with(engine, LibraryConfig::default())
}

// ── One-shot ────────────────────────────────────────────────────────

#[test]
fn render_returns_rgba_pixels() {
    let (library, probe) = library();
    let doc = library.open_document(THREE_PAGES, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let bitmap = page.render(&RenderOptions::new(20.0, 10.0)).unwrap();

    assert_eq!((bitmap.width, bitmap.height), (20, 10));
    assert_eq!(bitmap.pixels.len(), 20 * 10 * 4);
    assert!(bitmap.pixels.chunks_exact(4).all(|px| px == PAINT_RGBA));
    assert_eq!(probe.open(ObjectKind::Bitmap), 0);
    // Only the document's source buffer remains.
    assert_eq!(library.arena_stats().live_allocations, 1);
}

#[test]
fn render_destroys_bitmap_before_freeing_buffer() {
    let (library, probe) = library();
    let doc = library.open_document(THREE_PAGES, None).unwrap();
    let page = doc.get_page(0).unwrap();
    page.render(&RenderOptions::new(4.0, 4.0)).unwrap();
    assert_eq!(probe.count(entry::BITMAP_CREATE_EX), 1);
    assert_eq!(probe.count(entry::BITMAP_DESTROY), 1);
    // The fake flags a bitmap buffer freed while the bitmap exists.
    probe.assert_no_violations();
}

#[test]
fn scaled_options_follow_page_size() {
    let (library, _probe) = library();
    let doc = library.open_document(SAMPLE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let options = RenderOptions::scaled(&page, 0.5).unwrap();
    assert_eq!((options.width, options.height), (306.0, 396.0));
    let bitmap = page.render(&options).unwrap();
    assert_eq!((bitmap.width, bitmap.height), (306, 396));
}

#[test]
fn zero_width_is_rejected_before_any_allocation() {
    let (library, probe) = library();
    let doc = library.open_document(THREE_PAGES, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let before = library.arena_stats();
    let mallocs = probe.live_mallocs();

    match page.render(&RenderOptions::new(0.0, 100.0)) {
        Err(Error::Dimension(DimensionError::NonPositive { axis, .. })) => assert_eq!(axis, "width"),
        other => panic!("expected NonPositive, got {other:?}"),
    }
    match page.start_render(&RenderOptions::new(0.0, 100.0)) {
        Err(Error::Dimension(DimensionError::NonPositive { .. })) => {}
        other => panic!("expected NonPositive, got {other:?}"),
    }
    assert_eq!(library.arena_stats(), before);
    assert_eq!(probe.live_mallocs(), mallocs);
    assert_eq!(probe.count(entry::BITMAP_CREATE_EX), 0);
    assert_eq!(page.borrow_count(), 0);
}

#[test]
fn configured_pixel_budget_is_enforced() {
    let config = LibraryConfig {
        render: RenderLimits {
            max_pixels: 1_000,
            ..RenderLimits::default()
        },
        ..LibraryConfig::default()
    };
    let (library, _probe) = library_with(fixtures::engine(), config);
    let doc = library.open_document(THREE_PAGES, None).unwrap();
    let page = doc.get_page(0).unwrap();
    match page.render(&RenderOptions::new(100.0, 11.0)) {
        Err(Error::Dimension(DimensionError::TooManyPixels { max_pixels, .. })) => assert_eq!(max_pixels, 1_000),
        other => panic!("expected TooManyPixels, got {other:?}"),
    }
    assert!(page.render(&RenderOptions::new(100.0, 10.0)).is_ok());
}

#[test]
fn bitmap_creation_failure_frees_the_buffer() {
    let (library, probe) = library();
    let doc = library.open_document(THREE_PAGES, None).unwrap();
    let page = doc.get_page(0).unwrap();
    probe.fail_next(entry::BITMAP_CREATE_EX);
    match page.render(&RenderOptions::new(8.0, 8.0)) {
        Err(Error::EngineCall { call, .. }) => assert_eq!(call, entry::BITMAP_CREATE_EX),
        other => panic!("expected EngineCall, got {other:?}"),
    }
    assert_eq!(library.arena_stats().live_allocations, 1);
    probe.assert_no_violations();
}

#[test]
fn custom_background_render_completes() {
    let (library, _probe) = library();
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let options = RenderOptions::new(10.0, 10.0).background(Some(Color::rgba(0x11, 0x22, 0x33, 0xFF)));
    let render = page.start_render(&options).unwrap();
    assert_eq!(render.status(), ProgressStatus::Continuing);
    render.run_to_completion().unwrap();
    let bitmap = render.result().unwrap();
    assert_eq!(bitmap.pixel(0, 0), Some(PAINT_RGBA));
}

// ── Incremental ─────────────────────────────────────────────────────

#[test]
fn k_continues_then_done_takes_k_plus_one_calls() {
    let (library, probe) = library();
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let render = page.start_render(&RenderOptions::new(200.0, 100.0)).unwrap();
    assert_eq!(page.borrow_count(), 1);

    for _ in 0..3 {
        assert_eq!(render.continue_render().unwrap(), ProgressStatus::Continuing);
    }
    assert_eq!(render.continue_render().unwrap(), ProgressStatus::Done);
    assert_eq!(render.steps(), 4);
    assert_eq!(probe.count(entry::RENDER_PAGE_CONTINUE), 4);

    let bitmap = render.result().unwrap();
    assert_eq!((bitmap.width, bitmap.height), (200, 100));
    assert!(bitmap.pixels.chunks_exact(4).all(|px| px == PAINT_RGBA));

    render.dispose().unwrap();
    assert_eq!(page.borrow_count(), 0);
    assert_eq!(probe.open(ObjectKind::ProgressiveRender), 0);
    assert_eq!(probe.open(ObjectKind::Bitmap), 0);
    assert_eq!(library.arena_stats().live_allocations, 1);
}

#[test]
fn continue_after_done_is_invalid() {
    let (library, _probe) = library();
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let render = page.start_render(&RenderOptions::new(20.0, 10.0)).unwrap();
    assert_eq!(render.run_to_completion().unwrap(), ProgressStatus::Done);
    match render.continue_render() {
        Err(Error::InvalidState { operation, state }) => {
            assert_eq!(operation, "continue_render");
            assert_eq!(state, "done");
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }
    assert!(render.result().is_ok());
}

#[test]
fn result_before_done_is_invalid() {
    let (library, _probe) = library();
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let render = page.start_render(&RenderOptions::new(20.0, 10.0)).unwrap();
    match render.result() {
        Err(Error::InvalidState { operation, state }) => {
            assert_eq!(operation, "result");
            assert_eq!(state, "continuing");
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }
}

#[test]
fn engine_finishing_on_start_begins_done() {
    let (library, probe) = single_page(FakePage {
        done_on_start: true,
        ..FakePage::sized(50.0, 50.0)
    });
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let render = page.start_render(&RenderOptions::new(5.0, 5.0)).unwrap();
    assert_eq!(render.status(), ProgressStatus::Done);
    assert_eq!(render.steps(), 0);
    assert!(render.result().is_ok());
    assert_eq!(probe.count(entry::RENDER_PAGE_CONTINUE), 0);
}

#[test]
fn failed_start_releases_everything() {
    let (library, probe) = single_page(FakePage {
        fail_on_step: Some(0),
        ..FakePage::sized(50.0, 50.0)
    });
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    match page.start_render(&RenderOptions::new(5.0, 5.0)) {
        Err(Error::EngineCall { call, .. }) => assert_eq!(call, entry::RENDER_PAGE_BITMAP_START),
        other => panic!("expected EngineCall, got {other:?}"),
    }
    assert_eq!(page.borrow_count(), 0);
    assert_eq!(probe.count(entry::RENDER_PAGE_CLOSE), 1);
    assert_eq!(probe.open(ObjectKind::ProgressiveRender), 0);
    assert_eq!(probe.open(ObjectKind::Bitmap), 0);
    assert_eq!(library.arena_stats().live_allocations, 1);
    assert!(page.start_render(&RenderOptions::new(5.0, 5.0)).is_err());
}

#[test]
fn failed_step_is_terminal() {
    let (library, _probe) = single_page(FakePage {
        fail_on_step: Some(2),
        progressive_steps: 5,
        ..FakePage::sized(50.0, 50.0)
    });
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let render = page.start_render(&RenderOptions::new(5.0, 5.0)).unwrap();
    assert_eq!(render.continue_render().unwrap(), ProgressStatus::Continuing);
    assert_eq!(render.continue_render().unwrap(), ProgressStatus::Failed);
    assert!(render.status().is_terminal());
    match render.continue_render() {
        Err(Error::InvalidState { state, .. }) => assert_eq!(state, "failed"),
        other => panic!("expected InvalidState, got {other:?}"),
    }
    match render.result() {
        Err(Error::InvalidState { state, .. }) => assert_eq!(state, "failed"),
        other => panic!("expected InvalidState, got {other:?}"),
    }
    render.dispose().unwrap();
    assert_eq!(page.borrow_count(), 0);
}

#[test]
fn dispose_mid_render_cancels() {
    let (library, probe) = library();
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let render = page.start_render(&RenderOptions::new(20.0, 10.0)).unwrap();
    render.continue_render().unwrap();

    render.dispose().unwrap();
    render.dispose().unwrap();
    assert_eq!(probe.count(entry::RENDER_PAGE_CLOSE), 1);
    assert_eq!(probe.open(ObjectKind::ProgressiveRender), 0);
    assert_eq!(page.borrow_count(), 0);
    assert!(render.continue_render().unwrap_err().is_disposed());
    assert_eq!(library.arena_stats().live_allocations, 1);
    probe.assert_no_violations();
}

#[test]
fn one_incremental_render_per_page() {
    let (library, probe) = library();
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let first = page.start_render(&RenderOptions::new(20.0, 10.0)).unwrap();
    match page.start_render(&RenderOptions::new(20.0, 10.0)) {
        Err(Error::InvalidState { operation, .. }) => assert_eq!(operation, "start_render"),
        other => panic!("expected InvalidState, got {other:?}"),
    }
    assert_eq!(page.borrow_count(), 1);
    assert_eq!(first.run_to_completion().unwrap(), ProgressStatus::Done);
    first.dispose().unwrap();

    let second = page.start_render(&RenderOptions::new(20.0, 10.0)).unwrap();
    assert_eq!(second.status(), ProgressStatus::Continuing);
    probe.assert_no_violations();
}

#[test]
fn one_shot_render_waits_for_incremental_render() {
    let (library, probe) = library();
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let render = page.start_render(&RenderOptions::new(20.0, 10.0)).unwrap();
    assert_eq!(render.continue_render().unwrap(), ProgressStatus::Continuing);
    let mallocs = probe.live_mallocs();

    match page.render(&RenderOptions::new(20.0, 10.0)) {
        Err(Error::InvalidState { operation, state }) => {
            assert_eq!(operation, "render");
            assert_eq!(state, "an incremental render is open on the page");
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }
    assert_eq!(probe.count(entry::RENDER_PAGE_BITMAP), 0);
    assert_eq!(probe.live_mallocs(), mallocs);
    assert_eq!(render.status(), ProgressStatus::Continuing);

    assert_eq!(render.run_to_completion().unwrap(), ProgressStatus::Done);
    render.dispose().unwrap();
    let bitmap = page.render(&RenderOptions::new(20.0, 10.0)).unwrap();
    assert!(bitmap.pixels.chunks_exact(4).all(|px| px == PAINT_RGBA));
    probe.assert_no_violations();
}

#[test]
fn default_limits_reject_bitmaps_the_arena_cannot_hold() {
    let (library, probe) = library();
    let doc = library.open_document(THREE_PAGES, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let before = library.arena_stats();
    match page.render(&RenderOptions::new(10_000.0, 10_000.0)) {
        Err(Error::Dimension(DimensionError::TooManyPixels { max_pixels, .. })) => {
            assert_eq!(max_pixels, RenderLimits::DEFAULT_MAX_PIXELS)
        }
        other => panic!("expected TooManyPixels, got {other:?}"),
    }
    assert_eq!(library.arena_stats(), before);
    assert_eq!(probe.count(entry::BITMAP_CREATE_EX), 0);
}

#[test]
fn render_keeps_disposed_page_alive() {
    let (library, probe) = library();
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let render = page.start_render(&RenderOptions::new(20.0, 10.0)).unwrap();
    page.dispose().unwrap();
    assert!(!page.is_released());

    assert_eq!(render.run_to_completion().unwrap(), ProgressStatus::Done);
    assert!(render.result().is_ok());
    render.dispose().unwrap();
    assert!(page.is_released());
    probe.assert_no_violations();
}

#[test]
fn force_disposed_document_invalidates_open_render() {
    let (library, probe) = library();
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    let render = page.start_render(&RenderOptions::new(20.0, 10.0)).unwrap();

    doc.force_dispose();
    assert!(page.is_released());
    assert!(render.continue_render().unwrap_err().is_disposed());
    render.dispose().unwrap();
    assert_eq!(probe.count(entry::RENDER_PAGE_CLOSE), 1);
    drop((render, page, doc, library));
    probe.assert_released();
}

#[test]
fn dropped_render_is_reclaimed() {
    let (library, probe) = library();
    let doc = library.open_document(PROGRESSIVE, None).unwrap();
    let page = doc.get_page(0).unwrap();
    {
        let render = page.start_render(&RenderOptions::new(20.0, 10.0)).unwrap();
        render.continue_render().unwrap();
    }
    assert_eq!(page.borrow_count(), 0);
    assert_eq!(probe.open(ObjectKind::ProgressiveRender), 0);
    assert_eq!(probe.open(ObjectKind::Bitmap), 0);
    assert_eq!(library.arena_stats().live_allocations, 1);
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn continue_count_is_steps_plus_one(k in 0u32..10) {
            let engine = FakeEngine::new().with_document(PROGRESSIVE, fixtures::progressive(k));
            let (library, _probe) = library_with(engine, LibraryConfig::default());
            let doc = library.open_document(PROGRESSIVE, None).unwrap();
            let page = doc.get_page(0).unwrap();
            let render = page.start_render(&RenderOptions::new(8.0, 4.0)).unwrap();
            let mut calls = 0;
            while render.status() == ProgressStatus::Continuing {
                render.continue_render().unwrap();
                calls += 1;
            }
            prop_assert_eq!(calls, k + 1);
            prop_assert_eq!(render.status(), ProgressStatus::Done);
        }
    }
}
