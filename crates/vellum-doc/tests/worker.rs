//! Integration tests: rendering on a background worker.

use std::thread;

use vellum_core::{ConfigError, EngineErrorCode, Error};
use vellum_doc::{RenderOptions, RenderWorker, WorkerConfig};
use vellum_test_utils::fixtures::{self, LOCKED, LOCKED_PASSWORD, SAMPLE, THREE_PAGES};
use vellum_test_utils::DEFAULT_PAINT;

const PAINT_RGBA: [u8; 4] = [DEFAULT_PAINT[2], DEFAULT_PAINT[1], DEFAULT_PAINT[0], DEFAULT_PAINT[3]];

fn worker() -> RenderWorker {
    vellum_test_utils::init_tracing();
    RenderWorker::spawn(fixtures::engine, WorkerConfig::default()).unwrap()
}

#[test]
fn worker_renders_a_page() {
    let worker = worker();
    assert!(worker.is_running());
    let bitmap = worker.render(SAMPLE, None, 0, RenderOptions::new(8.0, 6.0)).unwrap();
    assert_eq!((bitmap.width, bitmap.height), (8, 6));
    assert!(bitmap.pixels.chunks_exact(4).all(|px| px == PAINT_RGBA));
}

#[test]
fn submitted_jobs_complete_in_order() {
    let mut worker = worker();
    let tickets: Vec<_> = (0..3)
        .map(|index| {
            let options = RenderOptions::new(2.0 + index as f64, 2.0);
            worker.submit(THREE_PAGES, None, index, options).unwrap()
        })
        .collect();
    let widths: Vec<u32> = tickets.into_iter().map(|t| t.wait().unwrap().width).collect();
    assert_eq!(widths, vec![2, 3, 4]);
    assert_eq!(worker.shutdown(), 3);
}

#[test]
fn job_errors_are_returned_to_the_caller() {
    let worker = worker();
    match worker.render(b"not a pdf", None, 0, RenderOptions::new(4.0, 4.0)) {
        Err(Error::DocumentLoadFailed { code }) => assert_eq!(code, EngineErrorCode::Format),
        other => panic!("expected DocumentLoadFailed, got {other:?}"),
    }
    match worker.render(THREE_PAGES, None, 9, RenderOptions::new(4.0, 4.0)) {
        Err(Error::PageIndexOutOfRange { index: 9, count: 3 }) => {}
        other => panic!("expected PageIndexOutOfRange, got {other:?}"),
    }
    // A failed job leaves the worker serving.
    assert!(worker.render(SAMPLE, None, 0, RenderOptions::new(1.0, 1.0)).is_ok());
}

#[test]
fn passwords_cross_the_queue() {
    let worker = worker();
    let bitmap = worker
        .render(LOCKED, Some(LOCKED_PASSWORD), 0, RenderOptions::new(3.0, 3.0))
        .unwrap();
    assert_eq!(bitmap.pixels.len(), 3 * 3 * 4);
}

#[test]
fn shutdown_is_idempotent_and_stops_submissions() {
    let mut worker = worker();
    worker.render(SAMPLE, None, 0, RenderOptions::new(1.0, 1.0)).unwrap();
    assert_eq!(worker.shutdown(), 1);
    assert_eq!(worker.shutdown(), 0);
    assert!(!worker.is_running());
    match worker.submit(SAMPLE, None, 0, RenderOptions::new(1.0, 1.0)) {
        Err(Error::InvalidState { operation: "submit", .. }) => {}
        other => panic!("expected InvalidState, got {other:?}"),
    }
}

#[test]
fn zero_queue_capacity_is_rejected() {
    let config = WorkerConfig {
        queue_capacity: 0,
        ..WorkerConfig::default()
    };
    match RenderWorker::spawn(fixtures::engine, config) {
        Err(Error::Config(ConfigError::Zero { field: "queue_capacity" })) => {}
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn engine_is_built_on_the_worker_thread() {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let config = WorkerConfig {
        thread_name: "vellum-test-worker".to_string(),
        ..WorkerConfig::default()
    };
    let worker = RenderWorker::spawn(
        move || {
            let _ = tx.send(thread::current().name().map(str::to_owned));
            fixtures::engine()
        },
        config,
    )
    .unwrap();
    assert_eq!(rx.recv().unwrap().as_deref(), Some("vellum-test-worker"));
    assert_ne!(thread::current().name(), Some("vellum-test-worker"));
    drop(worker);
}
