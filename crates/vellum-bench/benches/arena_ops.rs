//! Criterion micro-benchmarks for arena allocation and marshalling.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use vellum_arena::{Arena, ArenaConfig};
use vellum_test_utils::FakeEngine;

fn make_arena() -> std::rc::Rc<Arena<FakeEngine>> {
    Arena::new(FakeEngine::new(), ArenaConfig::default()).unwrap()
}

/// Benchmark: allocate and free a 64-byte block.
fn bench_alloc_free_64(c: &mut Criterion) {
    let arena = make_arena();
    c.bench_function("arena_alloc_free_64", |b| {
        b.iter(|| {
            let block = arena.alloc(black_box(64)).unwrap();
            block.free();
        });
    });
}

/// Benchmark: copy a 4 KiB buffer in through a scoped allocation.
fn bench_scoped_bytes_4k(c: &mut Criterion) {
    let arena = make_arena();
    let payload = vec![0xA5u8; 4096];
    c.bench_function("arena_scoped_bytes_4k", |b| {
        b.iter(|| {
            let scoped = arena.scoped_bytes(black_box(&payload)).unwrap();
            black_box(scoped.offset());
        });
    });
}

/// Benchmark: read back a 1 MiB block, the size of a 512x512 bitmap.
fn bench_read_1m(c: &mut Criterion) {
    let arena = make_arena();
    let block = arena.alloc(512 * 512 * 4).unwrap();
    block.fill(0x7F).unwrap();
    c.bench_function("arena_read_1m", |b| {
        b.iter(|| black_box(block.read().unwrap()));
    });
}

criterion_group!(benches, bench_alloc_free_64, bench_scoped_bytes_4k, bench_read_1m);
criterion_main!(benches);
