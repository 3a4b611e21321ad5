use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use strata_core::memory::RingBuffer;

const CAPACITY: u64 = 4 * 1024 * 1024;

fn bench_ring_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ring Buffer");

    // A frame's worth of uniform blocks, retiring the previous frame each time.
    group.bench_function("1000 uniform allocations per frame", |b| {
        let mut ring = RingBuffer::new(CAPACITY);
        let mut previous_end = 0;
        b.iter(|| {
            ring.retire(previous_end);
            ring.begin_frame();
            for _ in 0..1000 {
                black_box(ring.allocate(black_box(192), 256));
            }
            previous_end = ring.cursor();
        });
    });

    group.bench_function("Mixed sizes with wrap-around", |b| {
        let mut ring = RingBuffer::new(64 * 1024);
        b.iter(|| {
            for size in [16u64, 100, 4000, 64, 900] {
                let cursor = ring.cursor();
                ring.retire(cursor);
                black_box(ring.allocate(size, 16));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ring_buffer);
criterion_main!(benches);
