use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wasm_heap::{FreeingBumpAllocator, LegacyAllocator, LinearMemory, VecMemory};

fn bench_fresh_carve(c: &mut Criterion) {
    let mut group = c.benchmark_group("fresh_carve");
    for size in [16u32, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || (VecMemory::with_pages(64), FreeingBumpAllocator::new(0)),
                |(mut mem, mut heap)| {
                    for _ in 0..64 {
                        black_box(heap.allocate(&mut mem, size).ok());
                    }
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_reuse(c: &mut Criterion) {
    c.bench_function("freeing_bump_alloc_free_16bytes", |b| {
        let mut mem = VecMemory::with_pages(1);
        let mut heap = FreeingBumpAllocator::new(0);
        b.iter(|| {
            if let Ok(ptr) = heap.allocate(&mut mem, black_box(16)) {
                let _ = heap.deallocate(&mut mem, ptr);
            }
        });
    });

    c.bench_function("legacy_alloc_free_16bytes", |b| {
        let mut mem = VecMemory::with_pages(1);
        let Ok(mut heap) = LegacyAllocator::new(&mut mem, 0) else {
            return;
        };
        b.iter(|| {
            if let Ok(ptr) = heap.allocate(&mut mem, black_box(16)) {
                let _ = heap.deallocate(&mut mem, ptr);
            }
        });
    });
}

fn bench_growth(c: &mut Criterion) {
    c.bench_function("grow_from_empty_1mib", |b| {
        b.iter_batched(
            || (VecMemory::with_pages(0), FreeingBumpAllocator::new(0)),
            |(mut mem, mut heap)| {
                black_box(heap.allocate(&mut mem, 1 << 20).ok());
                black_box(mem.size())
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_fresh_carve, bench_reuse, bench_growth);
criterion_main!(benches);
