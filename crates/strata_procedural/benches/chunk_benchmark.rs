//! Benchmark for chunk generation performance.
//!
//! Run with: cargo bench --package strata_procedural --bench chunk_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use strata_procedural::{ChunkGenerator, ChunkKey, GenerationSettings};

fn generator() -> ChunkGenerator {
    match ChunkGenerator::new(GenerationSettings::with_seed(42)) {
        Ok(generator) => generator,
        Err(err) => panic!("default settings rejected: {err}"),
    }
}

fn benchmark_single_chunk(c: &mut Criterion) {
    let gen = generator();

    c.bench_function("single_chunk_generation", |b| {
        let mut coord = 0i32;
        b.iter(|| {
            coord = coord.wrapping_add(1);
            black_box(gen.generate(ChunkKey::new(coord, coord / 2)))
        });
    });
}

fn benchmark_chunk_grid(c: &mut Criterion) {
    let gen = generator();

    let mut group = c.benchmark_group("chunk_grid");
    group.sample_size(10);

    // 16x16 chunks = 128x128 columns
    group.throughput(Throughput::Elements(16 * 16));
    group.bench_function("16x16_chunks", |b| {
        b.iter(|| {
            gen.clear_cache();
            for z in 0..16 {
                for x in 0..16 {
                    black_box(gen.generate(ChunkKey::new(x, z)));
                }
            }
        });
    });

    group.finish();
}

fn benchmark_biome_classification(c: &mut Criterion) {
    let gen = generator();
    let classifier = gen.columns().classifier();

    c.bench_function("biome_classification_per_column", |b| {
        let mut x = 0i32;
        b.iter(|| {
            // Fresh coordinates every time so the descriptor cache never hits.
            x = x.wrapping_add(1);
            black_box(classifier.classify(black_box(x), black_box(x / 3)))
        });
    });
}

fn benchmark_column_build(c: &mut Criterion) {
    let gen = generator();

    c.bench_function("column_build", |b| {
        let mut x = 0i32;
        b.iter(|| {
            x = x.wrapping_add(1);
            black_box(gen.columns().build_column(black_box(x), black_box(-x)))
        });
    });
}

criterion_group! {
    name = benches;
    config = criterion::Criterion::default();
    targets = benchmark_single_chunk,
              benchmark_chunk_grid,
              benchmark_biome_classification,
              benchmark_column_build
}

criterion_main!(benches);
