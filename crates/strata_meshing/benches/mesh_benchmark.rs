//! Benchmark for greedy meshing.
//!
//! Run with: cargo bench --package strata_meshing --bench mesh_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use strata_meshing::{GreedyMesher, MeshBuffers};
use strata_procedural::{ChunkGenerator, ChunkKey, GenerationSettings, Material, Voxel, VoxelPos, VoxelSet};

fn slab(n: i32) -> VoxelSet {
    (0..n)
        .flat_map(|z| (0..n).map(move |x| Voxel::generated(VoxelPos::new(x, 0, z), Material::Stone)))
        .collect()
}

fn benchmark_slab(c: &mut Criterion) {
    let mut group = c.benchmark_group("slab_mesh");
    for n in [8, 32] {
        let voxels = slab(n);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("{n}x{n}"), |b| {
            let mut mesher = GreedyMesher::new();
            b.iter(|| black_box(mesher.mesh(black_box(&voxels))));
        });
    }
    group.finish();
}

fn benchmark_generated_chunk(c: &mut Criterion) {
    let gen = match ChunkGenerator::new(GenerationSettings::with_seed(42)) {
        Ok(generator) => generator,
        Err(err) => panic!("default settings rejected: {err}"),
    };
    let voxels = gen.generate(ChunkKey::new(0, 0));

    c.bench_function("generated_chunk_mesh", |b| {
        let mut mesher = GreedyMesher::new();
        b.iter(|| black_box(mesher.mesh(black_box(&voxels))));
    });

    c.bench_function("generated_chunk_buffers", |b| {
        let quads = GreedyMesher::new().mesh(&voxels);
        b.iter(|| black_box(MeshBuffers::from_quads(black_box(&quads))));
    });
}

criterion_group! {
    name = benches;
    config = criterion::Criterion::default();
    targets = benchmark_slab,
              benchmark_generated_chunk
}

criterion_main!(benches);
