use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec3;

use scenekeeper::quality::lod::{build_variants, decimate, LodConfig};
use scenekeeper::scene::mesh::grid_geometry;
use scenekeeper::scene::{LocalTransform, Material, Mesh, SceneGraph};
use scenekeeper::streaming::{collect_members, plan_chunks, LoadPriority};

const NAMES: [&str; 6] = ["column", "facade_panel", "window", "trim", "railing", "prop"];

fn synthetic_graph(objects: usize) -> SceneGraph {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let material = Arc::new(Material::lit("concrete", Vec3::splat(0.7)));
    let geometry = Arc::new(grid_geometry("cell", 1.0, 1.0, 8, 8));
    for i in 0..objects {
        let name = format!("{}_{}", NAMES[i % NAMES.len()], i);
        let mesh = Arc::new(Mesh::new(name.clone(), geometry.clone(), vec![material.clone()]));
        let position = Vec3::new((i % 32) as f32 * 2.0, 0.0, (i / 32) as f32 * 2.0);
        graph.add_mesh(root, name, mesh, LocalTransform::from_position(position));
    }
    graph
}

fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_names", |b| {
        b.iter(|| {
            for name in NAMES {
                black_box(LoadPriority::classify(black_box(name), 500));
            }
        });
    });
}

fn bench_plan_chunks_1k(c: &mut Criterion) {
    let graph = synthetic_graph(1_000);

    c.bench_function("plan_chunks_1k", |b| {
        b.iter(|| {
            let members = collect_members(black_box(&graph));
            plan_chunks(members, black_box(64 * 1024))
        });
    });
}

fn bench_plan_chunks_10k(c: &mut Criterion) {
    let graph = synthetic_graph(10_000);

    c.bench_function("plan_chunks_10k", |b| {
        b.iter(|| {
            let members = collect_members(black_box(&graph));
            plan_chunks(members, black_box(256 * 1024))
        });
    });
}

fn bench_decimate_grid(c: &mut Criterion) {
    // 128x128 cells, 32768 triangles
    let geometry = grid_geometry("grid", 10.0, 10.0, 128, 128);

    c.bench_function("decimate_grid_75", |b| {
        b.iter(|| decimate(black_box(&geometry), black_box(0.75)));
    });
}

fn bench_build_variants(c: &mut Criterion) {
    let mesh = Mesh::new(
        "facade",
        Arc::new(grid_geometry("facade", 10.0, 10.0, 64, 64)),
        vec![Arc::new(Material::lit("facade", Vec3::ONE))],
    );
    let config = LodConfig::default();

    c.bench_function("build_variants_default_levels", |b| {
        b.iter(|| build_variants(black_box(&mesh), black_box(&config)));
    });
}

criterion_group!(
    benches,
    bench_classify,
    bench_plan_chunks_1k,
    bench_plan_chunks_10k,
    bench_decimate_grid,
    bench_build_variants,
);
criterion_main!(benches);
