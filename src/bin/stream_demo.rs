//! Streaming demo: builds a synthetic building, streams it, then runs the
//! quality loop against synthetic frame times while orbiting the camera.
//!
//! Usage: cargo run --release --bin stream_demo -- [OPTIONS]
//!
//! Options:
//!   --floors <N>      Number of floors (default: 6)
//!   --frames <N>      Frames to simulate after loading (default: 240)
//!   --config <PATH>   JSON viewer config (default: built-in defaults)

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;

use scenekeeper::core::camera::Camera;
use scenekeeper::core::config::ViewerConfig;
use scenekeeper::core::logging;
use scenekeeper::core::time::FrameTimer;
use scenekeeper::core::types::Result;
use scenekeeper::quality::{RenderSettings, RenderTarget};
use scenekeeper::scene::mesh::{grid_geometry, quad_geometry};
use scenekeeper::scene::{LocalTransform, Material, Mesh, NodeContent, SceneGraph, Texture};
use scenekeeper::streaming::{ChunkSummary, LoadObserver};
use scenekeeper::SceneRuntime;

const FLOOR_HEIGHT: f32 = 3.5;
const BAY_WIDTH: f32 = 6.0;
const BAYS: usize = 4;

/// Logs loader events as they arrive
struct LogObserver;

impl LoadObserver for LogObserver {
    fn on_chunk_started(&mut self, chunk: &ChunkSummary) {
        log::debug!(
            "{} ({}) started: {} objects, {} bytes",
            chunk.id,
            chunk.priority,
            chunk.member_count,
            chunk.estimated_size
        );
    }

    fn on_progress(&mut self, loaded: usize, total: usize) {
        log::info!("Loaded {}/{} chunks", loaded, total);
    }

    fn on_chunk_failed(&mut self, chunk: &ChunkSummary, error: &scenekeeper::core::Error) {
        log::warn!("{} failed: {}", chunk.id, error);
    }
}

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let floors = parse_usize_arg(&args, "--floors").unwrap_or(6);
    let frames = parse_usize_arg(&args, "--frames").unwrap_or(240);
    let config = match parse_str_arg(&args, "--config") {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()?;

    runtime.block_on(run(config, floors, frames))
}

async fn run(config: ViewerConfig, floors: usize, frames: usize) -> Result<()> {
    let mut graph = build_scene(floors);
    log::info!("Built building with {} floors, {} nodes", floors, graph.node_count());

    let mut viewer = SceneRuntime::new(config)?;
    let loading = viewer.load(&mut graph, &mut LogObserver).await;
    for chunk in viewer.loader().chunks() {
        log::debug!("Plan: {}", serde_json::to_string(chunk)?);
    }
    log::info!("Loading stats: {}", serde_json::to_string(&loading)?);
    log::info!("Resource stats: {}", serde_json::to_string(&viewer.resource_stats())?);

    let mut timer = FrameTimer::default();
    let mut render = RenderSettings::new(2.0);
    let center = Vec3::new(BAY_WIDTH * BAYS as f32 * 0.5, floors as f32 * FLOOR_HEIGHT * 0.5, 0.0);

    for frame in 0..frames {
        let angle = frame as f32 / frames.max(1) as f32 * std::f32::consts::TAU;
        let radius = 30.0 + 90.0 * (0.5 - 0.5 * angle.cos());
        let position = center + Vec3::new(angle.sin() * radius, 5.0, angle.cos() * radius);
        let camera = Camera::look_at(position, center, Vec3::Y);

        timer.set_render_counters(
            viewer.optimization_stats(&graph).visible_object_count as u32,
            0,
            viewer.resource_stats().total_size as f32 / (1024.0 * 1024.0),
        );
        timer.record_frame(synthetic_frame_time(frame, frames, &render));

        let report = viewer.tick(&mut graph, &camera, &mut timer, &mut render);
        if let Some(level) = report.quality.transition {
            log::info!("Frame {}: quality now {:?}", frame, level);
        }
    }

    log::info!("Optimization stats: {}", serde_json::to_string(&viewer.optimization_stats(&graph))?);
    log::info!("Frame timing: {:?}", timer.fps_window());

    viewer.teardown(&mut graph);
    log::info!("Resource stats after teardown: {}", serde_json::to_string(&viewer.resource_stats())?);
    Ok(())
}

/// A heavy middle stretch, cheaper when the controller has lowered quality
fn synthetic_frame_time(frame: usize, frames: usize, render: &RenderSettings) -> Duration {
    let heavy = frame > frames / 4 && frame < frames / 2;
    let mut ms = if heavy { 28.0 } else { 10.0 };
    if !render.shadows_enabled() {
        ms *= 0.8;
    }
    ms *= render.pixel_ratio() / 2.0;
    Duration::from_secs_f32(ms / 1000.0)
}

fn build_scene(floors: usize) -> SceneGraph {
    let mut graph = SceneGraph::new();
    let root = graph.root();

    let concrete = Arc::new(Material::lit("concrete", Vec3::splat(0.72)));
    let glass_map = Arc::new(Texture::solid("glass_tint", 64, 64, [90, 130, 160, 200]));
    let glass = Arc::new(Material::lit("glass", Vec3::new(0.4, 0.55, 0.65)).with_map(glass_map));
    let brass = Arc::new(Material::lit("brass", Vec3::new(0.78, 0.6, 0.3)));
    let oak = Arc::new(Material::lit("oak", Vec3::new(0.55, 0.4, 0.25)));

    let column_geometry = Arc::new(grid_geometry("column", 0.6, FLOOR_HEIGHT, 4, 16));
    let panel_geometry = Arc::new(grid_geometry("panel", BAY_WIDTH, FLOOR_HEIGHT, 24, 12));
    let trim_geometry = Arc::new(quad_geometry("trim", BAY_WIDTH, 0.3));
    let chair_geometry = Arc::new(grid_geometry("chair", 0.6, 0.9, 6, 6));

    for floor in 0..floors {
        let floor_group = graph.add_child(root, format!("floor_{}", floor), NodeContent::Group);
        graph.set_transform(
            floor_group,
            LocalTransform::from_position(Vec3::new(0.0, floor as f32 * FLOOR_HEIGHT, 0.0)),
        );

        let slab = Arc::new(Mesh::new(
            format!("slab_{}", floor),
            Arc::new(grid_geometry(format!("slab_{}", floor), BAY_WIDTH * BAYS as f32, 12.0, 32, 16)),
            vec![concrete.clone()],
        ));
        graph.add_mesh(floor_group, format!("slab_{}", floor), slab, LocalTransform::identity());

        for bay in 0..=BAYS {
            let x = bay as f32 * BAY_WIDTH;
            let name = format!("column_{}_{}", floor, bay);
            let mesh = Arc::new(Mesh::new(name.clone(), column_geometry.clone(), vec![concrete.clone()]));
            graph.add_mesh(floor_group, name, mesh, LocalTransform::from_position(Vec3::new(x, 0.0, 0.0)));
        }

        for bay in 0..BAYS {
            let x = (bay as f32 + 0.5) * BAY_WIDTH;
            let panel = format!("facade_panel_{}_{}", floor, bay);
            let mesh = Arc::new(Mesh::new(panel.clone(), panel_geometry.clone(), vec![glass.clone()]));
            graph.add_mesh(floor_group, panel, mesh, LocalTransform::from_position(Vec3::new(x, 0.0, 6.0)));

            let trim = format!("trim_{}_{}", floor, bay);
            let mesh = Arc::new(Mesh::new(trim.clone(), trim_geometry.clone(), vec![brass.clone()]));
            graph.add_mesh(
                floor_group,
                trim,
                mesh,
                LocalTransform::from_position(Vec3::new(x, FLOOR_HEIGHT - 0.3, 6.1)),
            );

            let chair = format!("chair_{}_{}", floor, bay);
            let mesh = Arc::new(Mesh::new(chair.clone(), chair_geometry.clone(), vec![oak.clone()]));
            graph.add_mesh(floor_group, chair, mesh, LocalTransform::from_position(Vec3::new(x, 0.0, 2.0)));
        }
    }

    graph
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    parse_str_arg(args, flag).and_then(|v| v.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
