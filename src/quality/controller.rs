//! Adaptive quality controller.
//!
//! Each tick runs three independent axes:
//! - visibility: every mesh node outside the camera frustum is flagged `culled`,
//! - detail: tracked objects draw the LOD variant matching their distance,
//! - global quality: pixel ratio and shadows follow a two-state hysteresis
//!   driven by the newest metrics sample.
//!
//! LOD variants are registry resources. Objects sharing an original mesh share
//! its variants; the variants are disposed when the last such object is untracked.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::core::camera::Camera;
use crate::core::config::QualityConfig;
use crate::core::types::Result;
use crate::resource::{lock, ResourceId, ResourceRegistry, SharedRegistry};
use crate::scene::{Mesh, SceneGraph, SceneNodeId};

use super::lod::build_variants;
use super::metrics::{MetricsSource, SampleWindow};
use super::render::RenderTarget;

/// Drop to `Reduced` below this fraction of the target frame rate
pub const DOWNGRADE_FPS_RATIO: f32 = 0.8;
/// Return to `Nominal` above this fraction of the target frame rate
pub const UPGRADE_FPS_RATIO: f32 = 1.2;
/// Pixel ratio multipliers applied on each transition
pub const DOWNGRADE_PIXEL_SCALE: f32 = 0.8;
pub const UPGRADE_PIXEL_SCALE: f32 = 1.1;

/// Global quality state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum QualityLevel {
    #[default]
    Nominal,
    Reduced,
}

/// Process-wide quality settings owned by the controller
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QualityState {
    pub level: QualityLevel,
    pub pixel_ratio: f32,
    pub shadows_enabled: bool,
}

/// Snapshot returned by [`QualityController::optimization_stats`]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimizationStats {
    pub lod_variant_count: usize,
    pub visible_object_count: usize,
    pub total_object_count: usize,
    pub current_pixel_ratio: f32,
    pub quality_level: QualityLevel,
    pub shadows_enabled: bool,
    pub average_fps: f32,
}

/// What changed during one tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub culled: usize,
    pub lod_switches: usize,
    pub transition: Option<QualityLevel>,
}

/// One registered variant of an original mesh
struct LodVariant {
    level: usize,
    mesh: Arc<Mesh>,
    mesh_id: ResourceId,
    geometry_id: ResourceId,
}

/// Variants of one original mesh, shared by every object drawing it
struct LodSet {
    /// Sorted by level; empty when simplification failed
    variants: Vec<LodVariant>,
    users: usize,
}

impl LodSet {
    /// Variant drawn at `level`: the nearest simplified level at or below it
    fn variant_for(&self, level: usize) -> Option<&LodVariant> {
        self.variants.iter().rev().find(|v| v.level <= level)
    }
}

struct TrackedObject {
    original: ResourceId,
    level: usize,
}

/// Closed-loop controller trading detail for frame rate.
pub struct QualityController {
    config: QualityConfig,
    registry: SharedRegistry,
    state: QualityState,
    started: bool,
    window: SampleWindow,
    objects: BTreeMap<SceneNodeId, TrackedObject>,
    lod_sets: HashMap<ResourceId, LodSet>,
}

impl QualityController {
    pub fn new(config: QualityConfig, registry: SharedRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            window: SampleWindow::new(config.sample_window),
            state: QualityState {
                level: QualityLevel::Nominal,
                pixel_ratio: config.max_pixel_ratio,
                shadows_enabled: true,
            },
            config,
            registry,
            started: false,
            objects: BTreeMap::new(),
            lod_sets: HashMap::new(),
        })
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn state(&self) -> &QualityState {
        &self.state
    }

    /// Put the render target at full quality. Called by the first tick if not before.
    pub fn start(&mut self, render: &mut dyn RenderTarget) {
        let ratio = self.pixel_ratio_cap(render);
        render.set_pixel_ratio(ratio);
        render.set_shadows_enabled(true);
        self.state = QualityState {
            level: QualityLevel::Nominal,
            pixel_ratio: ratio,
            shadows_enabled: true,
        };
        self.window.clear();
        self.started = true;
        log::debug!("Quality controller started at pixel ratio {:.2}", ratio);
    }

    fn pixel_ratio_cap(&self, render: &dyn RenderTarget) -> f32 {
        self.config.max_pixel_ratio.min(render.device_pixel_ratio()).max(1.0)
    }

    /// Build (or share) LOD variants for a mesh node whose mesh is registered as `original`.
    ///
    /// Returns `true` when the object has at least one simplified variant. A
    /// mesh that cannot be simplified is still tracked and drawn at full detail.
    pub fn track(&mut self, graph: &SceneGraph, node: SceneNodeId, original: ResourceId) -> bool {
        if let Some(object) = self.objects.get(&node) {
            return self.lod_sets.get(&object.original).is_some_and(|s| !s.variants.is_empty());
        }
        let Some(mesh) = graph.get(node).and_then(|n| n.mesh()).map(|m| m.mesh.clone()) else {
            log::debug!("track({:?}): not a mesh node", node);
            return false;
        };

        if !self.lod_sets.contains_key(&original) {
            let set = {
                let mut registry = lock(&self.registry);
                self.build_lod_set(&mut registry, &mesh)
            };
            self.lod_sets.insert(original, set);
        }

        let Some(set) = self.lod_sets.get_mut(&original) else {
            return false;
        };
        set.users += 1;
        self.objects.insert(node, TrackedObject { original, level: 0 });
        !set.variants.is_empty()
    }

    fn build_lod_set(&self, registry: &mut ResourceRegistry, mesh: &Mesh) -> LodSet {
        let built = match build_variants(mesh, &self.config.lod) {
            Ok(built) => built,
            Err(e) => {
                log::warn!("Keeping '{}' at full detail: {}", mesh.name, e);
                return LodSet {
                    variants: Vec::new(),
                    users: 0,
                };
            }
        };

        let mut variants = Vec::with_capacity(built.len());
        for variant in built {
            let mesh = Arc::new(variant.mesh);
            let registered = registry.acquire(mesh.geometry.clone()).and_then(|geometry_id| {
                match registry.register(mesh.clone(), None) {
                    Ok(mesh_id) => Ok((geometry_id, mesh_id)),
                    Err(e) => {
                        registry.remove_reference(geometry_id);
                        Err(e)
                    }
                }
            });

            match registered {
                Ok((geometry_id, mesh_id)) => variants.push(LodVariant {
                    level: variant.level,
                    mesh,
                    mesh_id,
                    geometry_id,
                }),
                Err(e) => {
                    log::warn!("Dropping LOD {} of '{}': {}", variant.level, mesh.name, e);
                }
            }
        }

        log::debug!("Built {} LOD variants", variants.len());
        LodSet { variants, users: 0 }
    }

    /// Stop managing `node`: restore full detail and clear its culled flag.
    pub fn untrack(&mut self, graph: &mut SceneGraph, node: SceneNodeId) {
        let Some(object) = self.objects.remove(&node) else {
            return;
        };
        if let Some(scene_node) = graph.get_mut(node) {
            scene_node.culled = false;
            if let Some(mesh) = scene_node.mesh_mut() {
                mesh.lod = None;
            }
        }

        let last_user = match self.lod_sets.get_mut(&object.original) {
            Some(set) => {
                set.users = set.users.saturating_sub(1);
                set.users == 0
            }
            None => false,
        };
        if last_user {
            if let Some(set) = self.lod_sets.remove(&object.original) {
                self.dispose_set(set);
            }
        }
    }

    /// Release the controller's references to a set's variants and dispose
    /// whatever nothing else holds.
    fn dispose_set(&self, set: LodSet) {
        let mut registry = lock(&self.registry);
        for LodVariant { mesh, mesh_id, geometry_id, .. } in set.variants {
            drop(mesh);
            registry.remove_reference(mesh_id);
            registry.dispose(mesh_id, false);
            registry.remove_reference(geometry_id);
            registry.dispose(geometry_id, false);
        }
    }

    /// One control-loop step.
    pub fn tick(
        &mut self,
        graph: &mut SceneGraph,
        camera: &Camera,
        metrics: &mut dyn MetricsSource,
        render: &mut dyn RenderTarget,
    ) -> TickReport {
        if !self.started {
            self.start(render);
        }

        let mut report = TickReport::default();
        let frustum = camera.frustum();

        for id in graph.drawables() {
            let Some(bounds) = graph.world_bounds(id) else {
                continue;
            };
            let culled = !frustum.intersects_aabb(&bounds);
            if culled {
                report.culled += 1;
            }

            if let Some(object) = self.objects.get_mut(&id) {
                let level = self.config.lod.level_for_distance(camera.distance_to(&bounds));
                let set = self.lod_sets.get(&object.original);
                let current = set.and_then(|s| s.variant_for(object.level)).map(|v| v.mesh_id);
                let next = set.and_then(|s| s.variant_for(level));
                if current != next.map(|v| v.mesh_id) {
                    report.lod_switches += 1;
                }
                object.level = level;
                if let Some(mesh) = graph.get_mut(id).and_then(|n| n.mesh_mut()) {
                    mesh.lod = next.map(|v| v.mesh.clone());
                }
            }

            if let Some(node) = graph.get_mut(id) {
                node.culled = culled;
            }
        }

        self.touch_drawn(graph);

        if self.config.adaptive_quality {
            if let Some(sample) = metrics.sample() {
                self.window.push(sample);
                report.transition = self.evaluate(sample.fps(), render);
            }
        }

        report
    }

    /// Keep what is on screen fresh for stale-resource cleanup
    fn touch_drawn(&self, graph: &SceneGraph) {
        let mut registry = lock(&self.registry);
        for (node, object) in &self.objects {
            if !graph.get(*node).is_some_and(|n| n.is_rendered()) {
                continue;
            }
            let variant = self
                .lod_sets
                .get(&object.original)
                .and_then(|s| s.variant_for(object.level));
            registry.touch(variant.map_or(object.original, |v| v.mesh_id));
        }
    }

    /// Hysteresis step on the global quality axis
    fn evaluate(&mut self, fps: f32, render: &mut dyn RenderTarget) -> Option<QualityLevel> {
        let target = self.config.target_fps;
        match self.state.level {
            QualityLevel::Nominal if fps < target * DOWNGRADE_FPS_RATIO => {
                let ratio = (render.pixel_ratio() * DOWNGRADE_PIXEL_SCALE).max(1.0);
                render.set_pixel_ratio(ratio);
                render.set_shadows_enabled(false);
                self.state = QualityState {
                    level: QualityLevel::Reduced,
                    pixel_ratio: ratio,
                    shadows_enabled: false,
                };
                log::info!("Quality reduced: {:.1} fps, pixel ratio {:.2}, shadows off", fps, ratio);
                Some(QualityLevel::Reduced)
            }
            QualityLevel::Reduced if fps > target * UPGRADE_FPS_RATIO => {
                let ratio = (render.pixel_ratio() * UPGRADE_PIXEL_SCALE).min(self.pixel_ratio_cap(render));
                render.set_pixel_ratio(ratio);
                render.set_shadows_enabled(true);
                self.state = QualityState {
                    level: QualityLevel::Nominal,
                    pixel_ratio: ratio,
                    shadows_enabled: true,
                };
                log::info!("Quality restored: {:.1} fps, pixel ratio {:.2}, shadows on", fps, ratio);
                Some(QualityLevel::Nominal)
            }
            _ => None,
        }
    }

    pub fn is_tracked(&self, node: SceneNodeId) -> bool {
        self.objects.contains_key(&node)
    }

    /// Registry id of the variant `node` currently draws, `None` at full detail
    pub fn active_variant(&self, node: SceneNodeId) -> Option<ResourceId> {
        let object = self.objects.get(&node)?;
        self.lod_sets
            .get(&object.original)?
            .variant_for(object.level)
            .map(|v| v.mesh_id)
    }

    pub fn lod_variant_count(&self) -> usize {
        self.lod_sets.values().map(|s| s.variants.len()).sum()
    }

    pub fn average_fps(&self) -> f32 {
        self.window.average_fps()
    }

    pub fn optimization_stats(&self, graph: &SceneGraph) -> OptimizationStats {
        OptimizationStats {
            lod_variant_count: self.lod_variant_count(),
            visible_object_count: graph.render_list().len(),
            total_object_count: graph.drawables().len(),
            current_pixel_ratio: self.state.pixel_ratio,
            quality_level: self.state.level,
            shadows_enabled: self.state.shadows_enabled,
            average_fps: self.average_fps(),
        }
    }

    /// Dispose every variant, restore full detail and clear every culled flag.
    pub fn shutdown(&mut self, graph: &mut SceneGraph) {
        for id in graph.drawables() {
            if let Some(node) = graph.get_mut(id) {
                node.culled = false;
                if let Some(mesh) = node.mesh_mut() {
                    mesh.lod = None;
                }
            }
        }

        let variant_count = self.lod_variant_count();
        self.objects.clear();
        for (_, set) in std::mem::take(&mut self.lod_sets) {
            self.dispose_set(set);
        }
        self.window.clear();
        self.started = false;
        log::info!("Quality controller shut down, {} LOD variants released", variant_count);
    }
}
