//! Kind-specific release of disposed resources.
//!
//! Composite payloads only release children that nothing else holds: a child
//! with its own registry record, or with another live `Arc` holder, is left
//! alone.

use std::sync::Arc;

use serde::Serialize;

use crate::scene::{Geometry, Material, Mesh, NodeContent, SceneGraph, Texture};

use super::id::{IdentityKey, ResourceKind};
use super::registry::Resource;

/// Running totals of released payloads, including cascaded children
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseCounters {
    pub geometries: u64,
    pub materials: u64,
    pub textures: u64,
    pub meshes: u64,
    pub scenes: u64,
    pub lights: u64,
    /// Scene nodes unlinked from their parent during scene teardown
    pub detached_nodes: u64,
}

impl ReleaseCounters {
    /// Released GPU-backed payloads (geometry, material, texture)
    pub fn buffers(&self) -> u64 {
        self.geometries + self.materials + self.textures
    }
}

/// Answers whether a payload still has its own registry record.
pub(crate) type TrackedFn<'a> = &'a dyn Fn(IdentityKey) -> bool;

/// Release a payload whose record was just removed from the registry.
pub(crate) fn release(resource: Resource, tracked: TrackedFn<'_>, counters: &mut ReleaseCounters) {
    match resource {
        Resource::Geometry(geometry) => {
            log::trace!("Releasing geometry '{}' ({} buffers)", geometry.name, geometry.buffer_count());
            counters.geometries += 1;
        }
        Resource::Material(material) => {
            counters.materials += 1;
            if let Ok(material) = Arc::try_unwrap(material) {
                if let Some(map) = material.map {
                    release_texture(map, tracked, counters);
                }
            }
        }
        Resource::Texture(texture) => {
            log::trace!("Releasing texture '{}' ({}x{})", texture.name, texture.width, texture.height);
            counters.textures += 1;
        }
        Resource::Mesh(mesh) => {
            counters.meshes += 1;
            release_mesh_children(mesh, tracked, counters);
        }
        Resource::Scene(graph) => release_scene(graph, tracked, counters),
    }
}

fn release_mesh_children(mesh: Arc<Mesh>, tracked: TrackedFn<'_>, counters: &mut ReleaseCounters) {
    let mesh = match Arc::try_unwrap(mesh) {
        Ok(mesh) => mesh,
        Err(shared) => {
            log::trace!("Mesh '{}' is still held elsewhere, keeping its children", shared.name);
            return;
        }
    };

    release_geometry(mesh.geometry, tracked, counters);
    for material in mesh.materials {
        release_material(material, tracked, counters);
    }
}

fn release_geometry(geometry: Arc<Geometry>, tracked: TrackedFn<'_>, counters: &mut ReleaseCounters) {
    if tracked(IdentityKey::of(ResourceKind::Geometry, &geometry)) {
        return;
    }
    if Arc::strong_count(&geometry) == 1 {
        counters.geometries += 1;
    }
}

fn release_material(material: Arc<Material>, tracked: TrackedFn<'_>, counters: &mut ReleaseCounters) {
    if tracked(IdentityKey::of(ResourceKind::Material, &material)) {
        return;
    }
    if let Ok(material) = Arc::try_unwrap(material) {
        counters.materials += 1;
        if let Some(map) = material.map {
            release_texture(map, tracked, counters);
        }
    }
}

fn release_texture(texture: Arc<Texture>, tracked: TrackedFn<'_>, counters: &mut ReleaseCounters) {
    if tracked(IdentityKey::of(ResourceKind::Texture, &texture)) {
        return;
    }
    if Arc::strong_count(&texture) == 1 {
        counters.textures += 1;
    }
}

/// Walk the scene depth-first, children before parents, releasing mesh and
/// light nodes and unlinking each from its parent.
fn release_scene(mut graph: SceneGraph, tracked: TrackedFn<'_>, counters: &mut ReleaseCounters) {
    let mut order = graph.depth_first(graph.root());
    order.reverse();

    for id in order {
        let releasable = graph
            .get(id)
            .is_some_and(|n| matches!(n.content, NodeContent::Mesh(_) | NodeContent::Light(_)));
        if !releasable {
            continue;
        }
        let Some(node) = graph.take(id) else {
            continue;
        };
        counters.detached_nodes += 1;

        match node.content {
            NodeContent::Mesh(mesh_node) => {
                if !tracked(IdentityKey::of(ResourceKind::Mesh, &mesh_node.mesh)) {
                    counters.meshes += 1;
                    release_mesh_children(mesh_node.mesh, tracked, counters);
                }
            }
            NodeContent::Light(_) => counters.lights += 1,
            NodeContent::Group => {}
        }
    }

    counters.scenes += 1;
    log::debug!("Released scene, {} nodes remain", graph.node_count());
}
