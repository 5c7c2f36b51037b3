//! Progressive loader: activates planned chunks under a concurrency cap.
//!
//! Activation of a chunk has three phases:
//! 1. every member's mesh, geometry, materials and textures are acquired in
//!    the shared registry (synchronously, under one lock),
//! 2. a stagger delay of `priority index * priority_delay` runs as a task in a
//!    `JoinSet` so lower priorities appear later,
//! 3. once the delay finishes the members are made visible together and the
//!    chunk is marked loaded.
//!
//! At most `max_concurrent_chunks` chunks are between phase 1 and 3 at any time.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::core::config::StreamingConfig;
use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::resource::{lock, ResourceId, ResourceRegistry, SharedRegistry};
use crate::scene::{Mesh, SceneGraph, SceneNodeId};

use super::chunk::{collect_members, plan_chunks, ChunkId, ChunkSummary, LoadingChunk};
use super::culling::{apply_distance_culling, CullingReport, DistanceThresholds};

/// Callbacks invoked from the loader's execution loop. All default to no-ops.
pub trait LoadObserver {
    fn on_chunk_started(&mut self, _chunk: &ChunkSummary) {}

    /// Reported after each successfully loaded chunk
    fn on_progress(&mut self, _loaded: usize, _total: usize) {}

    fn on_chunk_loaded(&mut self, _chunk: &ChunkSummary) {}

    fn on_chunk_failed(&mut self, _chunk: &ChunkSummary, _error: &Error) {}
}

/// Observer that ignores every event
pub struct NoopObserver;

impl LoadObserver for NoopObserver {}

/// Snapshot returned by [`ProgressiveLoader::loading_stats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadingStats {
    pub total_chunks: usize,
    pub loaded_chunks: usize,
    pub failed_chunks: usize,
    pub active_loads: usize,
    pub queued_chunks: usize,
    pub total_bytes: u64,
    pub loaded_bytes: u64,
}

/// A scene object that finished loading, with the registry id of its mesh
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadedMember {
    pub node: SceneNodeId,
    pub mesh: ResourceId,
}

/// References taken while activating one chunk
#[derive(Default)]
struct Acquisition {
    refs: Vec<ResourceId>,
    meshes: Vec<LoadedMember>,
}

/// Priority- and size-bounded progressive scene loader.
pub struct ProgressiveLoader {
    config: StreamingConfig,
    registry: SharedRegistry,
    chunks: Vec<LoadingChunk>,
    queued: VecDeque<ChunkId>,
    active: BTreeSet<ChunkId>,
    completed: BTreeSet<ChunkId>,
    acquisitions: HashMap<ChunkId, Acquisition>,
    loaded_members: Vec<LoadedMember>,
    /// References of reset plans, given back once the next load has re-acquired
    superseded: Vec<ResourceId>,
    peak_active: usize,
}

impl ProgressiveLoader {
    pub fn new(config: StreamingConfig, registry: SharedRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            chunks: Vec::new(),
            queued: VecDeque::new(),
            active: BTreeSet::new(),
            completed: BTreeSet::new(),
            acquisitions: HashMap::new(),
            loaded_members: Vec::new(),
            superseded: Vec::new(),
            peak_active: 0,
        })
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Plan and stream every drawable of `graph`.
    ///
    /// Members are hidden until their chunk completes. A chunk that fails to
    /// register is reported to the observer, releases whatever it acquired and
    /// stays unloaded; the remaining chunks still load. References held by a
    /// previous plan are released after this run, so reloading a graph does
    /// not stack references.
    pub async fn load(&mut self, graph: &mut SceneGraph, observer: &mut dyn LoadObserver) -> LoadingStats {
        self.reset();

        self.chunks = plan_chunks(collect_members(graph), self.config.chunk_size_limit);
        self.queued = self.chunks.iter().map(|c| c.id).collect();
        for member in self.chunks.iter().flat_map(|c| &c.members) {
            graph.set_visible(member.node, false);
        }

        let stats = self.loading_stats();
        log::info!(
            "Streaming {} chunks ({} bytes), up to {} at a time",
            stats.total_chunks,
            stats.total_bytes,
            self.config.max_concurrent_chunks
        );

        let mut staggers: JoinSet<ChunkId> = JoinSet::new();
        while !self.queued.is_empty() || !self.active.is_empty() {
            while self.active.len() < self.config.max_concurrent_chunks {
                let Some(id) = self.queued.pop_front() else {
                    break;
                };
                self.start_chunk(id, graph, observer, &mut staggers);
            }

            match staggers.join_next().await {
                Some(Ok(id)) => self.finish_chunk(id, graph, observer),
                Some(Err(e)) => log::warn!("Chunk stagger task failed: {}", e),
                None => {
                    // Nothing in flight but chunks still marked active
                    self.abandon_active(observer);
                }
            }
        }

        self.release_superseded();

        let stats = self.loading_stats();
        log::info!(
            "Streaming finished: {}/{} chunks loaded, {} failed, peak concurrency {}",
            stats.loaded_chunks,
            stats.total_chunks,
            stats.failed_chunks,
            self.peak_active
        );
        stats
    }

    fn start_chunk(
        &mut self,
        id: ChunkId,
        graph: &SceneGraph,
        observer: &mut dyn LoadObserver,
        staggers: &mut JoinSet<ChunkId>,
    ) {
        let Some(chunk) = self.chunks.get(id.0 as usize) else {
            return;
        };
        let summary = chunk.summary();
        let delay = self.config.priority_delay() * chunk.priority.index();

        self.active.insert(id);
        self.peak_active = self.peak_active.max(self.active.len());
        observer.on_chunk_started(&summary);
        log::debug!("{} started ({} {} members)", id, summary.member_count, summary.priority);

        let result = {
            let mut registry = lock(&self.registry);
            acquire_chunk(&mut registry, chunk, graph)
        };

        match result {
            Ok(acquisition) => {
                self.acquisitions.insert(id, acquisition);
                staggers.spawn(async move {
                    tokio::time::sleep(delay).await;
                    id
                });
            }
            Err(e) => {
                log::warn!("{} failed to activate ({} members): {}", id, summary.member_count, e);
                self.active.remove(&id);
                self.completed.insert(id);
                observer.on_chunk_failed(&summary, &e);
            }
        }
    }

    fn finish_chunk(&mut self, id: ChunkId, graph: &mut SceneGraph, observer: &mut dyn LoadObserver) {
        if !self.active.remove(&id) {
            return;
        }
        let Some(chunk) = self.chunks.get_mut(id.0 as usize) else {
            return;
        };

        for member in &chunk.members {
            graph.set_visible(member.node, true);
        }
        chunk.loaded = true;
        let summary = chunk.summary();
        self.completed.insert(id);
        if let Some(acquisition) = self.acquisitions.get(&id) {
            self.loaded_members.extend_from_slice(&acquisition.meshes);
        }

        let loaded = self.chunks.iter().filter(|c| c.loaded).count();
        log::debug!("{} loaded ({}/{})", id, loaded, self.chunks.len());
        observer.on_chunk_loaded(&summary);
        observer.on_progress(loaded, self.chunks.len());
    }

    fn abandon_active(&mut self, observer: &mut dyn LoadObserver) {
        let stranded: Vec<ChunkId> = std::mem::take(&mut self.active).into_iter().collect();
        for id in stranded {
            if let Some(acquisition) = self.acquisitions.remove(&id) {
                let mut registry = lock(&self.registry);
                for resource in acquisition.refs {
                    registry.remove_reference(resource);
                }
            }
            self.completed.insert(id);
            if let Some(chunk) = self.chunks.get(id.0 as usize) {
                let error = Error::MalformedResource(format!("{} lost its activation task", id));
                observer.on_chunk_failed(&chunk.summary(), &error);
            }
        }
    }

    /// Hide or show members of loaded Medium/Low chunks by distance to `observer`.
    /// Never touches reference counts.
    pub fn update_distance_culling(&self, graph: &mut SceneGraph, observer: Vec3) -> CullingReport {
        let loaded = self.chunks.iter().filter(|c| c.loaded);
        apply_distance_culling(loaded, graph, observer, &DistanceThresholds::from_config(&self.config))
    }

    pub fn loading_stats(&self) -> LoadingStats {
        let loaded = self.chunks.iter().filter(|c| c.loaded);
        LoadingStats {
            total_chunks: self.chunks.len(),
            loaded_chunks: loaded.clone().count(),
            failed_chunks: self
                .completed
                .iter()
                .filter(|id| self.chunks.get(id.0 as usize).is_some_and(|c| !c.loaded))
                .count(),
            active_loads: self.active.len(),
            queued_chunks: self.queued.len(),
            total_bytes: self.chunks.iter().map(|c| c.estimated_size).sum(),
            loaded_bytes: loaded.map(|c| c.estimated_size).sum(),
        }
    }

    /// Forget the current plan. Registered resources stay registered and
    /// referenced until the next [`load`](Self::load) finishes; full teardown
    /// additionally needs [`ResourceRegistry::dispose_all`].
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.queued.clear();
        self.active.clear();
        self.completed.clear();
        for (_, acquisition) in self.acquisitions.drain() {
            self.superseded.extend(acquisition.refs);
        }
        self.loaded_members.clear();
        self.peak_active = 0;
    }

    pub fn chunks(&self) -> &[LoadingChunk] {
        &self.chunks
    }

    /// Members of loaded chunks, in completion order
    pub fn loaded_members(&self) -> &[LoadedMember] {
        &self.loaded_members
    }

    /// Largest number of chunks that were activating at once
    pub fn peak_active(&self) -> usize {
        self.peak_active
    }

    pub fn is_complete(&self) -> bool {
        self.queued.is_empty() && self.active.is_empty()
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    fn release_superseded(&mut self) {
        if self.superseded.is_empty() {
            return;
        }
        let mut registry = lock(&self.registry);
        let released = self.superseded.len();
        for id in self.superseded.drain(..) {
            registry.remove_reference(id);
        }
        log::debug!("Released {} references of the previous plan", released);
    }
}

/// Acquire every payload of a chunk's members. On failure, references taken
/// so far are released again.
fn acquire_chunk(registry: &mut ResourceRegistry, chunk: &LoadingChunk, graph: &SceneGraph) -> Result<Acquisition> {
    let mut acquisition = Acquisition::default();

    for member in &chunk.members {
        let mesh = graph
            .get(member.node)
            .and_then(|n| n.mesh())
            .map(|m| m.mesh.clone())
            .ok_or_else(|| Error::MalformedResource(format!("scene object '{}' has no mesh", member.name)));

        let result = mesh.and_then(|mesh| acquire_mesh(registry, mesh, &mut acquisition.refs));
        match result {
            Ok(mesh_id) => acquisition.meshes.push(LoadedMember {
                node: member.node,
                mesh: mesh_id,
            }),
            Err(e) => {
                for id in acquisition.refs.drain(..) {
                    registry.remove_reference(id);
                }
                return Err(e);
            }
        }
    }

    Ok(acquisition)
}

fn acquire_mesh(registry: &mut ResourceRegistry, mesh: Arc<Mesh>, refs: &mut Vec<ResourceId>) -> Result<ResourceId> {
    refs.push(registry.acquire(mesh.geometry.clone())?);
    for texture in mesh.textures() {
        refs.push(registry.acquire(texture.clone())?);
    }
    for material in &mesh.materials {
        refs.push(registry.acquire(material.clone())?);
    }
    let id = registry.acquire(mesh)?;
    refs.push(id);
    Ok(id)
}
