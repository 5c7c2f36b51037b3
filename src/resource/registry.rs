//! Reference-counted registry of renderable resources.
//!
//! Every geometry, material, texture, mesh and scene the viewer keeps alive is
//! recorded here with a reference count, a size estimate and last-use time.
//! Releasing the last reference does not free anything by itself: the id is
//! queued, and reclamation happens in [`ResourceRegistry::process_disposal_queue`],
//! [`ResourceRegistry::cleanup`], or a periodic auto-cleanup pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::core::config::ResourceConfig;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::scene::{Geometry, Material, Mesh, SceneGraph, Texture};

use super::id::{IdentityKey, ResourceId, ResourceKind};
use super::teardown::{self, ReleaseCounters};

/// Fixed size heuristics for payloads without byte buffers of their own
pub const MATERIAL_SIZE_ESTIMATE: u64 = 1024;
pub const MESH_SIZE_ESTIMATE: u64 = 512;
pub const SCENE_SIZE_ESTIMATE: u64 = 4096;

/// A trackable renderable payload
#[derive(Clone, Debug)]
pub enum Resource {
    Geometry(Arc<Geometry>),
    Material(Arc<Material>),
    Texture(Arc<Texture>),
    Mesh(Arc<Mesh>),
    Scene(SceneGraph),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Geometry(_) => ResourceKind::Geometry,
            Resource::Material(_) => ResourceKind::Material,
            Resource::Texture(_) => ResourceKind::Texture,
            Resource::Mesh(_) => ResourceKind::Mesh,
            Resource::Scene(_) => ResourceKind::Scene,
        }
    }

    /// Estimated footprint in bytes
    pub fn size_estimate(&self) -> u64 {
        match self {
            Resource::Geometry(g) => g.byte_len(),
            Resource::Texture(t) => t.byte_len(),
            Resource::Material(_) => MATERIAL_SIZE_ESTIMATE,
            Resource::Mesh(_) => MESH_SIZE_ESTIMATE,
            Resource::Scene(_) => SCENE_SIZE_ESTIMATE,
        }
    }

    /// Object identity for `Arc`-backed payloads; scenes are owned and have none
    pub fn identity(&self) -> Option<IdentityKey> {
        let kind = self.kind();
        match self {
            Resource::Geometry(g) => Some(IdentityKey::of(kind, g)),
            Resource::Material(m) => Some(IdentityKey::of(kind, m)),
            Resource::Texture(t) => Some(IdentityKey::of(kind, t)),
            Resource::Mesh(m) => Some(IdentityKey::of(kind, m)),
            Resource::Scene(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Geometry(g) => &g.name,
            Resource::Material(m) => &m.name,
            Resource::Texture(t) => &t.name,
            Resource::Mesh(m) => &m.name,
            Resource::Scene(_) => "scene",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Resource::Geometry(g) => g.validate(),
            Resource::Texture(t) => t.validate(),
            Resource::Material(m) => m.map.as_ref().map_or(Ok(()), |t| t.validate()),
            Resource::Mesh(m) => {
                m.geometry.validate()?;
                m.textures().iter().try_for_each(|t| t.validate())
            }
            Resource::Scene(_) => Ok(()),
        }
    }
}

impl From<Arc<Geometry>> for Resource {
    fn from(value: Arc<Geometry>) -> Self {
        Resource::Geometry(value)
    }
}

impl From<Arc<Material>> for Resource {
    fn from(value: Arc<Material>) -> Self {
        Resource::Material(value)
    }
}

impl From<Arc<Texture>> for Resource {
    fn from(value: Arc<Texture>) -> Self {
        Resource::Texture(value)
    }
}

impl From<Arc<Mesh>> for Resource {
    fn from(value: Arc<Mesh>) -> Self {
        Resource::Mesh(value)
    }
}

impl From<SceneGraph> for Resource {
    fn from(value: SceneGraph) -> Self {
        Resource::Scene(value)
    }
}

/// Bookkeeping for one registered resource
#[derive(Debug)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub size_estimate: u64,
    pub ref_count: u32,
    pub created_at: Instant,
    pub last_used_at: Instant,
    pub resource: Resource,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindStats {
    pub count: usize,
    pub size: u64,
}

/// Snapshot returned by [`ResourceRegistry::stats`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResourceStats {
    pub total_count: usize,
    pub total_size: u64,
    pub per_kind: BTreeMap<ResourceKind, KindStats>,
    pub queued_for_disposal: usize,
}

/// Called once per disposed record, after its payload was released
pub type ReleaseHook = Box<dyn FnMut(ResourceId, ResourceKind) + Send>;

struct CleanupSchedule {
    interval: Duration,
    next_due: Instant,
}

/// Reference-counted resource table with deferred disposal.
pub struct ResourceRegistry {
    records: HashMap<ResourceId, ResourceRecord>,
    identities: HashMap<IdentityKey, ResourceId>,
    /// Exactly the live ids whose ref count is zero
    disposal_queue: BTreeSet<ResourceId>,
    /// Every id below this was handed out or skipped; only live ones are valid
    next_id: u64,
    config: ResourceConfig,
    auto_cleanup: Option<CleanupSchedule>,
    released: ReleaseCounters,
    release_hook: Option<ReleaseHook>,
}

impl ResourceRegistry {
    pub fn new(config: ResourceConfig) -> Result<Self> {
        config.validate()?;
        let mut registry = Self::with_config(config);
        if registry.config.auto_cleanup {
            registry.enable_auto_cleanup(registry.config.auto_cleanup_interval());
        }
        Ok(registry)
    }

    fn with_config(config: ResourceConfig) -> Self {
        Self {
            records: HashMap::new(),
            identities: HashMap::new(),
            disposal_queue: BTreeSet::new(),
            next_id: 1,
            config,
            auto_cleanup: None,
            released: ReleaseCounters::default(),
            release_hook: None,
        }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Start tracking a resource with one reference held by the caller.
    ///
    /// Fails with `DuplicateResource` if `id` (or the same `Arc` payload) is
    /// already tracked, `RetiredResource` if `id` is below the next free id
    /// (disposed, or skipped by an earlier explicit id), `IdOutOfRange` for
    /// `u64::MAX`, and `MalformedResource` if the payload's buffers are inconsistent.
    pub fn register(&mut self, resource: impl Into<Resource>, id: Option<ResourceId>) -> Result<ResourceId> {
        let resource = resource.into();

        if let Some(id) = id {
            if self.records.contains_key(&id) {
                return Err(Error::DuplicateResource(id));
            }
            if id.0 < self.next_id {
                return Err(Error::RetiredResource(id));
            }
        }
        if let Some(existing) = resource.identity().and_then(|key| self.identities.get(&key)) {
            return Err(Error::DuplicateResource(*existing));
        }
        resource.validate()?;

        let id = id.unwrap_or(ResourceId(self.next_id));
        self.next_id = id.0.checked_add(1).ok_or(Error::IdOutOfRange(id))?;

        let now = Instant::now();
        let record = ResourceRecord {
            id,
            kind: resource.kind(),
            size_estimate: resource.size_estimate(),
            ref_count: 1,
            created_at: now,
            last_used_at: now,
            resource,
        };
        log::trace!(
            "Registered {} {} '{}' ({} bytes)",
            record.kind,
            id,
            record.resource.name(),
            record.size_estimate
        );

        if let Some(key) = record.resource.identity() {
            self.identities.insert(key, id);
        }
        self.records.insert(id, record);
        Ok(id)
    }

    /// Register the payload, or add a reference if the same `Arc` is already tracked.
    pub fn acquire(&mut self, resource: impl Into<Resource>) -> Result<ResourceId> {
        let resource = resource.into();
        if let Some(id) = self.id_of(&resource) {
            self.add_reference(id);
            return Ok(id);
        }
        self.register(resource, None)
    }

    /// Id of an already tracked `Arc` payload, without touching its count
    pub fn id_of(&self, resource: &Resource) -> Option<ResourceId> {
        resource.identity().and_then(|key| self.identities.get(&key).copied())
    }

    pub fn add_reference(&mut self, id: ResourceId) {
        let Some(record) = self.records.get_mut(&id) else {
            log::trace!("add_reference({}): not tracked", id);
            return;
        };
        record.ref_count += 1;
        record.last_used_at = Instant::now();
        self.disposal_queue.remove(&id);
    }

    /// Drop one reference; at zero the id is queued for disposal.
    pub fn remove_reference(&mut self, id: ResourceId) {
        let Some(record) = self.records.get_mut(&id) else {
            log::trace!("remove_reference({}): not tracked", id);
            return;
        };
        record.ref_count = record.ref_count.saturating_sub(1);
        if record.ref_count == 0 {
            self.disposal_queue.insert(id);
        }
    }

    /// Mark recent use without changing the reference count
    pub fn touch(&mut self, id: ResourceId) {
        if let Some(record) = self.records.get_mut(&id) {
            record.last_used_at = Instant::now();
        }
    }

    pub fn get(&self, id: ResourceId) -> Option<&ResourceRecord> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn ref_count(&self, id: ResourceId) -> Option<u32> {
        self.records.get(&id).map(|r| r.ref_count)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids currently waiting for disposal, ascending
    pub fn queued_for_disposal(&self) -> Vec<ResourceId> {
        self.disposal_queue.iter().copied().collect()
    }

    /// Tear down a resource and forget its id.
    ///
    /// Without `force`, a resource that still has references is left untouched
    /// and `false` is returned. Unknown ids also return `false`.
    pub fn dispose(&mut self, id: ResourceId, force: bool) -> bool {
        let Some(record) = self.records.get(&id) else {
            log::debug!("dispose({}): not tracked", id);
            return false;
        };
        if !force && record.ref_count > 0 {
            log::debug!("dispose({}): still referenced ({} refs)", id, record.ref_count);
            return false;
        }
        let Some(ResourceRecord { kind, resource, ref_count, .. }) = self.records.remove(&id) else {
            return false;
        };

        if let Some(key) = resource.identity() {
            self.identities.remove(&key);
        }
        self.disposal_queue.remove(&id);

        if ref_count > 0 {
            log::debug!("Force-disposing {} {} with {} refs", kind, id, ref_count);
        }

        let identities = &self.identities;
        teardown::release(resource, &|key| identities.contains_key(&key), &mut self.released);

        if let Some(hook) = self.release_hook.as_mut() {
            hook(id, kind);
        }
        true
    }

    /// Dispose every queued id whose count is still zero. Returns the number disposed.
    pub fn process_disposal_queue(&mut self) -> usize {
        let queued: Vec<ResourceId> = self.disposal_queue.iter().copied().collect();
        let mut disposed = 0;
        for id in queued {
            if self.ref_count(id) == Some(0) {
                if self.dispose(id, false) {
                    disposed += 1;
                }
            } else {
                self.disposal_queue.remove(&id);
            }
        }
        if disposed > 0 {
            log::debug!("Disposal queue: released {} resources", disposed);
        }
        disposed
    }

    /// Dispose everything when `force`, otherwise every resource with at most
    /// `min_ref_count` references that has been unused for longer than `max_age`.
    pub fn cleanup(&mut self, force: bool, max_age: Duration, min_ref_count: u32) -> usize {
        let now = Instant::now();
        let mut doomed: Vec<ResourceId> = self
            .records
            .values()
            .filter(|r| {
                force || (r.ref_count <= min_ref_count && now.duration_since(r.last_used_at) > max_age)
            })
            .map(|r| r.id)
            .collect();
        doomed.sort();

        let disposed = doomed.into_iter().filter(|&id| self.dispose(id, true)).count();
        if disposed > 0 {
            log::info!("Cleanup released {} resources", disposed);
        }
        disposed
    }

    /// Records unused for longer than `max_age`, oldest first
    pub fn stale(&self, max_age: Duration) -> Vec<&ResourceRecord> {
        let now = Instant::now();
        let mut stale: Vec<&ResourceRecord> = self
            .records
            .values()
            .filter(|r| now.duration_since(r.last_used_at) > max_age)
            .collect();
        stale.sort_by_key(|r| (r.last_used_at, r.id));
        stale
    }

    pub fn stats(&self) -> ResourceStats {
        let mut stats = ResourceStats {
            queued_for_disposal: self.disposal_queue.len(),
            ..Default::default()
        };
        for record in self.records.values() {
            stats.total_count += 1;
            stats.total_size += record.size_estimate;
            let kind = stats.per_kind.entry(record.kind).or_default();
            kind.count += 1;
            kind.size += record.size_estimate;
        }
        stats
    }

    /// Force-dispose every tracked resource.
    pub fn dispose_all(&mut self) -> usize {
        let count = self.cleanup(true, Duration::ZERO, 0);
        self.disposal_queue.clear();
        count
    }

    /// Run periodic cleanup from [`update`](Self::update). Re-enabling restarts the schedule.
    pub fn enable_auto_cleanup(&mut self, interval: Duration) {
        if self.auto_cleanup.is_some() {
            self.disable_auto_cleanup();
        }
        self.auto_cleanup = Some(CleanupSchedule {
            interval,
            next_due: Instant::now() + interval,
        });
        log::debug!("Auto-cleanup enabled every {:?}", interval);
    }

    pub fn disable_auto_cleanup(&mut self) {
        if self.auto_cleanup.take().is_some() {
            log::debug!("Auto-cleanup disabled");
        }
    }

    pub fn auto_cleanup_enabled(&self) -> bool {
        self.auto_cleanup.is_some()
    }

    /// Per-frame hook: runs a cleanup pass when the auto-cleanup interval has elapsed.
    pub fn update(&mut self, now: Instant) -> usize {
        let Some(schedule) = self.auto_cleanup.as_mut() else {
            return 0;
        };
        if now < schedule.next_due {
            return 0;
        }
        schedule.next_due = now + schedule.interval;
        self.run_cleanup_pass()
    }

    /// Stale cleanup followed by draining the disposal queue
    pub fn run_cleanup_pass(&mut self) -> usize {
        let cleaned = self.cleanup(false, self.config.cleanup_max_age(), 0);
        cleaned + self.process_disposal_queue()
    }

    pub fn set_release_hook(&mut self, hook: ReleaseHook) {
        self.release_hook = Some(hook);
    }

    /// Payloads released so far, including cascaded children
    pub fn released(&self) -> ReleaseCounters {
        self.released
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::with_config(ResourceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use glam::Vec3;

    use crate::scene::mesh::quad_geometry;
    use crate::scene::{LocalTransform, NodeContent};

    fn geometry(name: &str) -> Arc<Geometry> {
        Arc::new(quad_geometry(name, 1.0, 1.0))
    }

    #[test]
    fn test_register_then_release_then_process() {
        let mut registry = ResourceRegistry::default();
        let g1 = registry.register(geometry("g1"), None).unwrap();
        assert_eq!(registry.ref_count(g1), Some(1));

        registry.remove_reference(g1);
        assert_eq!(registry.queued_for_disposal(), vec![g1]);

        assert_eq!(registry.process_disposal_queue(), 1);
        assert!(registry.get(g1).is_none());
        assert_eq!(registry.stats().total_count, 0);
        assert_eq!(registry.released().geometries, 1);
    }

    #[test]
    fn test_dispose_in_use_without_force_is_refused() {
        let mut registry = ResourceRegistry::default();
        let g1 = registry.register(geometry("g1"), None).unwrap();
        registry.add_reference(g1);

        assert!(!registry.dispose(g1, false));
        assert_eq!(registry.ref_count(g1), Some(2));

        assert!(registry.dispose(g1, true));
        assert!(!registry.contains(g1));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut registry = ResourceRegistry::default();
        let ghost = ResourceId(99);
        registry.add_reference(ghost);
        registry.remove_reference(ghost);
        registry.touch(ghost);
        assert!(!registry.dispose(ghost, true));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ref_count_never_negative() {
        let mut registry = ResourceRegistry::default();
        let id = registry.register(geometry("g"), None).unwrap();
        for _ in 0..5 {
            registry.remove_reference(id);
        }
        assert_eq!(registry.ref_count(id), Some(0));

        registry.add_reference(id);
        assert_eq!(registry.ref_count(id), Some(1));
        assert!(registry.queued_for_disposal().is_empty());
    }

    #[test]
    fn test_disposal_queue_matches_zero_ref_set() {
        let mut registry = ResourceRegistry::default();
        let ids: Vec<ResourceId> = (0..8)
            .map(|i| registry.register(geometry(&format!("g{}", i)), None).unwrap())
            .collect();

        // Deterministic interleaving of references and releases
        for step in 0..64usize {
            let id = ids[(step * 5) % ids.len()];
            if step % 3 == 0 {
                registry.add_reference(id);
            } else {
                registry.remove_reference(id);
            }
            if step % 16 == 15 {
                registry.process_disposal_queue();
            }

            let zero: Vec<ResourceId> = {
                let mut zero: Vec<ResourceId> = ids
                    .iter()
                    .copied()
                    .filter(|&id| registry.ref_count(id) == Some(0))
                    .collect();
                zero.sort();
                zero
            };
            assert_eq!(registry.queued_for_disposal(), zero, "step {}", step);
        }
    }

    #[test]
    fn test_disposed_id_is_never_reused() {
        let mut registry = ResourceRegistry::default();
        let first = registry.register(geometry("a"), None).unwrap();
        assert!(registry.dispose(first, true));

        let second = registry.register(geometry("b"), None).unwrap();
        assert_ne!(first, second);
        assert!(registry.get(first).is_none());

        let err = registry.register(geometry("c"), Some(first)).unwrap_err();
        assert!(matches!(err, Error::RetiredResource(id) if id == first));
    }

    #[test]
    fn test_explicit_id_duplicate_is_rejected() {
        let mut registry = ResourceRegistry::default();
        let id = registry.register(geometry("a"), Some(ResourceId(10))).unwrap();
        assert_eq!(id, ResourceId(10));

        let err = registry.register(geometry("b"), Some(ResourceId(10))).unwrap_err();
        assert!(matches!(err, Error::DuplicateResource(ResourceId(10))));

        // Generated ids skip past explicit ones
        let next = registry.register(geometry("c"), None).unwrap();
        assert!(next.0 > 10);

        // Ids below the next free one were handed out or skipped
        let err = registry.register(geometry("d"), Some(ResourceId(5))).unwrap_err();
        assert!(matches!(err, Error::RetiredResource(ResourceId(5))));
    }

    #[test]
    fn test_explicit_id_at_top_of_range_is_rejected() {
        let mut registry = ResourceRegistry::default();
        let err = registry
            .register(geometry("top"), Some(ResourceId(u64::MAX)))
            .unwrap_err();
        assert!(matches!(err, Error::IdOutOfRange(ResourceId(u64::MAX))));
        assert!(registry.is_empty());

        // Nothing was consumed by the failed call
        assert_eq!(registry.register(geometry("a"), None).unwrap(), ResourceId(1));

        // The last usable id exhausts generated ids without panicking
        let last = registry.register(geometry("b"), Some(ResourceId(u64::MAX - 1))).unwrap();
        assert_eq!(last, ResourceId(u64::MAX - 1));
        let err = registry.register(geometry("c"), None).unwrap_err();
        assert!(matches!(err, Error::IdOutOfRange(ResourceId(u64::MAX))));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_disposal_keeps_no_per_id_history() {
        let mut registry = ResourceRegistry::default();
        for i in 0..1_000 {
            let id = registry.register(geometry(&format!("churn_{}", i)), None).unwrap();
            assert!(registry.dispose(id, true));
        }
        assert!(registry.is_empty());
        assert_eq!(registry.next_id, 1_001);
        let err = registry.register(geometry("late"), Some(ResourceId(500))).unwrap_err();
        assert!(matches!(err, Error::RetiredResource(ResourceId(500))));
    }

    #[test]
    fn test_same_payload_registered_twice_is_rejected() {
        let mut registry = ResourceRegistry::default();
        let shared = geometry("shared");
        let id = registry.register(shared.clone(), None).unwrap();
        let err = registry.register(shared, None).unwrap_err();
        assert!(matches!(err, Error::DuplicateResource(existing) if existing == id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let mut registry = ResourceRegistry::default();
        let mut broken = quad_geometry("broken", 1.0, 1.0);
        broken.indices = Some(vec![0, 1, 42]);
        assert!(matches!(
            registry.register(Arc::new(broken), None),
            Err(Error::MalformedResource(_))
        ));

        let texture = Texture {
            name: "short".into(),
            width: 4,
            height: 4,
            data: vec![0; 3],
        };
        assert!(registry.register(Arc::new(texture), None).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_acquire_tracks_shared_payload_once() {
        let mut registry = ResourceRegistry::default();
        let material = Arc::new(Material::lit("glass", Vec3::ONE));

        let a = registry.acquire(material.clone()).unwrap();
        let b = registry.acquire(material.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.ref_count(a), Some(2));
        assert_eq!(registry.id_of(&Resource::Material(material)), Some(a));
        assert_eq!(registry.ref_count(a), Some(2));
    }

    #[test]
    fn test_stats_per_kind() {
        let mut registry = ResourceRegistry::default();
        let quad = geometry("quad");
        let quad_bytes = quad.byte_len();
        registry.register(quad, None).unwrap();
        registry.register(Arc::new(Material::lit("m", Vec3::ONE)), None).unwrap();
        registry
            .register(Arc::new(Texture::solid("t", 2, 2, [0; 4])), None)
            .unwrap();
        let queued = registry.register(Arc::new(Material::lit("n", Vec3::ONE)), None).unwrap();
        registry.remove_reference(queued);

        let stats = registry.stats();
        assert_eq!(stats.total_count, 4);
        assert_eq!(stats.total_size, quad_bytes + 2 * MATERIAL_SIZE_ESTIMATE + 16);
        assert_eq!(stats.per_kind[&ResourceKind::Material].count, 2);
        assert_eq!(stats.per_kind[&ResourceKind::Texture].size, 16);
        assert!(!stats.per_kind.contains_key(&ResourceKind::Mesh));
        assert_eq!(stats.queued_for_disposal, 1);
    }

    #[test]
    fn test_mesh_disposal_leaves_separately_tracked_children() {
        let mut registry = ResourceRegistry::default();
        let shared_geometry = geometry("shared");
        let mesh = Arc::new(Mesh::new(
            "panel",
            shared_geometry.clone(),
            vec![Arc::new(Material::lit("panel", Vec3::ONE))],
        ));

        let geometry_id = registry.register(shared_geometry, None).unwrap();
        let mesh_id = registry.register(mesh, None).unwrap();

        assert!(registry.dispose(mesh_id, true));
        let released = registry.released();
        assert_eq!(released.meshes, 1);
        assert_eq!(released.geometries, 0);
        assert_eq!(released.materials, 1);
        assert!(registry.contains(geometry_id));
    }

    #[test]
    fn test_scene_disposal() {
        let mut registry = ResourceRegistry::default();
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let mesh = Arc::new(Mesh::new(
            "slab",
            geometry("slab"),
            vec![Arc::new(Material::lit("concrete", Vec3::splat(0.5)))],
        ));
        graph.add_mesh(root, "slab", mesh, LocalTransform::identity());
        graph.add_child(
            root,
            "sun",
            NodeContent::Light(crate::scene::Light::new(crate::scene::LightKind::Directional, 1.0)),
        );

        let scene = registry.register(graph, None).unwrap();
        assert_eq!(registry.get(scene).unwrap().size_estimate, SCENE_SIZE_ESTIMATE);
        registry.remove_reference(scene);
        assert_eq!(registry.process_disposal_queue(), 1);

        let released = registry.released();
        assert_eq!(released.scenes, 1);
        assert_eq!(released.meshes, 1);
        assert_eq!(released.lights, 1);
        assert_eq!(released.detached_nodes, 2);
    }

    #[test]
    fn test_release_hook_called_once_per_record() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ResourceRegistry::default();
        let sink = seen.clone();
        registry.set_release_hook(Box::new(move |id, kind| {
            sink.lock().unwrap().push((id, kind));
        }));

        let g = registry.register(geometry("g"), None).unwrap();
        let t = registry
            .register(Arc::new(Texture::solid("t", 1, 1, [0; 4])), None)
            .unwrap();
        assert_eq!(registry.dispose_all(), 2);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(g, ResourceKind::Geometry), (t, ResourceKind::Texture)]
        );
        assert!(registry.is_empty());
        assert!(registry.queued_for_disposal().is_empty());
    }

    #[test]
    fn test_cleared_registry_is_safe() {
        let mut registry = ResourceRegistry::default();
        let id = registry.register(geometry("g"), None).unwrap();
        registry.dispose_all();

        registry.remove_reference(id);
        assert_eq!(registry.process_disposal_queue(), 0);
        assert_eq!(registry.cleanup(true, Duration::ZERO, 0), 0);
        assert_eq!(registry.dispose_all(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_by_age() {
        let mut registry = ResourceRegistry::default();
        let old = registry.register(geometry("old"), None).unwrap();
        let held = registry.register(geometry("held"), None).unwrap();
        registry.remove_reference(old);

        tokio::time::advance(Duration::from_secs(10)).await;
        let fresh = registry.register(geometry("fresh"), None).unwrap();
        registry.remove_reference(fresh);

        let max_age = Duration::from_secs(5);
        let stale: Vec<ResourceId> = registry.stale(max_age).iter().map(|r| r.id).collect();
        assert_eq!(stale, vec![old, held]);

        // Only unreferenced and stale
        assert_eq!(registry.cleanup(false, max_age, 0), 1);
        assert!(!registry.contains(old));
        assert!(registry.contains(held));
        assert!(registry.contains(fresh));

        // Raising the ref threshold includes held resources
        assert_eq!(registry.cleanup(false, max_age, 1), 1);
        assert!(!registry.contains(held));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_keeps_resource_fresh() {
        let mut registry = ResourceRegistry::default();
        let id = registry.register(geometry("g"), None).unwrap();
        registry.remove_reference(id);

        tokio::time::advance(Duration::from_secs(10)).await;
        registry.touch(id);
        assert_eq!(registry.ref_count(id), Some(0));
        assert_eq!(registry.cleanup(false, Duration::from_secs(5), 0), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_runs_cleanup_when_due() {
        let config = ResourceConfig {
            cleanup_max_age_ms: 1_000,
            auto_cleanup_interval_ms: 5_000,
            auto_cleanup: true,
        };
        let mut registry = ResourceRegistry::new(config).unwrap();
        assert!(registry.auto_cleanup_enabled());

        let id = registry.register(geometry("g"), None).unwrap();
        registry.remove_reference(id);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(registry.update(Instant::now()), 0, "not due yet");
        assert!(registry.contains(id));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(registry.update(Instant::now()), 1);
        assert!(!registry.contains(id));

        // Re-enabling restarts rather than stacking schedules
        registry.enable_auto_cleanup(Duration::from_secs(5));
        registry.enable_auto_cleanup(Duration::from_secs(5));
        assert!(registry.auto_cleanup_enabled());
        registry.disable_auto_cleanup();
        registry.disable_auto_cleanup();
        assert!(!registry.auto_cleanup_enabled());
        assert_eq!(registry.update(Instant::now() + Duration::from_secs(60)), 0);
    }
}
