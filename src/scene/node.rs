//! Scene graph node types
//!
//! Node IDs, transforms, content variants, and nodes.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use serde::Serialize;

use super::mesh::{Light, Mesh};

/// Unique identifier for a scene graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SceneNodeId(pub u64);

/// Local transform relative to the parent node.
#[derive(Clone, Debug)]
pub struct LocalTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl LocalTransform {
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a translation-only transform.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.rotation, self.position)
    }
}

/// A drawable mesh plus the level-of-detail stand-in currently drawn in its place.
#[derive(Clone, Debug)]
pub struct MeshNode {
    pub mesh: Arc<Mesh>,
    /// Active simplified variant; `None` means full detail
    pub lod: Option<Arc<Mesh>>,
}

impl MeshNode {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self { mesh, lod: None }
    }

    /// The mesh the renderer should draw this frame
    pub fn drawn(&self) -> &Arc<Mesh> {
        self.lod.as_ref().unwrap_or(&self.mesh)
    }
}

/// What a scene node contains.
#[derive(Clone, Debug)]
pub enum NodeContent {
    /// A grouping node with no content of its own.
    Group,
    Mesh(MeshNode),
    Light(Light),
}

/// A single node in the scene graph.
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub id: SceneNodeId,
    pub name: String,
    pub parent: Option<SceneNodeId>,
    pub children: Vec<SceneNodeId>,
    pub local_transform: LocalTransform,
    /// Cached world transform, kept current by the graph.
    pub world_transform: Mat4,
    /// Shown/hidden by progressive loading and distance culling.
    pub visible: bool,
    /// Set while the node is outside the camera frustum.
    pub culled: bool,
    pub content: NodeContent,
}

impl SceneNode {
    pub fn new(id: SceneNodeId, name: impl Into<String>, content: NodeContent) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            local_transform: LocalTransform::identity(),
            world_transform: Mat4::IDENTITY,
            visible: true,
            culled: false,
            content,
        }
    }

    pub fn mesh(&self) -> Option<&MeshNode> {
        match &self.content {
            NodeContent::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut MeshNode> {
        match &mut self.content {
            NodeContent::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Whether the renderer draws this node this frame
    pub fn is_rendered(&self) -> bool {
        self.visible && !self.culled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::mesh::{quad_geometry, LightKind, Material};

    fn quad_mesh(name: &str) -> Arc<Mesh> {
        Arc::new(Mesh::new(
            name,
            Arc::new(quad_geometry(name, 1.0, 1.0)),
            vec![Arc::new(Material::lit(name, Vec3::ONE))],
        ))
    }

    #[test]
    fn test_local_transform_identity() {
        let t = LocalTransform::identity();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.to_mat4(), Mat4::IDENTITY);
    }

    #[test]
    fn test_local_transform_to_mat4_with_scale() {
        let t = LocalTransform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
            scale: 2.0,
        };
        let (scale, _, translation) = t.to_mat4().to_scale_rotation_translation();
        assert!((scale - Vec3::splat(2.0)).length() < 1e-5);
        assert!((translation - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_scene_node_new() {
        let node = SceneNode::new(SceneNodeId(0), "root", NodeContent::Group);
        assert!(node.parent.is_none());
        assert!(node.visible);
        assert!(!node.culled);
        assert!(node.is_rendered());
        assert!(node.mesh().is_none());
    }

    #[test]
    fn test_mesh_node_draws_lod_when_set() {
        let full = quad_mesh("full");
        let simplified = quad_mesh("simplified");
        let mut node = MeshNode::new(full.clone());
        assert!(Arc::ptr_eq(node.drawn(), &full));

        node.lod = Some(simplified.clone());
        assert!(Arc::ptr_eq(node.drawn(), &simplified));
    }

    #[test]
    fn test_culled_node_is_not_rendered() {
        let mut node = SceneNode::new(
            SceneNodeId(3),
            "sun",
            NodeContent::Light(Light::new(LightKind::Directional, 1.0)),
        );
        node.culled = true;
        assert!(!node.is_rendered());
    }
}
