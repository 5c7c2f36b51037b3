//! Scene graph: CPU-side hierarchy of named nodes.
//!
//! The graph is the in-memory scene handed to the streaming loader and the
//! quality controller. World transforms are kept current on every structural
//! or transform change, so bounds queries never see stale matrices.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Mat4;

use crate::math::Aabb;

use super::mesh::Mesh;
use super::node::{LocalTransform, MeshNode, NodeContent, SceneNode, SceneNodeId};

/// CPU-side scene graph.
#[derive(Clone, Debug)]
pub struct SceneGraph {
    nodes: HashMap<SceneNodeId, SceneNode>,
    root: SceneNodeId,
    next_id: u64,
}

impl SceneGraph {
    /// Create a new scene graph with a root Group node.
    pub fn new() -> Self {
        let root_id = SceneNodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root_id, SceneNode::new(root_id, "root", NodeContent::Group));

        Self {
            nodes,
            root: root_id,
            next_id: 1,
        }
    }

    pub fn root(&self) -> SceneNodeId {
        self.root
    }

    fn alloc_id(&mut self) -> SceneNodeId {
        let id = SceneNodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a child node under `parent`. Returns the new node's ID.
    pub fn add_child(
        &mut self,
        parent: SceneNodeId,
        name: impl Into<String>,
        content: NodeContent,
    ) -> SceneNodeId {
        let id = self.alloc_id();
        let mut node = SceneNode::new(id, name, content);
        node.parent = Some(parent);

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
            node.world_transform = parent_node.world_transform;
        }

        self.nodes.insert(id, node);
        id
    }

    /// Add a mesh node under `parent`.
    pub fn add_mesh(
        &mut self,
        parent: SceneNodeId,
        name: impl Into<String>,
        mesh: Arc<Mesh>,
        transform: LocalTransform,
    ) -> SceneNodeId {
        let id = self.add_child(parent, name, NodeContent::Mesh(MeshNode::new(mesh)));
        self.set_transform(id, transform);
        id
    }

    /// Unlink a single node from its parent and drop it; its children move up
    /// to the former parent. Returns the removed node. Cannot detach the root.
    pub fn take(&mut self, id: SceneNodeId) -> Option<SceneNode> {
        if id == self.root {
            return None;
        }
        self.detach(id);
        let node = self.nodes.remove(&id)?;
        let new_parent = node.parent.unwrap_or(self.root);
        for &child in &node.children {
            if let Some(child_node) = self.nodes.get_mut(&child) {
                child_node.parent = Some(new_parent);
            }
            if let Some(parent_node) = self.nodes.get_mut(&new_parent) {
                parent_node.children.push(child);
            }
            self.propagate_from(child);
        }
        Some(node)
    }

    fn detach(&mut self, id: SceneNodeId) {
        let parent = self.nodes.get(&id).and_then(|n| n.parent);
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
    }

    /// Set the local transform of a node and update its subtree's world transforms.
    pub fn set_transform(&mut self, id: SceneNodeId, transform: LocalTransform) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.local_transform = transform;
            self.propagate_from(id);
        }
    }

    pub fn set_visible(&mut self, id: SceneNodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.visible = visible;
        }
    }

    pub fn get(&self, id: SceneNodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: SceneNodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    /// Iterate over the children of a node.
    pub fn children(&self, id: SceneNodeId) -> impl Iterator<Item = SceneNodeId> + '_ {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Pre-order depth-first walk of the subtree at `start`, children in insertion order.
    pub fn depth_first(&self, start: SceneNodeId) -> Vec<SceneNodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Mesh nodes in discovery (depth-first) order
    pub fn drawables(&self) -> Vec<SceneNodeId> {
        self.depth_first(self.root)
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.mesh().is_some()))
            .collect()
    }

    /// Mesh nodes the renderer would draw this frame. A hidden ancestor hides
    /// its whole subtree.
    pub fn render_list(&self) -> Vec<SceneNodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            if node.mesh().is_some() && !node.culled {
                out.push(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// World-space bounds of a mesh node's full-detail geometry
    pub fn world_bounds(&self, id: SceneNodeId) -> Option<Aabb> {
        let node = self.nodes.get(&id)?;
        let mesh = node.mesh()?;
        Some(mesh.mesh.geometry.bounds.transformed(&node.world_transform))
    }

    /// Recompute world transforms for `id` and everything below it.
    fn propagate_from(&mut self, id: SceneNodeId) {
        let parent_world = self
            .nodes
            .get(&id)
            .and_then(|n| n.parent)
            .and_then(|p| self.nodes.get(&p))
            .map_or(Mat4::IDENTITY, |p| p.world_transform);
        self.propagate_transforms(id, parent_world);
    }

    fn propagate_transforms(&mut self, node_id: SceneNodeId, parent_world: Mat4) {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        let world = parent_world * node.local_transform.to_mat4();
        node.world_transform = world;
        let children = node.children.clone();

        for child_id in children {
            self.propagate_transforms(child_id, world);
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::mesh::{quad_geometry, Light, LightKind, Material};
    use glam::Vec3;

    fn quad_mesh(name: &str) -> Arc<Mesh> {
        Arc::new(Mesh::new(
            name,
            Arc::new(quad_geometry(name, 2.0, 2.0)),
            vec![Arc::new(Material::lit(name, Vec3::ONE))],
        ))
    }

    #[test]
    fn test_new_scene_graph() {
        let graph = SceneGraph::new();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.get(graph.root()).unwrap().name, "root");
    }

    #[test]
    fn test_add_multiple_children() {
        let mut graph = SceneGraph::new();
        let root = graph.root();

        let a = graph.add_child(root, "a", NodeContent::Group);
        let b = graph.add_child(root, "b", NodeContent::Group);
        let c = graph.add_child(a, "c", NodeContent::Group);

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.children(root).count(), 2);
        assert!(graph.children(a).any(|x| x == c));
        assert_eq!(graph.children(b).count(), 0);
        assert_eq!(graph.get(c).unwrap().parent, Some(a));
    }

    #[test]
    fn test_cannot_take_root() {
        let mut graph = SceneGraph::new();
        assert!(graph.take(graph.root()).is_none());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_take_moves_children_up() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let group = graph.add_child(root, "group", NodeContent::Group);
        graph.set_transform(group, LocalTransform::from_position(Vec3::new(5.0, 0.0, 0.0)));
        let light = graph.add_child(
            group,
            "lamp",
            NodeContent::Light(Light::new(LightKind::Point, 2.0)),
        );

        let taken = graph.take(group).unwrap();
        assert_eq!(taken.name, "group");
        assert_eq!(graph.get(light).unwrap().parent, Some(root));
        assert!(graph.children(root).any(|c| c == light));
        // No longer inherits the removed group's offset
        let (_, _, translation) = graph.get(light).unwrap().world_transform.to_scale_rotation_translation();
        assert!(translation.length() < 1e-5);
    }

    #[test]
    fn test_depth_first_order() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let a = graph.add_child(root, "a", NodeContent::Group);
        let a1 = graph.add_child(a, "a1", NodeContent::Group);
        let b = graph.add_child(root, "b", NodeContent::Group);
        let a2 = graph.add_child(a, "a2", NodeContent::Group);

        assert_eq!(graph.depth_first(root), vec![root, a, a1, a2, b]);
        assert_eq!(graph.depth_first(a), vec![a, a1, a2]);
    }

    #[test]
    fn test_world_bounds_follow_parent_transform() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let floor = graph.add_child(root, "floor", NodeContent::Group);
        graph.set_transform(floor, LocalTransform::from_position(Vec3::new(10.0, 0.0, 0.0)));

        let panel = graph.add_mesh(
            floor,
            "panel",
            quad_mesh("panel"),
            LocalTransform::from_position(Vec3::new(5.0, 0.0, 0.0)),
        );

        let bounds = graph.world_bounds(panel).unwrap();
        assert!((bounds.center() - Vec3::new(15.0, 0.0, 0.0)).length() < 1e-4);

        // Moving the parent moves the child
        graph.set_transform(floor, LocalTransform::from_position(Vec3::new(-10.0, 0.0, 0.0)));
        let bounds = graph.world_bounds(panel).unwrap();
        assert!((bounds.center() - Vec3::new(-5.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_render_list_respects_flags() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let group = graph.add_child(root, "group", NodeContent::Group);
        let a = graph.add_mesh(group, "a", quad_mesh("a"), LocalTransform::identity());
        let b = graph.add_mesh(root, "b", quad_mesh("b"), LocalTransform::identity());
        let c = graph.add_mesh(root, "c", quad_mesh("c"), LocalTransform::identity());

        assert_eq!(graph.drawables(), vec![a, b, c]);
        assert_eq!(graph.render_list(), vec![a, b, c]);

        graph.set_visible(group, false);
        graph.get_mut(c).unwrap().culled = true;
        assert_eq!(graph.render_list(), vec![b]);
        assert_eq!(graph.drawables().len(), 3);
    }
}
