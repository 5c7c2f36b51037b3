//! In-memory scene graph and the renderable payloads it carries

pub mod graph;
pub mod mesh;
pub mod node;

pub use graph::SceneGraph;
pub use mesh::{Geometry, Light, LightKind, Material, Mesh, Shading, Texture, VertexAttribute};
pub use node::{LocalTransform, MeshNode, NodeContent, SceneNode, SceneNodeId};
