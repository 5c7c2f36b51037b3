//! Scenekeeper - resource lifetime, progressive streaming and adaptive quality
//! for retained-mode 3D scenes.
//!
//! - [`resource`]: reference-counted registry with deferred disposal and cleanup
//! - [`streaming`]: priority- and size-bounded chunked loading
//! - [`quality`]: frustum culling, distance LOD and frame-rate driven quality
//! - [`runtime`]: one context owning all three around a shared registry

pub mod core;
pub mod math;
pub mod scene;
pub mod resource;
pub mod streaming;
pub mod quality;
pub mod runtime;

pub use runtime::{FrameReport, SceneRuntime};
