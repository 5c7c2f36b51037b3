//! Resource identifiers and kinds

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque handle of a registered resource. Never reused once disposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// Closed set of trackable resource kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Geometry,
    Material,
    Texture,
    Mesh,
    Scene,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Geometry => "geometry",
            ResourceKind::Material => "material",
            ResourceKind::Texture => "texture",
            ResourceKind::Mesh => "mesh",
            ResourceKind::Scene => "scene",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object identity of an `Arc`-backed payload: same kind, same allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    kind: ResourceKind,
    addr: usize,
}

impl IdentityKey {
    pub fn of<T>(kind: ResourceKind, value: &Arc<T>) -> Self {
        Self {
            kind,
            addr: Arc::as_ptr(value) as *const () as usize,
        }
    }
}
