//! View frustum for visibility culling

use crate::core::types::{Mat4, Vec3, Vec4};
use super::aabb::Aabb;

/// A plane in Hessian normal form
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// View frustum with 6 planes (left, right, bottom, top, near, far)
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix (Gribb/Hartmann).
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let row = |i: usize| Vec4::new(vp.col(0)[i], vp.col(1)[i], vp.col(2)[i], vp.col(3)[i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        let raw = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r3 + r2, // near
            r3 - r2, // far
        ];

        let planes = raw.map(|r| {
            let normal = r.truncate();
            let len = normal.length();
            if len > 0.0 {
                Plane::new(normal / len, r.w / len)
            } else {
                // Degenerate plane accepts everything
                Plane::new(Vec3::ZERO, 0.0)
            }
        });

        Self { planes }
    }

    /// Conservative AABB test: false only if the box is fully outside one plane
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            // Corner most aligned with the plane normal (p-vertex)
            let p = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.distance_to_point(p) >= 0.0
        })
    }
}
