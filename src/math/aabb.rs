//! Axis-aligned bounding box

use crate::core::types::{Mat4, Vec3};

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, or `None` for an empty iterator
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut aabb = Aabb::new(first, first);
        for p in points {
            aabb.expand(p);
        }
        Some(aabb)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Return merged AABB containing both
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box enclosing all eight corners after transformation
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        let corners = (0..8u8).map(|i| {
            m.transform_point3(Vec3::new(
                if i & 1 != 0 { self.max.x } else { self.min.x },
                if i & 2 != 0 { self.max.y } else { self.min.y },
                if i & 4 != 0 { self.max.z } else { self.min.z },
            ))
        });
        // Eight corners, never empty
        Aabb::from_points(corners).unwrap_or(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_and_merge() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(a.center(), Vec3::splat(0.5));

        let merged = a.merged(&Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0)));
        assert_eq!(merged.min, Vec3::ZERO);
        assert_eq!(merged.max, Vec3::splat(3.0));
    }

    #[test]
    fn test_from_points() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());

        let aabb = Aabb::from_points([
            Vec3::new(1.0, -2.0, 0.0),
            Vec3::new(-1.0, 3.0, 0.5),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 0.5));
    }

    #[test]
    fn test_transformed_translation_and_scale() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let m = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            glam::Quat::IDENTITY,
            Vec3::new(10.0, 0.0, 0.0),
        );
        let t = aabb.transformed(&m);
        assert!((t.min - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-5);
        assert!((t.max - Vec3::new(12.0, 2.0, 2.0)).length() < 1e-5);
    }
}
