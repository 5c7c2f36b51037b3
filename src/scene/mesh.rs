//! Renderable payloads carried by scene nodes and tracked by the resource registry.
//!
//! These are CPU-side descriptions only; uploading them to a GPU is the
//! renderer's business.

use std::collections::HashSet;
use std::sync::Arc;

use glam::Vec3;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::Aabb;

/// Attribute name used for vertex positions
pub const POSITION: &str = "position";

/// A flat vertex attribute buffer (`item_size` floats per vertex)
#[derive(Clone, Debug, PartialEq)]
pub struct VertexAttribute {
    pub name: String,
    pub item_size: u32,
    pub data: Vec<f32>,
}

impl VertexAttribute {
    pub fn new(name: impl Into<String>, item_size: u32, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            item_size,
            data,
        }
    }

    pub fn count(&self) -> usize {
        if self.item_size == 0 {
            0
        } else {
            self.data.len() / self.item_size as usize
        }
    }

    pub fn byte_len(&self) -> u64 {
        (self.data.len() * std::mem::size_of::<f32>()) as u64
    }
}

/// Vertex and index buffers of a drawable
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub name: String,
    pub attributes: Vec<VertexAttribute>,
    /// Triangle list indices, `None` for non-indexed geometry
    pub indices: Option<Vec<u32>>,
    /// Local-space bounds
    pub bounds: Aabb,
}

impl Geometry {
    /// Build a geometry from positions, computing its bounds.
    pub fn from_positions(
        name: impl Into<String>,
        positions: &[Vec3],
        indices: Option<Vec<u32>>,
    ) -> Self {
        let bounds = Aabb::from_points(positions.iter().copied()).unwrap_or_default();
        let data = positions.iter().flat_map(|p| p.to_array()).collect();
        Self {
            name: name.into(),
            attributes: vec![VertexAttribute::new(POSITION, 3, data)],
            indices,
            bounds,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn vertex_count(&self) -> usize {
        self.attribute(POSITION)
            .or_else(|| self.attributes.first())
            .map(VertexAttribute::count)
            .unwrap_or(0)
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.vertex_count() / 3,
        }
    }

    /// Number of GPU buffers (one per attribute plus the index buffer)
    pub fn buffer_count(&self) -> usize {
        self.attributes.len() + usize::from(self.indices.is_some())
    }

    pub fn byte_len(&self) -> u64 {
        let attributes: u64 = self.attributes.iter().map(VertexAttribute::byte_len).sum();
        let indices = self
            .indices
            .as_ref()
            .map_or(0, |i| (i.len() * std::mem::size_of::<u32>()) as u64);
        attributes + indices
    }

    /// Check buffer shapes and index ranges
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertex_count();
        for attribute in &self.attributes {
            if attribute.item_size == 0 || attribute.data.len() % attribute.item_size as usize != 0 {
                return Err(Error::MalformedResource(format!(
                    "geometry '{}': attribute '{}' has {} floats, not a multiple of item size {}",
                    self.name,
                    attribute.name,
                    attribute.data.len(),
                    attribute.item_size
                )));
            }
            if attribute.count() != vertex_count {
                return Err(Error::MalformedResource(format!(
                    "geometry '{}': attribute '{}' has {} items, expected {}",
                    self.name,
                    attribute.name,
                    attribute.count(),
                    vertex_count
                )));
            }
        }
        if let Some(indices) = &self.indices {
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(Error::MalformedResource(format!(
                    "geometry '{}': index {} out of range for {} vertices",
                    self.name, bad, vertex_count
                )));
            }
        }
        Ok(())
    }
}

/// Surface shading model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shading {
    /// Responds to lights and shadows
    Lit,
    /// Flat color, ignores lighting
    Unlit,
}

/// Surface description
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub shading: Shading,
    pub base_color: Vec3,
    pub map: Option<Arc<Texture>>,
}

impl Material {
    pub fn lit(name: impl Into<String>, base_color: Vec3) -> Self {
        Self {
            name: name.into(),
            shading: Shading::Lit,
            base_color,
            map: None,
        }
    }

    pub fn unlit(name: impl Into<String>, base_color: Vec3) -> Self {
        Self {
            shading: Shading::Unlit,
            ..Self::lit(name, base_color)
        }
    }

    pub fn with_map(mut self, map: Arc<Texture>) -> Self {
        self.map = Some(map);
        self
    }

    /// Flat unlit stand-in with the same base color
    pub fn flattened(&self) -> Self {
        Self::unlit(format!("{}_flat", self.name), self.base_color)
    }
}

/// RGBA8 image data
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Texture {
    pub const BYTES_PER_PIXEL: u64 = 4;

    /// A texture filled with a single color
    pub fn solid(name: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            name: name.into(),
            width,
            height,
            data: rgba.repeat(pixels),
        }
    }

    pub fn byte_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn validate(&self) -> Result<()> {
        let expected = self.width as u64 * self.height as u64 * Self::BYTES_PER_PIXEL;
        if self.data.len() as u64 != expected {
            return Err(Error::MalformedResource(format!(
                "texture '{}': {} bytes for {}x{} RGBA8, expected {}",
                self.name,
                self.data.len(),
                self.width,
                self.height,
                expected
            )));
        }
        Ok(())
    }
}

/// Geometry plus the materials it is drawn with
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub geometry: Arc<Geometry>,
    pub materials: Vec<Arc<Material>>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, geometry: Arc<Geometry>, materials: Vec<Arc<Material>>) -> Self {
        Self {
            name: name.into(),
            geometry,
            materials,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.geometry.triangle_count()
    }

    /// Textures referenced by the materials, each counted once
    pub fn textures(&self) -> Vec<&Arc<Texture>> {
        let mut seen = HashSet::new();
        self.materials
            .iter()
            .filter_map(|m| m.map.as_ref())
            .filter(|t| seen.insert(Arc::as_ptr(t)))
            .collect()
    }

    /// Geometry bytes plus the bytes of every distinct texture
    pub fn payload_bytes(&self) -> u64 {
        self.geometry.byte_len() + self.textures().iter().map(|t| t.byte_len()).sum::<u64>()
    }
}

/// Light source kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
}

/// A light attached to the scene
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub casts_shadow: bool,
}

impl Light {
    pub fn new(kind: LightKind, intensity: f32) -> Self {
        Self {
            kind,
            color: Vec3::ONE,
            intensity,
            casts_shadow: kind == LightKind::Directional,
        }
    }
}

/// Unit quad in the XY plane: 4 vertices, 2 triangles
pub fn quad_geometry(name: impl Into<String>, width: f32, height: f32) -> Geometry {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let positions = [
        Vec3::new(-hw, -hh, 0.0),
        Vec3::new(hw, -hh, 0.0),
        Vec3::new(hw, hh, 0.0),
        Vec3::new(-hw, hh, 0.0),
    ];
    Geometry::from_positions(name, &positions, Some(vec![0, 1, 2, 0, 2, 3]))
}

/// Regular grid of `cells_x * cells_y` quads in the XY plane
pub fn grid_geometry(name: impl Into<String>, width: f32, height: f32, cells_x: u32, cells_y: u32) -> Geometry {
    let cells_x = cells_x.max(1);
    let cells_y = cells_y.max(1);
    let mut positions = Vec::with_capacity(((cells_x + 1) * (cells_y + 1)) as usize);
    for y in 0..=cells_y {
        for x in 0..=cells_x {
            positions.push(Vec3::new(
                width * (x as f32 / cells_x as f32 - 0.5),
                height * (y as f32 / cells_y as f32 - 0.5),
                0.0,
            ));
        }
    }

    let stride = cells_x + 1;
    let mut indices = Vec::with_capacity((cells_x * cells_y * 6) as usize);
    for y in 0..cells_y {
        for x in 0..cells_x {
            let i = y * stride + x;
            indices.extend_from_slice(&[i, i + 1, i + stride + 1, i, i + stride + 1, i + stride]);
        }
    }

    Geometry::from_positions(name, &positions, Some(indices))
}
