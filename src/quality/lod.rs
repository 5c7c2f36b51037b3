//! Level of Detail (LOD) tables and stride-based mesh simplification
//!
//! Each level pairs a minimum observer distance with a triangle reduction
//! ratio. Levels at or past `simplify_materials_from` also swap lit materials
//! for flat unlit ones. Simplification keeps every Nth triangle of the index
//! buffer; it is cheap and approximate, not topology-aware.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::scene::{Geometry, Material, Mesh, Shading};

/// Default distance at which each level starts
pub const LOD_DISTANCES: [f32; 4] = [0.0, 20.0, 50.0, 100.0];

/// Default fraction of triangles removed per level
pub const LOD_REDUCTIONS: [f32; 4] = [0.0, 0.5, 0.75, 0.9];

/// Configuration for LOD behavior
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Minimum observer distance for each level, non-decreasing
    pub distances: Vec<f32>,
    /// Triangle reduction per level in `[0, 1)`, non-decreasing
    pub reductions: Vec<f32>,
    /// First level that uses flat unlit materials
    pub simplify_materials_from: usize,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            distances: LOD_DISTANCES.to_vec(),
            reductions: LOD_REDUCTIONS.to_vec(),
            simplify_materials_from: 2,
        }
    }
}

impl LodConfig {
    pub fn level_count(&self) -> usize {
        self.distances.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.distances.is_empty() || self.distances.len() != self.reductions.len() {
            return Err(Error::Config(format!(
                "lod tables need matching non-zero lengths ({} distances, {} reductions)",
                self.distances.len(),
                self.reductions.len()
            )));
        }
        if self.distances.iter().any(|d| !d.is_finite() || *d < 0.0)
            || self.distances.windows(2).any(|w| w[1] < w[0])
        {
            return Err(Error::Config("lod distances must be non-negative and non-decreasing".into()));
        }
        if self.reductions.iter().any(|r| !(0.0..1.0).contains(r))
            || self.reductions.windows(2).any(|w| w[1] < w[0])
        {
            return Err(Error::Config("lod reductions must lie in [0, 1) and be non-decreasing".into()));
        }
        Ok(())
    }

    /// Highest level whose start distance is within `distance`
    pub fn level_for_distance(&self, distance: f32) -> usize {
        self.distances
            .iter()
            .rposition(|&start| start <= distance)
            .unwrap_or(0)
    }

    pub fn reduction(&self, level: usize) -> f32 {
        self.reductions.get(level).copied().unwrap_or(0.0)
    }

    /// Whether `level` differs from the original mesh at all
    pub fn is_simplified(&self, level: usize) -> bool {
        self.reduction(level) > 0.0 || level >= self.simplify_materials_from
    }
}

/// Keep every Nth triangle so roughly `1 - reduction` of them remain,
/// with `N = ceil(count / target)`.
pub fn decimate(geometry: &Geometry, reduction: f32) -> Result<Geometry> {
    let Some(indices) = geometry.indices.as_ref() else {
        return Err(Error::Simplification(format!(
            "geometry '{}' is not indexed",
            geometry.name
        )));
    };
    if indices.len() % 3 != 0 {
        return Err(Error::Simplification(format!(
            "geometry '{}' has {} indices, not a triangle list",
            geometry.name,
            indices.len()
        )));
    }

    let count = indices.len() / 3;
    if count == 0 || reduction <= 0.0 {
        return Ok(geometry.clone());
    }

    let target = ((count as f32) * (1.0 - reduction)).round().max(1.0) as usize;
    let stride = count.div_ceil(target);

    let kept: Vec<u32> = indices
        .chunks_exact(3)
        .step_by(stride)
        .flatten()
        .copied()
        .collect();

    Ok(Geometry {
        name: format!("{}_r{:.0}", geometry.name, reduction * 100.0),
        attributes: geometry.attributes.clone(),
        indices: Some(kept),
        bounds: geometry.bounds,
    })
}

/// A simplified stand-in for one LOD level
#[derive(Clone, Debug)]
pub struct VariantMesh {
    pub level: usize,
    pub distance: f32,
    pub reduction: f32,
    pub mesh: Mesh,
}

/// Build a variant for every simplified level of `config`.
/// Level 0 and unsimplified levels draw the original and get no variant.
pub fn build_variants(mesh: &Mesh, config: &LodConfig) -> Result<Vec<VariantMesh>> {
    let mut flat_materials: Option<Vec<Arc<Material>>> = None;
    let mut variants = Vec::new();

    for level in 0..config.level_count() {
        if !config.is_simplified(level) {
            continue;
        }
        let reduction = config.reduction(level);

        let geometry = if reduction > 0.0 {
            Arc::new(decimate(&mesh.geometry, reduction)?)
        } else {
            mesh.geometry.clone()
        };

        let materials = if level >= config.simplify_materials_from {
            flat_materials
                .get_or_insert_with(|| {
                    mesh.materials
                        .iter()
                        .map(|m| match m.shading {
                            Shading::Lit => Arc::new(m.flattened()),
                            Shading::Unlit => m.clone(),
                        })
                        .collect()
                })
                .clone()
        } else {
            mesh.materials.clone()
        };

        variants.push(VariantMesh {
            level,
            distance: config.distances[level],
            reduction,
            mesh: Mesh::new(format!("{}_lod{}", mesh.name, level), geometry, materials),
        });
    }

    Ok(variants)
}
