//! Distance-based visibility for low-priority content after loading

use crate::core::config::StreamingConfig;
use crate::core::types::Vec3;
use crate::scene::SceneGraph;

use super::chunk::LoadingChunk;
use super::priority::LoadPriority;

/// Maximum visible distance per priority class; `None` means always shown
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceThresholds {
    pub medium: f32,
    pub low: f32,
}

impl DistanceThresholds {
    pub fn from_config(config: &StreamingConfig) -> Self {
        Self {
            medium: config.medium_cull_distance,
            low: config.low_cull_distance,
        }
    }

    pub fn limit(&self, priority: LoadPriority) -> Option<f32> {
        match priority {
            LoadPriority::Critical | LoadPriority::High => None,
            LoadPriority::Medium => Some(self.medium),
            LoadPriority::Low => Some(self.low),
        }
    }
}

impl Default for DistanceThresholds {
    fn default() -> Self {
        Self::from_config(&StreamingConfig::default())
    }
}

/// Visibility changes made by one culling pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CullingReport {
    pub hidden: usize,
    pub shown: usize,
}

/// Toggle visibility of the given chunks' members by their distance to `observer`.
pub fn apply_distance_culling<'a>(
    chunks: impl IntoIterator<Item = &'a LoadingChunk>,
    graph: &mut SceneGraph,
    observer: Vec3,
    thresholds: &DistanceThresholds,
) -> CullingReport {
    let mut report = CullingReport::default();

    for chunk in chunks {
        let Some(limit) = thresholds.limit(chunk.priority) else {
            continue;
        };
        for member in &chunk.members {
            let Some(bounds) = graph.world_bounds(member.node) else {
                continue;
            };
            let in_range = observer.distance(bounds.center()) <= limit;
            let Some(node) = graph.get_mut(member.node) else {
                continue;
            };
            if node.visible != in_range {
                node.visible = in_range;
                if in_range {
                    report.shown += 1;
                } else {
                    report.hidden += 1;
                }
            }
        }
    }

    if report != CullingReport::default() {
        log::trace!("Distance culling: {} hidden, {} shown", report.hidden, report.shown);
    }
    report
}
