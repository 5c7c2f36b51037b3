//! Adaptive quality: frustum culling, distance LOD and the frame-rate control loop

pub mod controller;
pub mod lod;
pub mod metrics;
pub mod render;

pub use controller::{OptimizationStats, QualityController, QualityLevel, QualityState, TickReport};
pub use lod::{LodConfig, VariantMesh};
pub use metrics::{MetricsSource, PerformanceSample, SampleWindow, ScriptedMetrics};
pub use render::{RenderSettings, RenderTarget};
