//! Progressive scene streaming: classification, chunk planning, activation and distance culling

pub mod chunk;
pub mod culling;
pub mod loader;
pub mod priority;

pub use chunk::{collect_members, plan_chunks, ChunkId, ChunkMember, ChunkSummary, LoadingChunk};
pub use culling::{apply_distance_culling, CullingReport, DistanceThresholds};
pub use loader::{LoadObserver, LoadedMember, LoadingStats, NoopObserver, ProgressiveLoader};
pub use priority::LoadPriority;
