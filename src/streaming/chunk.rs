//! Partitioning a scene into priority- and size-bounded loading chunks

use std::fmt;

use serde::Serialize;

use crate::scene::{SceneGraph, SceneNodeId};

use super::priority::LoadPriority;

/// Position of a chunk in the global activation order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChunkId(pub u32);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk#{}", self.0)
    }
}

/// A drawable scene object scheduled for activation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChunkMember {
    pub node: SceneNodeId,
    pub name: String,
    pub priority: LoadPriority,
    /// Geometry bytes plus distinct texture bytes
    pub size: u64,
    pub triangles: usize,
}

/// A group of same-priority members activated together
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadingChunk {
    pub id: ChunkId,
    pub priority: LoadPriority,
    pub members: Vec<ChunkMember>,
    pub estimated_size: u64,
    pub loaded: bool,
}

impl LoadingChunk {
    pub fn summary(&self) -> ChunkSummary {
        ChunkSummary {
            id: self.id,
            priority: self.priority,
            member_count: self.members.len(),
            estimated_size: self.estimated_size,
        }
    }
}

/// What observers are told about a chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkSummary {
    pub id: ChunkId,
    pub priority: LoadPriority,
    pub member_count: usize,
    pub estimated_size: u64,
}

/// Classify every drawable in discovery order
pub fn collect_members(graph: &SceneGraph) -> Vec<ChunkMember> {
    graph
        .drawables()
        .into_iter()
        .filter_map(|id| {
            let node = graph.get(id)?;
            let mesh = &node.mesh()?.mesh;
            let triangles = mesh.triangle_count();
            Some(ChunkMember {
                node: id,
                name: node.name.clone(),
                priority: LoadPriority::classify(&node.name, triangles),
                size: mesh.payload_bytes(),
                triangles,
            })
        })
        .collect()
}

/// Split members into chunks: grouped by priority (Critical first), each
/// class chunked greedily in discovery order so no chunk exceeds `size_limit`
/// unless it holds a single oversized member.
pub fn plan_chunks(members: Vec<ChunkMember>, size_limit: u64) -> Vec<LoadingChunk> {
    let mut chunks = Vec::new();

    for priority in LoadPriority::ALL {
        let mut current: Vec<ChunkMember> = Vec::new();
        let mut current_size = 0u64;

        for member in members.iter().filter(|m| m.priority == priority) {
            if !current.is_empty() && current_size.saturating_add(member.size) > size_limit {
                push_chunk(&mut chunks, priority, std::mem::take(&mut current), current_size);
                current_size = 0;
            }
            current_size = current_size.saturating_add(member.size);
            current.push(member.clone());
        }

        if !current.is_empty() {
            push_chunk(&mut chunks, priority, current, current_size);
        }
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<LoadingChunk>, priority: LoadPriority, members: Vec<ChunkMember>, size: u64) {
    let id = ChunkId(chunks.len() as u32);
    if members.len() == 1 {
        log::trace!("{}: single {} member '{}' ({} bytes)", id, priority, members[0].name, size);
    }
    chunks.push(LoadingChunk {
        id,
        priority,
        members,
        estimated_size: size,
        loaded: false,
    });
}
