//! Render-side interface of the terrain streamer.
//!
//! The streamer never draws anything itself. Finished meshes are pushed into a
//! [`RenderSink`], one call per completed chunk, in chunk-local coordinates.
//! A real renderer uploads them into GPU buffers; [`MeshStore`] just keeps them
//! in memory.

mod mesh_store;

pub use mesh_store::{MeshStore, StoredMesh};

use crate::engine_state::meshing::Vertex;

/// Stable identifier of a pooled chunk.
///
/// Handles are assigned once when the chunk pool is built and survive every
/// rebind of the chunk to a new position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkHandle(pub usize);

/// Receives finished chunk meshes.
pub trait RenderSink {
    /// Replaces the mesh of `chunk`.
    ///
    /// Called once per completed chunk job. Buffers may be larger or smaller
    /// than the previous mesh of the same chunk; the old mesh is discarded.
    fn apply_mesh(&mut self, chunk: ChunkHandle, vertices: &[Vertex], indices: &[u32]);

    /// The chunk has left the pool and will not be used again.
    fn release_chunk(&mut self, _chunk: ChunkHandle) {}
}
