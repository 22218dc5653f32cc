//! # Chunk
//!
//! A pooled, reusable chunk of terrain.
//!
//! Chunks are never destroyed while streaming. When a chunk leaves the window
//! it goes back to the pool of available chunks and is later rebound to a new
//! grid position, so its render-side mesh is recycled instead of reallocated.
//!
//! ## Lifecycle
//!
//! ```text
//! Available -> Queued -> Assigned -> Ready
//!     ^                                |
//!     +------- evicted from window ----+
//! ```
//!
//! A chunk can be evicted from any bound state; a job still working on its old
//! position finishes, and the result is dropped.

use cgmath::Point3;

use crate::engine_state::{rendering::ChunkHandle, streaming::ChunkCoord};

/// Where a chunk is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Not bound to any grid position
    Available,
    /// Bound to a position that is waiting for a job slot
    Queued,
    /// A job is generating the mesh for its position
    Assigned,
    /// The render sink holds an up-to-date mesh for its position
    Ready,
}

/// A reusable terrain chunk.
#[derive(Debug, Clone)]
pub struct Chunk {
    handle: ChunkHandle,
    coord: Option<ChunkCoord>,
    origin: Option<Point3<f32>>,
    state: ChunkState,
    triangle_count: usize,
}

impl Chunk {
    pub fn new(handle: ChunkHandle) -> Self {
        Self {
            handle,
            coord: None,
            origin: None,
            state: ChunkState::Available,
            triangle_count: 0,
        }
    }

    /// Binds the chunk to a grid position and marks it queued.
    pub fn bind(&mut self, coord: ChunkCoord, origin: Point3<f32>) {
        self.coord = Some(coord);
        self.origin = Some(origin);
        self.state = ChunkState::Queued;
    }

    pub fn mark_assigned(&mut self) {
        self.state = ChunkState::Assigned;
    }

    /// Records that the render sink now holds this chunk's mesh.
    pub fn mark_ready(&mut self, triangle_count: usize) {
        self.state = ChunkState::Ready;
        self.triangle_count = triangle_count;
    }

    /// Unbinds the chunk. The last mesh stays with the render sink until the
    /// chunk is reused.
    pub fn evict(&mut self) {
        self.coord = None;
        self.state = ChunkState::Available;
    }

    pub fn handle(&self) -> ChunkHandle {
        self.handle
    }

    pub fn coord(&self) -> Option<ChunkCoord> {
        self.coord
    }

    /// World-space center of the position the chunk was last bound to.
    pub fn origin(&self) -> Option<Point3<f32>> {
        self.origin
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Triangles in the last mesh handed to the render sink.
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_cycles_through_its_states() {
        let mut chunk = Chunk::new(ChunkHandle(3));
        assert_eq!(chunk.state(), ChunkState::Available);

        let coord = ChunkCoord::new(1, -2);
        chunk.bind(coord, Point3::new(16.0, 0.0, -32.0));
        assert_eq!(chunk.state(), ChunkState::Queued);
        assert_eq!(chunk.coord(), Some(coord));

        chunk.mark_assigned();
        chunk.mark_ready(12);
        assert_eq!(chunk.state(), ChunkState::Ready);
        assert_eq!(chunk.triangle_count(), 12);

        chunk.evict();
        assert_eq!(chunk.state(), ChunkState::Available);
        assert_eq!(chunk.coord(), None);
        assert_eq!(chunk.origin(), Some(Point3::new(16.0, 0.0, -32.0)));
        assert_eq!(chunk.handle(), ChunkHandle(3));
    }
}
