//! # Voxel Terrain
//!
//! Everything needed to turn a chunk position into density samples.
//!
//! ## Architecture
//!
//! * **NoiseField**: a seeded fractal noise function giving every point a density
//! * **Voxel**: one density sample, with its world position
//! * **VoxelGrid**: the flattened lattice of samples covering one chunk volume
//! * **Chunk**: a pooled chunk that is rebound to new positions as the window moves
//! * **Tasks**: the chunk job that samples and triangulates a chunk on a worker
//!
//! ## Data Flow
//!
//! 1. The loader pool binds a chunk to a grid position
//! 2. A chunk job is recentered on that position and sent to a worker
//! 3. The job samples its `VoxelGrid` through the `NoiseField`
//! 4. The grid is triangulated by the meshing module
//! 5. The finished mesh is handed to the render sink for the bound chunk

pub mod chunk;
pub mod grid;
pub mod noise_field;
pub mod tasks;
pub mod voxel;

pub use chunk::{Chunk, ChunkState};
pub use grid::{GridDimensions, VoxelGrid};
pub use noise_field::{NoiseField, SOLID_DENSITY};
pub use voxel::Voxel;
