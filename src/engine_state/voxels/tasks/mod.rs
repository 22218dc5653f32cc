//! # Voxel Task System
//!
//! Work that runs on the terrain worker threads. Each task owns its buffers
//! and comes back to the caller when it is done, so the buffers can be reused
//! for the next chunk.

pub mod chunk_job;

pub use chunk_job::{generate_chunk_mesh, ChunkJob, ChunkJobResult};
