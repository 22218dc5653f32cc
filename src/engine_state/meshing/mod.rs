//! # Marching Cubes Meshing
//!
//! Turns a sampled [`VoxelGrid`] into a triangle mesh of the iso-surface.
//!
//! ## Algorithm
//!
//! Every cell of the grid is visited level by level, row by row, column by
//! column. For each cell:
//!
//! 1. The eight corner voxels are gathered with fixed offsets from the cell's
//!    base index ([`tables::corner_offsets`]).
//! 2. The corners are classified into an 8-bit edge mask; a corner is solid
//!    when its density is at or above the iso-level.
//! 3. Masks `0` and `255` lie entirely outside or inside the surface and are
//!    skipped.
//! 4. Otherwise the case tables give up to five triangles, each a triple of
//!    cube edges. Every edge yields one vertex, linearly interpolated between
//!    the edge's two corners.
//!
//! All cells append to one [`ChunkMesh`] whose indices stay sequential, so
//! the concatenated buffers are valid as they are.
//!
//! ## Failure Handling
//!
//! A cell that reports more triangles than the topological limit is logged and
//! skipped; the rest of the chunk is still meshed.

use log::error;

use crate::{engine_state::voxels::VoxelGrid, error::TerrainError};

pub mod cell;
pub mod mesh;
pub mod tables;

pub use cell::{edge_weight, VoxelCell};
pub use mesh::{ChunkMesh, Vertex};

/// Triangulates every cell of `grid` into `mesh`.
///
/// `mesh` is cleared first, so a job can reuse the same buffers between
/// chunks.
///
/// # Arguments
/// * `grid` - A sampled voxel grid
/// * `iso_level` - Density separating solid from empty space
/// * `mesh` - Output buffers
///
/// # Returns
/// The number of triangles in the mesh, or the first invariant violation if
/// every surface cell failed.
pub fn triangulate(grid: &VoxelGrid, iso_level: f32, mesh: &mut ChunkMesh) -> Result<usize, TerrainError> {
    mesh.clear();

    let dims = grid.dimensions();
    let offsets = tables::corner_offsets(dims.row_size(), dims.level_size());
    let voxels = grid.voxels();

    let mut triangles = 0;
    let mut first_failure = None;
    let mut surface_cells = 0usize;
    let mut failed_cells = 0usize;

    for level in 0..dims.levels {
        for row in 0..dims.rows {
            for column in 0..dims.columns {
                let base = dims.index(column, row, level);
                let cell = VoxelCell::gather(voxels, base, &offsets);
                match cell.triangulate(iso_level, mesh) {
                    Ok(0) => {}
                    Ok(count) => {
                        triangles += count;
                        surface_cells += 1;
                    }
                    Err(err) => {
                        let center = cell.centroid();
                        error!(
                            "Skipping cell ({column}, {row}, {level}) at ({:.2}, {:.2}, {:.2}): {err}",
                            center.x, center.y, center.z
                        );
                        surface_cells += 1;
                        failed_cells += 1;
                        first_failure.get_or_insert(err);
                    }
                }
            }
        }
    }

    match first_failure {
        Some(err) if failed_cells == surface_cells => Err(err),
        _ => Ok(triangles),
    }
}
