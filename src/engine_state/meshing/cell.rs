//! A single Marching Cubes cell: eight corner voxels and the triangles they produce.

use cgmath::{EuclideanSpace, Point3};

use super::{
    mesh::ChunkMesh,
    tables::{CASE_TO_TRIANGLE_COUNT, EDGE_CORNERS, MAX_TRIANGLES_PER_CELL, TRIANGULATION},
};
use crate::{engine_state::voxels::Voxel, error::TerrainError};

/// Interpolation weight used when both corners of an edge have the same density.
pub const DEGENERATE_EDGE_WEIGHT: f32 = 0.5;

/// Position of the iso-surface along an edge, as a fraction of the way from
/// the first corner to the second.
///
/// For an edge that crosses the surface (one density at or above `iso_level`,
/// the other below) the result lies in `[0, 1]`. Equal densities, or any input
/// that would not give a finite weight, fall back to [`DEGENERATE_EDGE_WEIGHT`].
#[inline]
pub fn edge_weight(first: f32, second: f32, iso_level: f32) -> f32 {
    let denominator = first - second;
    if denominator.abs() <= f32::EPSILON {
        return DEGENERATE_EDGE_WEIGHT;
    }
    let weight = (first - iso_level) / denominator;
    if weight.is_finite() {
        weight
    } else {
        DEGENERATE_EDGE_WEIGHT
    }
}

/// The eight corners of one cell, in table order.
#[derive(Debug, Clone, Copy)]
pub struct VoxelCell {
    pub corners: [Voxel; 8],
}

impl VoxelCell {
    /// Gathers a cell from a flattened voxel buffer.
    ///
    /// # Arguments
    /// * `voxels` - The grid samples
    /// * `base` - Flattened index of corner 0
    /// * `offsets` - Corner offsets from [`super::tables::corner_offsets`]
    #[inline]
    pub fn gather(voxels: &[Voxel], base: usize, offsets: &[usize; 8]) -> Self {
        Self {
            corners: (*offsets).map(|offset| voxels[base + offset]),
        }
    }

    /// Classifies the corners against `iso_level`; bit `i` is set when corner
    /// `i` is solid.
    #[inline]
    pub fn edge_mask(&self, iso_level: f32) -> u8 {
        self.corners
            .iter()
            .enumerate()
            .fold(0u8, |mask, (i, corner)| {
                if corner.is_solid(iso_level) {
                    mask | (1 << i)
                } else {
                    mask
                }
            })
    }

    /// Whether a cell with this mask crosses the surface at all.
    #[inline]
    pub fn is_on_surface(edge_mask: u8) -> bool {
        edge_mask != 0 && edge_mask != u8::MAX
    }

    /// Surface point on one of the twelve cube edges.
    pub fn interpolate_edge(&self, edge: usize, iso_level: f32) -> Point3<f32> {
        let [a, b] = EDGE_CORNERS[edge];
        let (first, second) = (&self.corners[a], &self.corners[b]);
        let weight = edge_weight(first.density, second.density, iso_level);
        first.position + (second.position - first.position) * weight
    }

    /// Appends this cell's triangles to `mesh`.
    ///
    /// # Returns
    /// The number of triangles written (zero for cells entirely inside or
    /// outside the surface).
    ///
    /// # Errors
    /// [`TerrainError::TriangleLimitExceeded`] if the case table asks for more
    /// than five triangles. Nothing is written in that case.
    pub fn triangulate(&self, iso_level: f32, mesh: &mut ChunkMesh) -> Result<usize, TerrainError> {
        let edge_mask = self.edge_mask(iso_level);
        if !Self::is_on_surface(edge_mask) {
            return Ok(0);
        }

        let count = CASE_TO_TRIANGLE_COUNT[edge_mask as usize] as usize;
        if count > MAX_TRIANGLES_PER_CELL {
            return Err(TerrainError::TriangleLimitExceeded { edge_mask, count });
        }

        let edges = &TRIANGULATION[edge_mask as usize];
        for triangle in edges[..count * 3].chunks_exact(3) {
            mesh.push_triangle([
                self.interpolate_edge(triangle[0] as usize, iso_level),
                self.interpolate_edge(triangle[1] as usize, iso_level),
                self.interpolate_edge(triangle[2] as usize, iso_level),
            ]);
        }
        Ok(count)
    }

    /// World-space center of the cell, used to locate failing cells in logs.
    pub fn centroid(&self) -> Point3<f32> {
        Point3::centroid(&self.corners.map(|corner| corner.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Unit cube laid out in corner order: 0-3 on z = 0, 4-7 on z = 1.
    fn unit_cell(densities: [f32; 8]) -> VoxelCell {
        let ring = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let mut corners = [Voxel::default(); 8];
        for i in 0..8 {
            let mut position = ring[i % 4];
            position.z = if i < 4 { 0.0 } else { 1.0 };
            corners[i] = Voxel::new(position, densities[i]);
        }
        VoxelCell { corners }
    }

    #[test]
    fn uniform_cells_produce_nothing() {
        let mut mesh = ChunkMesh::new();
        for density in [-1.0, 0.25, 1.0] {
            let cell = unit_cell([density; 8]);
            assert_eq!(cell.triangulate(0.5, &mut mesh).unwrap(), 0);
        }
        assert!(mesh.is_empty());
    }

    #[test]
    fn mask_fifteen_cuts_the_cell_in_half() {
        let cell = unit_cell([1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0]);
        assert_eq!(cell.edge_mask(0.0), 0b0000_1111);

        let mut mesh = ChunkMesh::new();
        assert_eq!(cell.triangulate(0.0, &mut mesh).unwrap(), 2);
        assert_eq!(mesh.vertices().len(), 6);
        assert_eq!(mesh.indices(), &[0, 1, 2, 3, 4, 5]);
        for vertex in mesh.vertices() {
            assert_eq!(vertex.position[2], 0.5);
        }
        // Edge 9 first: the midpoint between corners 1 and 5.
        assert_eq!(mesh.vertices()[0].position, [0.0, 1.0, 0.5]);
    }

    #[test]
    fn corners_at_the_iso_level_are_solid() {
        let cell = unit_cell([1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(cell.edge_mask(0.0), u8::MAX);
        assert_eq!(cell.edge_mask(0.5), 0b0000_1111);
    }

    #[test]
    fn crossing_edges_have_weights_in_unit_range() {
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..10_000 {
            let iso = rng.f32() * 2.0 - 1.0;
            let solid = iso + rng.f32() * 4.0;
            let empty = iso - (rng.f32() + f32::EPSILON) * 4.0;
            let (first, second) = if rng.bool() { (solid, empty) } else { (empty, solid) };
            let weight = edge_weight(first, second, iso);
            assert!((0.0..=1.0).contains(&weight), "{first} {second} {iso} -> {weight}");
        }
    }

    #[test]
    fn equal_densities_do_not_produce_nan() {
        assert_eq!(edge_weight(0.3, 0.3, 0.3), DEGENERATE_EDGE_WEIGHT);
        assert_eq!(edge_weight(f32::INFINITY, f32::INFINITY, 0.0), DEGENERATE_EDGE_WEIGHT);
    }

    #[test]
    fn every_mixed_cell_emits_finite_vertices() {
        let mut rng = fastrand::Rng::with_seed(19);
        let mut mesh = ChunkMesh::new();
        for _ in 0..2_000 {
            let densities = [(); 8].map(|_| rng.f32() * 2.0 - 1.0);
            let cell = unit_cell(densities);
            cell.triangulate(0.0, &mut mesh).unwrap();
        }
        assert!(!mesh.is_empty());
        for vertex in mesh.vertices() {
            assert!(vertex.position.iter().all(|c| c.is_finite() && (0.0..=1.0).contains(c)));
        }
    }

    #[test]
    fn centroid_is_the_cell_center() {
        let cell = unit_cell([0.0; 8]);
        assert_eq!(cell.centroid(), Point3::new(0.5, 0.5, 0.5));
    }
}
