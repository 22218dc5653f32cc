//! # Voxel Grid
//!
//! A flattened 3D lattice of [`Voxel`]s covering one chunk volume.
//!
//! ## Layout
//!
//! Samples are stored column-fastest, then row, then level:
//!
//! ```text
//! index = column + row * row_size + level * level_size
//! row_size   = width * scale + 1
//! level_size = (width * scale + 1) * (length * scale + 1)
//! ```
//!
//! Columns run along X, rows along Z and levels along Y. There is one more
//! sample than cells along every axis so that each cell has all eight corners.
//!
//! ## Reuse
//!
//! A grid is owned by exactly one chunk job and lives as long as the job.
//! [`VoxelGrid::resize`] only reallocates when the new volume needs more
//! samples than the buffer can hold; a shrink truncates the logical length and
//! keeps the allocation, so nothing past the new extent is ever visible.

use cgmath::Point3;

use super::{noise_field::NoiseField, voxel::Voxel};
use crate::{error::TerrainError, settings::TerrainParameters};

/// Cell counts and strides of a voxel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDimensions {
    /// Cells along X (`width * scale`)
    pub columns: usize,
    /// Cells along Z (`length * scale`)
    pub rows: usize,
    /// Cells along Y (`height * scale`)
    pub levels: usize,
}

impl GridDimensions {
    /// Derives the grid dimensions for a terrain configuration.
    ///
    /// # Errors
    /// Fails with the terrain's configuration error when any extent or the scale
    /// is zero.
    pub fn from_terrain(terrain: &TerrainParameters) -> Result<Self, TerrainError> {
        terrain.validate()?;
        let scale = terrain.scale as usize;
        Ok(Self {
            columns: terrain.sampling_width as usize * scale,
            rows: terrain.sampling_length as usize * scale,
            levels: terrain.sampling_height as usize * scale,
        })
    }

    /// Stride between two consecutive rows.
    #[inline]
    pub fn row_size(&self) -> usize {
        self.columns + 1
    }

    /// Stride between two consecutive levels.
    #[inline]
    pub fn level_size(&self) -> usize {
        (self.columns + 1) * (self.rows + 1)
    }

    /// Total number of samples.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.level_size() * (self.levels + 1)
    }

    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.columns * self.rows * self.levels
    }

    /// Flattened index of the sample at `(column, row, level)`.
    #[inline]
    pub fn index(&self, column: usize, row: usize, level: usize) -> usize {
        column + row * self.row_size() + level * self.level_size()
    }
}

/// The density samples of one chunk volume.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    dimensions: GridDimensions,
    voxels: Vec<Voxel>,
}

impl VoxelGrid {
    /// Allocates a grid for the given terrain configuration.
    ///
    /// # Errors
    /// Returns a configuration error, without allocating, when any sampling
    /// extent or the scale is zero.
    pub fn new(terrain: &TerrainParameters) -> Result<Self, TerrainError> {
        let dimensions = GridDimensions::from_terrain(terrain)?;
        Ok(Self {
            dimensions,
            voxels: vec![Voxel::default(); dimensions.point_count()],
        })
    }

    /// Adapts the grid to a new terrain configuration.
    ///
    /// # Returns
    /// `true` if the sample buffer had to be reallocated, `false` if the
    /// existing allocation was reused.
    ///
    /// # Errors
    /// Returns a configuration error and leaves the grid untouched when the new
    /// configuration describes an empty volume.
    pub fn resize(&mut self, terrain: &TerrainParameters) -> Result<bool, TerrainError> {
        let dimensions = GridDimensions::from_terrain(terrain)?;
        let required = dimensions.point_count();
        let reallocated = required > self.voxels.capacity();

        if required > self.voxels.len() {
            self.voxels.resize(required, Voxel::default());
        } else {
            self.voxels.truncate(required);
        }
        self.dimensions = dimensions;
        Ok(reallocated)
    }

    /// Fills every sample with its world position and density.
    ///
    /// # Arguments
    /// * `origin` - World-space center of the chunk
    /// * `noise` - The density function
    /// * `terrain` - Must describe the same volume the grid was sized for
    pub fn sample(&mut self, origin: Point3<f32>, noise: &NoiseField, terrain: &TerrainParameters) {
        let dims = self.dimensions;
        let scale = terrain.scale as f32;
        let half_width = terrain.sampling_width as f32 / 2.0;
        let half_length = terrain.sampling_length as f32 / 2.0;
        let bedrock = terrain.bedrock_level as f32;

        let mut index = 0;
        for level in 0..=dims.levels {
            let y = origin.y + bedrock + level as f32 / scale;
            for row in 0..=dims.rows {
                let z = origin.z - half_length + row as f32 / scale;
                for column in 0..=dims.columns {
                    let x = origin.x - half_width + column as f32 / scale;
                    let position = Point3::new(x, y, z);
                    self.voxels[index] = Voxel::new(position, noise.density(position, terrain));
                    index += 1;
                }
            }
        }
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Mutable access for callers that fill densities themselves.
    pub fn voxels_mut(&mut self) -> &mut [Voxel] {
        &mut self.voxels
    }

    /// The sample at `(column, row, level)`, if it lies inside the grid.
    pub fn get(&self, column: usize, row: usize, level: usize) -> Option<&Voxel> {
        let dims = self.dimensions;
        if column > dims.columns || row > dims.rows || level > dims.levels {
            return None;
        }
        self.voxels.get(dims.index(column, row, level))
    }

    /// Number of samples the current allocation can hold.
    pub fn capacity(&self) -> usize {
        self.voxels.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::NoiseParameters;

    fn terrain(width: u32, length: u32, height: u32, scale: u32) -> TerrainParameters {
        TerrainParameters {
            sampling_width: width,
            sampling_length: length,
            sampling_height: height,
            scale,
            ..Default::default()
        }
    }

    #[test]
    fn strides_follow_the_flattened_layout() {
        let dims = GridDimensions::from_terrain(&terrain(4, 3, 2, 2)).unwrap();
        assert_eq!(dims.row_size(), 9);
        assert_eq!(dims.level_size(), 9 * 7);
        assert_eq!(dims.point_count(), 9 * 7 * 5);
        assert_eq!(dims.index(1, 2, 3), 1 + 2 * 9 + 3 * 63);
        assert_eq!(dims.cell_count(), 8 * 6 * 4);
    }

    #[test]
    fn zero_width_fails_before_allocation() {
        let err = VoxelGrid::new(&terrain(0, 16, 16, 1)).unwrap_err();
        assert!(matches!(err, TerrainError::ZeroSizeVolume { width: 0, .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn sample_positions_are_centered_on_the_origin() {
        let params = terrain(4, 2, 2, 2);
        let noise = NoiseField::new(NoiseParameters::default()).unwrap();
        let mut grid = VoxelGrid::new(&params).unwrap();
        grid.sample(Point3::new(10.0, 0.0, -4.0), &noise, &params);

        let first = grid.get(0, 0, 0).unwrap();
        assert_eq!(first.position, Point3::new(8.0, 0.0, -5.0));
        let last = grid.get(8, 4, 4).unwrap();
        assert_eq!(last.position, Point3::new(12.0, 2.0, -3.0));
        let mid = grid.get(3, 1, 1).unwrap();
        assert_eq!(mid.position, Point3::new(9.5, 0.5, -4.5));
        assert!(grid.get(9, 0, 0).is_none());
    }

    #[test]
    fn shrinking_reuses_the_allocation() {
        let mut grid = VoxelGrid::new(&terrain(8, 8, 8, 1)).unwrap();
        let capacity = grid.capacity();

        assert!(!grid.resize(&terrain(4, 4, 4, 1)).unwrap());
        assert_eq!(grid.capacity(), capacity);
        assert_eq!(grid.voxels().len(), 5 * 5 * 5);

        assert!(grid.resize(&terrain(16, 8, 8, 1)).unwrap());
        assert_eq!(grid.voxels().len(), 17 * 9 * 9);
    }

    #[test]
    fn invalid_resize_leaves_grid_untouched() {
        let mut grid = VoxelGrid::new(&terrain(4, 4, 4, 1)).unwrap();
        assert!(grid.resize(&terrain(4, 0, 4, 1)).is_err());
        assert_eq!(grid.dimensions().rows, 4);
        assert_eq!(grid.voxels().len(), 125);
    }
}
