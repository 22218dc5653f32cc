//! # Chunk Window
//!
//! The square of chunk positions kept resident around the observer.
//!
//! Chunk positions are integer grid coordinates ([`ChunkCoord`]). A chunk at
//! `(x, z)` is centered on world position `(x * width, 0, z * length)`, so
//! chunk centers sit on multiples of the chunk footprint and the window is a
//! horizontal grid.
//!
//! The observer is snapped to the nearest chunk center, not the one below it:
//! a chunk is "current" while the observer is within half a chunk of its
//! center. Exact ties go to the higher coordinate.

use cgmath::Point3;

use crate::error::TerrainError;

/// Integer position of a chunk on the horizontal chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The chunk whose center is nearest to `position`.
    ///
    /// # Arguments
    /// * `position` - A world-space position; only `x` and `z` matter
    /// * `width` - Chunk footprint along X
    /// * `length` - Chunk footprint along Z
    pub fn nearest(position: Point3<f32>, width: u32, length: u32) -> Self {
        Self {
            x: snap_axis(position.x, width),
            z: snap_axis(position.z, length),
        }
    }

    /// World-space center of this chunk.
    pub fn origin(&self, width: u32, length: u32) -> Point3<f32> {
        Point3::new(
            self.x as f32 * width as f32,
            0.0,
            self.z as f32 * length as f32,
        )
    }

    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }
}

// Nearest multiple, ties toward +infinity.
fn snap_axis(value: f32, size: u32) -> i32 {
    (value / size as f32 + 0.5).floor() as i32
}

/// World-space center of the chunk nearest to `position`.
pub fn snap_to_chunk_center(position: Point3<f32>, width: u32, length: u32) -> Point3<f32> {
    ChunkCoord::nearest(position, width, length).origin(width, length)
}

/// A `(2r+1)²` square of chunk positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub center: ChunkCoord,
    pub radius: u32,
}

/// The result of moving a window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowDiff {
    /// Positions that left the window
    pub evicted: Vec<ChunkCoord>,
    /// Positions that entered the window
    pub added: Vec<ChunkCoord>,
}

impl WindowDiff {
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty() && self.added.is_empty()
    }
}

impl ChunkWindow {
    pub fn new(center: ChunkCoord, radius: u32) -> Self {
        Self { center, radius }
    }

    /// Side length of the window in chunks.
    pub fn side(&self) -> usize {
        2 * self.radius as usize + 1
    }

    /// Number of chunk positions in the window.
    pub fn len(&self) -> usize {
        self.side() * self.side()
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        let r = self.radius as i64;
        (coord.x as i64 - self.center.x as i64).abs() <= r && (coord.z as i64 - self.center.z as i64).abs() <= r
    }

    /// Every position in the window, row by row along Z, each row along X.
    pub fn coords(&self) -> Vec<ChunkCoord> {
        let r = self.radius as i32;
        let mut coords = Vec::with_capacity(self.len());
        for dz in -r..=r {
            for dx in -r..=r {
                coords.push(self.center.offset(dx, dz));
            }
        }
        coords
    }

    /// What changes when the window moves from `self` to `next`.
    ///
    /// # Errors
    /// [`TerrainError::WindowSizeMismatch`] if the eviction and addition sets
    /// differ in size. Two windows of the same radius always give equal sets.
    pub fn diff(&self, next: &ChunkWindow) -> Result<WindowDiff, TerrainError> {
        if self == next {
            return Ok(WindowDiff::default());
        }
        let evicted: Vec<_> = self.coords().into_iter().filter(|c| !next.contains(*c)).collect();
        let added: Vec<_> = next.coords().into_iter().filter(|c| !self.contains(*c)).collect();
        if evicted.len() != added.len() {
            return Err(TerrainError::WindowSizeMismatch {
                evicted: evicted.len(),
                added: added.len(),
            });
        }
        Ok(WindowDiff { evicted, added })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapping_picks_the_nearest_center() {
        assert_eq!(ChunkCoord::nearest(Point3::new(7.9, 3.0, -7.9), 16, 16), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::nearest(Point3::new(8.1, 0.0, 23.0), 16, 16), ChunkCoord::new(1, 1));
        assert_eq!(ChunkCoord::nearest(Point3::new(-8.1, 0.0, 24.1), 16, 16), ChunkCoord::new(-1, 2));
    }

    #[test]
    fn ties_round_toward_the_ceiling() {
        assert_eq!(ChunkCoord::nearest(Point3::new(8.0, 0.0, -8.0), 16, 16), ChunkCoord::new(1, 0));
        assert_eq!(
            snap_to_chunk_center(Point3::new(24.0, 5.0, 4.0), 16, 8),
            Point3::new(32.0, 0.0, 8.0)
        );
    }

    #[test]
    fn window_enumerates_every_position_once() {
        let window = ChunkWindow::new(ChunkCoord::new(3, -1), 2);
        let coords = window.coords();
        assert_eq!(coords.len(), 25);
        assert_eq!(coords[0], ChunkCoord::new(1, -3));
        assert_eq!(coords[24], ChunkCoord::new(5, 1));
        let mut unique = coords.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 25);
        assert!(coords.iter().all(|c| window.contains(*c)));
    }

    #[test]
    fn moving_within_a_cell_changes_nothing() {
        let a = ChunkWindow::new(ChunkCoord::nearest(Point3::new(1.0, 0.0, 1.0), 16, 16), 2);
        let b = ChunkWindow::new(ChunkCoord::nearest(Point3::new(-6.0, 0.0, 7.5), 16, 16), 2);
        assert!(a.diff(&b).unwrap().is_empty());
    }

    #[test]
    fn moving_one_chunk_along_x_swaps_one_column() {
        for radius in 0..4 {
            let a = ChunkWindow::new(ChunkCoord::new(0, 0), radius);
            let b = ChunkWindow::new(ChunkCoord::new(1, 0), radius);
            let diff = a.diff(&b).unwrap();
            let side = 2 * radius as usize + 1;
            assert_eq!(diff.evicted.len(), side);
            assert_eq!(diff.added.len(), side);
            assert!(diff.evicted.iter().all(|c| c.x == -(radius as i32)));
            assert!(diff.added.iter().all(|c| c.x == radius as i32 + 1));
        }
    }

    #[test]
    fn diagonal_moves_keep_the_sets_balanced() {
        let a = ChunkWindow::new(ChunkCoord::new(0, 0), 2);
        let b = ChunkWindow::new(ChunkCoord::new(2, -1), 2);
        let diff = a.diff(&b).unwrap();
        assert_eq!(diff.evicted.len(), diff.added.len());
        assert_eq!(diff.added.len(), 25 - 3 * 4);
    }

    #[test]
    fn radius_change_is_a_size_mismatch() {
        let a = ChunkWindow::new(ChunkCoord::new(0, 0), 1);
        let b = ChunkWindow::new(ChunkCoord::new(0, 0), 2);
        assert!(matches!(
            a.diff(&b),
            Err(TerrainError::WindowSizeMismatch { evicted: 0, added: 16 })
        ));
    }
}
