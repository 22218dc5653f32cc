use cgmath::Point3;

/// A single density sample of the terrain.
///
/// Voxels are the corners of the Marching Cubes cells. A voxel whose density
/// is at or above the iso-level counts as solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel {
    /// World-space position of the sample
    pub position: Point3<f32>,
    /// Scalar density at `position`
    pub density: f32,
}

impl Voxel {
    pub fn new(position: Point3<f32>, density: f32) -> Self {
        Self { position, density }
    }

    /// Whether this voxel lies inside the surface for the given iso-level.
    #[inline]
    pub fn is_solid(&self, iso_level: f32) -> bool {
        self.density >= iso_level
    }
}

impl Default for Voxel {
    fn default() -> Self {
        Self::new(Point3::new(0.0, 0.0, 0.0), 0.0)
    }
}
