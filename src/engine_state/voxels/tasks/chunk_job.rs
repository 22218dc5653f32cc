//! # Chunk Job
//!
//! One schedulable unit of terrain work: sample a chunk's density grid, then
//! triangulate it.
//!
//! A job owns its noise field, parameters, voxel grid and output mesh, so it
//! shares nothing with other jobs and can run on any worker. The loader pool
//! keeps one job per slot and reuses it for chunk after chunk:
//!
//! 1. `recenter()` points the job at a new chunk and clears its outputs
//! 2. the job is sent to a worker, where `execute()` fills the mesh and sets
//!    the completion flag
//! 3. the pool reads the mesh only after seeing the flag, then calls
//!    `clear_completion()` before the slot is reused
//!
//! Buffers are kept between chunks. `reset_parameters()` only reallocates the
//! grid when the new volume is larger than anything the job has held before.

use cgmath::Point3;
use log::debug;
use web_time::{Duration, Instant};

use crate::{
    engine_state::{
        meshing::{self, ChunkMesh},
        task_management::Task,
        voxels::{NoiseField, VoxelGrid},
    },
    error::TerrainError,
    settings::{NoiseParameters, TerrainParameters},
};

/// A reusable sample-and-triangulate job.
pub struct ChunkJob {
    slot: usize,
    noise: NoiseField,
    terrain: TerrainParameters,
    grid: VoxelGrid,
    mesh: ChunkMesh,
    triangle_count: usize,
    complete: bool,
    generation: u64,
}

impl ChunkJob {
    /// Creates a job and allocates its buffers.
    ///
    /// # Arguments
    /// * `slot` - Index of the pool slot that owns this job
    /// * `noise` - Noise parameters
    /// * `terrain` - Terrain parameters; `origin` is the first chunk center
    ///
    /// # Errors
    /// A configuration error if either parameter set is unusable. Nothing is
    /// allocated in that case.
    pub fn new(slot: usize, noise: NoiseParameters, terrain: TerrainParameters) -> Result<Self, TerrainError> {
        let grid = VoxelGrid::new(&terrain)?;
        let noise = NoiseField::new(noise)?;
        Ok(Self {
            slot,
            noise,
            terrain,
            grid,
            mesh: ChunkMesh::new(),
            triangle_count: 0,
            complete: false,
            generation: 0,
        })
    }

    /// Points the job at a new chunk center and forgets the previous result.
    pub fn recenter(&mut self, origin: Point3<f32>) {
        self.terrain.origin = origin;
        self.mesh.clear();
        self.triangle_count = 0;
        self.complete = false;
    }

    /// Switches the job to new parameters, keeping its current origin.
    ///
    /// Both parameter sets are validated before anything changes, so a failed
    /// reset leaves the job usable with its old configuration.
    ///
    /// # Returns
    /// `true` if the voxel grid had to grow into a new allocation.
    pub fn reset_parameters(&mut self, noise: NoiseParameters, terrain: TerrainParameters) -> Result<bool, TerrainError> {
        terrain.validate()?;
        if *self.noise.params() != noise {
            self.noise = NoiseField::new(noise)?;
        }
        let reallocated = self.grid.resize(&terrain)?;

        self.terrain = terrain.with_origin(self.terrain.origin);
        self.mesh.clear();
        self.triangle_count = 0;
        self.complete = false;
        Ok(reallocated)
    }

    /// Samples the grid and triangulates it into the job's mesh.
    ///
    /// The completion flag is set whether or not meshing succeeded; on failure
    /// the mesh is left empty.
    ///
    /// # Returns
    /// The number of triangles produced.
    pub fn execute(&mut self) -> Result<usize, TerrainError> {
        self.grid.sample(self.terrain.origin, &self.noise, &self.terrain);
        let outcome = meshing::triangulate(&self.grid, self.terrain.iso_level, &mut self.mesh);
        self.triangle_count = match &outcome {
            Ok(count) => *count,
            Err(_) => {
                self.mesh.clear();
                0
            }
        };
        self.complete = true;
        outcome
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Resets the completion flag once the result has been consumed.
    pub fn clear_completion(&mut self) {
        self.complete = false;
    }

    /// Releases every buffer the job owns.
    pub fn dispose(self) {
        debug!("Disposing chunk job #{}", self.slot);
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// World-space center of the chunk this job works on.
    pub fn origin(&self) -> Point3<f32> {
        self.terrain.origin
    }

    pub fn terrain(&self) -> &TerrainParameters {
        &self.terrain
    }

    pub fn noise(&self) -> &NoiseParameters {
        self.noise.params()
    }

    pub fn mesh(&self) -> &ChunkMesh {
        &self.mesh
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Configuration generation the job was last reset for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    fn into_mesh(self) -> ChunkMesh {
        self.mesh
    }
}

/// What a worker sends back after running a [`ChunkJob`].
pub struct ChunkJobResult {
    /// The job itself, with its buffers
    pub job: ChunkJob,
    /// Wall time spent sampling and meshing
    pub elapsed: Duration,
    /// Triangle count, or why meshing failed
    pub outcome: Result<usize, TerrainError>,
}

impl Task for ChunkJob {
    type Output = ChunkJobResult;

    fn process(mut self) -> ChunkJobResult {
        let start = Instant::now();
        let outcome = self.execute();
        ChunkJobResult {
            elapsed: start.elapsed(),
            outcome,
            job: self,
        }
    }
}

/// Generates one chunk mesh on the calling thread.
///
/// # Arguments
/// * `noise` - Noise parameters
/// * `terrain` - Terrain parameters (its `origin` is ignored)
/// * `origin` - World-space center of the chunk
///
/// # Returns
/// The chunk's triangles in world space.
pub fn generate_chunk_mesh(
    noise: NoiseParameters,
    terrain: TerrainParameters,
    origin: Point3<f32>,
) -> Result<ChunkMesh, TerrainError> {
    let mut job = ChunkJob::new(0, noise, terrain)?;
    job.recenter(origin);
    job.execute()?;
    Ok(job.into_mesh())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_terrain() -> TerrainParameters {
        TerrainParameters {
            sampling_width: 4,
            sampling_length: 4,
            sampling_height: 8,
            iso_level: 0.0,
            surface_level: 2,
            ..Default::default()
        }
    }

    #[test]
    fn zero_size_volume_fails_at_construction() {
        let terrain = TerrainParameters { sampling_height: 0, ..Default::default() };
        let err = ChunkJob::new(0, NoiseParameters::default(), terrain).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn execute_sets_completion_and_recenter_clears_it() {
        let mut job = ChunkJob::new(1, NoiseParameters::default(), flat_terrain()).unwrap();
        assert!(!job.is_complete());

        let triangles = job.execute().unwrap();
        assert!(job.is_complete());
        assert!(triangles > 0);
        assert_eq!(job.triangle_count(), triangles);
        assert_eq!(job.mesh().triangle_count(), triangles);

        job.recenter(Point3::new(8.0, 0.0, 0.0));
        assert!(!job.is_complete());
        assert_eq!(job.triangle_count(), 0);
        assert!(job.mesh().is_empty());
        assert_eq!(job.origin(), Point3::new(8.0, 0.0, 0.0));
    }

    #[test]
    fn bedrock_surface_sits_between_the_sample_planes() {
        let mesh = generate_chunk_mesh(NoiseParameters::default(), flat_terrain(), Point3::new(0.0, 0.0, 0.0)).unwrap();
        // Four by four cells, two triangles each, all on the bedrock boundary.
        assert_eq!(mesh.triangle_count(), 32);
        for vertex in mesh.vertices() {
            let [x, y, z] = vertex.position;
            assert!(y > 1.0 && y < 2.0, "{y}");
            assert!((-2.0..=2.0).contains(&x) && (-2.0..=2.0).contains(&z));
        }
    }

    #[test]
    fn shrinking_parameters_reuse_the_grid() {
        let mut job = ChunkJob::new(0, NoiseParameters::default(), flat_terrain()).unwrap();
        let smaller = TerrainParameters { sampling_width: 2, ..flat_terrain() };
        assert!(!job.reset_parameters(NoiseParameters::default(), smaller).unwrap());
        assert_eq!(job.grid().dimensions().columns, 2);
        let larger = TerrainParameters { sampling_width: 32, ..flat_terrain() };
        assert!(job.reset_parameters(NoiseParameters::default(), larger).unwrap());
        assert_eq!(job.terrain().sampling_width, 32);
        assert_eq!(job.grid().dimensions().columns, 32);
        assert!(job.grid().capacity() >= job.grid().voxels().len());
    }

    #[test]
    fn failed_reset_keeps_the_old_configuration() {
        let mut job = ChunkJob::new(0, NoiseParameters::default(), flat_terrain()).unwrap();
        job.recenter(Point3::new(4.0, 0.0, 4.0));
        let broken = NoiseParameters { sample_level: 0.0, ..Default::default() };
        assert!(job.reset_parameters(broken, flat_terrain()).is_err());
        assert_eq!(*job.noise(), NoiseParameters::default());
        assert_eq!(job.origin(), Point3::new(4.0, 0.0, 4.0));
        assert!(job.execute().is_ok());
    }

    #[test]
    fn process_hands_back_the_job() {
        let job = ChunkJob::new(5, NoiseParameters::default(), flat_terrain()).unwrap();
        let result = job.process();
        assert_eq!(result.job.slot(), 5);
        assert!(result.job.is_complete());
        assert_eq!(result.outcome.unwrap(), result.job.triangle_count());
    }
}
