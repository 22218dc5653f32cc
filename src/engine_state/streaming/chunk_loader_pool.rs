//! # Chunk Loader Pool
//!
//! Keeps the `(2r+1)²` chunks around the observer generated.
//!
//! ## Architecture
//!
//! The loader pool owns three things:
//!
//! * a fixed set of reusable [`Chunk`]s, one per window position
//! * a queue of window positions waiting for a job
//! * a [`JobPool`] of chunk jobs running on worker threads
//!
//! It runs on the caller's thread and only advances when [`ChunkLoaderPool::tick`]
//! is called. Each tick:
//!
//! 1. **Receive**: finished jobs are collected. Their meshes are moved into the
//!    chunk-local frame, optionally smoothed, and handed to the render sink.
//!    Results for positions that have since left the window, or that were made
//!    with parameters that have since changed, are dropped.
//! 2. **Rewindow**: the observer is snapped to the nearest chunk center. If that
//!    center moved, the positions leaving the window free their chunks, and the
//!    positions entering it take those chunks over and are queued.
//! 3. **Dispatch**: queued positions are handed to idle job slots. Once every
//!    slot is busy the rest stay queued for a later tick.
//!
//! ## Failure Handling
//!
//! Invariant violations (unbalanced window diffs, results with no chunk to go
//! to, meshing failures) are logged and abandon only the operation that hit
//! them. Invalid parameters are rejected before anything changes.

use std::collections::{HashMap, VecDeque};

use cgmath::Point3;
use log::{debug, error, info};

use super::{
    job_pool::{CompletedJob, JobPool},
    window::{ChunkCoord, ChunkWindow, WindowDiff},
};
use crate::{
    engine_state::{
        rendering::{ChunkHandle, RenderSink},
        voxels::{Chunk, ChunkState},
    },
    error::TerrainError,
    settings::{validate_render_distance, NoiseParameters, TerrainParameters, TerrainSettings},
};

/// What happened during one [`ChunkLoaderPool::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Positions that left the window
    pub evicted: usize,
    /// Positions that entered the window and were queued
    pub queued: usize,
    /// Queued positions handed to a job slot
    pub dispatched: usize,
    /// Meshes handed to the render sink
    pub applied: usize,
    /// Finished jobs whose results were dropped
    pub discarded: usize,
}

impl std::ops::AddAssign for TickReport {
    fn add_assign(&mut self, other: Self) {
        self.evicted += other.evicted;
        self.queued += other.queued;
        self.dispatched += other.dispatched;
        self.applied += other.applied;
        self.discarded += other.discarded;
    }
}

/// Streams terrain chunks around a moving observer.
pub struct ChunkLoaderPool {
    noise: NoiseParameters,
    terrain: TerrainParameters,
    render_distance: u32,
    smooth_normals: bool,
    chunks: Vec<Chunk>,
    available_chunks: VecDeque<usize>,
    assignments: HashMap<ChunkCoord, usize>,
    origin_queue: VecDeque<ChunkCoord>,
    window: Option<ChunkWindow>,
    generation: u64,
    jobs: JobPool,
}

impl ChunkLoaderPool {
    /// Builds the chunk pool and starts the workers.
    ///
    /// Nothing is queued until the first tick tells the pool where the
    /// observer is.
    ///
    /// # Errors
    /// A configuration error for unusable settings, or
    /// [`TerrainError::WorkerSpawn`] if the workers cannot start.
    pub fn new(settings: &TerrainSettings) -> Result<Self, TerrainError> {
        settings.validate()?;
        let streaming = settings.streaming;
        let workers = streaming.resolved_worker_threads();
        let job_slots = streaming.resolved_job_slots();
        let chunk_count = ChunkWindow::new(ChunkCoord::new(0, 0), streaming.render_distance).len();

        let jobs = JobPool::new(job_slots, workers, settings.noise, settings.terrain)?;
        let chunks = (0..chunk_count).map(|idx| Chunk::new(ChunkHandle(idx))).collect();

        info!(
            "Chunk loader pool created: {} chunks, {} job slots on {} workers, {}x{}x{} volume at scale {}",
            chunk_count,
            job_slots,
            workers,
            settings.terrain.sampling_width,
            settings.terrain.sampling_height,
            settings.terrain.sampling_length,
            settings.terrain.scale
        );

        Ok(Self {
            noise: settings.noise,
            terrain: settings.terrain,
            render_distance: streaming.render_distance,
            smooth_normals: streaming.smooth_normals,
            chunks,
            available_chunks: (0..chunk_count).collect(),
            assignments: HashMap::with_capacity(chunk_count),
            origin_queue: VecDeque::with_capacity(chunk_count),
            window: None,
            generation: 0,
            jobs,
        })
    }

    /// Runs one receive, rewindow, dispatch cycle.
    pub fn tick(&mut self, observer: Point3<f32>, sink: &mut impl RenderSink) -> TickReport {
        let mut report = TickReport::default();

        let (applied, discarded) = self.receive_dispatch(sink);
        report.applied = applied;
        report.discarded = discarded;

        match self.create_chunk_queue(observer) {
            Ok(diff) => {
                report.evicted = diff.evicted.len();
                report.queued = diff.added.len();
            }
            Err(err) => error!("Window update abandoned: {}", err),
        }

        report.dispatched = self.dispatch_queue();
        report
    }

    /// Moves the window to the chunk nearest `observer`.
    ///
    /// The first call queues the whole window. Afterwards only positions that
    /// enter the window are queued, each taking over the chunk of a position
    /// that left it. Queued positions that left the window before being
    /// dispatched are dropped from the queue.
    ///
    /// # Errors
    /// [`TerrainError::WindowSizeMismatch`] if the diff is unbalanced; the
    /// window is left where it was.
    pub fn create_chunk_queue(&mut self, observer: Point3<f32>) -> Result<WindowDiff, TerrainError> {
        let center = ChunkCoord::nearest(observer, self.terrain.sampling_width, self.terrain.sampling_length);
        let next = ChunkWindow::new(center, self.render_distance);

        let diff = match self.window {
            Some(current) if current == next => return Ok(WindowDiff::default()),
            Some(current) => current.diff(&next)?,
            None => WindowDiff {
                evicted: Vec::new(),
                added: next.coords(),
            },
        };

        if !diff.evicted.is_empty() {
            self.origin_queue.retain(|coord| next.contains(*coord));
        }
        for coord in &diff.evicted {
            if let Some(idx) = self.assignments.remove(coord) {
                self.chunks[idx].evict();
                self.available_chunks.push_back(idx);
            }
        }

        let (width, length) = (self.terrain.sampling_width, self.terrain.sampling_length);
        for &coord in &diff.added {
            let Some(idx) = self.available_chunks.pop_front() else {
                error!("No free chunk for position ({}, {}); skipping it", coord.x, coord.z);
                continue;
            };
            self.chunks[idx].bind(coord, coord.origin(width, length));
            self.assignments.insert(coord, idx);
            self.origin_queue.push_back(coord);
        }

        self.window = Some(next);
        info!(
            "Window centered on chunk ({}, {}): {} evicted, {} queued",
            center.x,
            center.z,
            diff.evicted.len(),
            diff.added.len()
        );
        Ok(diff)
    }

    /// Hands queued positions to idle job slots.
    ///
    /// # Returns
    /// How many positions were dispatched.
    pub fn dispatch_queue(&mut self) -> usize {
        if self.origin_queue.is_empty() {
            return 0;
        }
        let (width, length) = (self.terrain.sampling_width, self.terrain.sampling_length);
        let dispatched = self
            .jobs
            .dispatch_from(&mut self.origin_queue, |coord| coord.origin(width, length));

        for coord in &dispatched {
            if let Some(&idx) = self.assignments.get(coord) {
                self.chunks[idx].mark_assigned();
            }
        }
        dispatched.len()
    }

    /// Drains finished jobs into the render sink and frees their slots.
    ///
    /// # Returns
    /// `(applied, discarded)` result counts.
    pub fn receive_dispatch(&mut self, sink: &mut impl RenderSink) -> (usize, usize) {
        let mut applied = 0;
        let mut discarded = 0;

        for done in self.jobs.collect_completed() {
            let slot = done.slot;
            match self.apply_completed(done, sink) {
                Ok(true) => applied += 1,
                Ok(false) => discarded += 1,
                Err(err) => {
                    error!("Dropping result of job slot #{}: {}", slot, err);
                    discarded += 1;
                }
            }
            if let Err(err) = self.jobs.release(slot) {
                error!("Could not release job slot #{}: {}", slot, err);
            }
        }
        (applied, discarded)
    }

    // Ok(false) for results that are simply out of date.
    fn apply_completed(&mut self, done: CompletedJob, sink: &mut impl RenderSink) -> Result<bool, TerrainError> {
        let CompletedJob {
            slot,
            coord,
            elapsed,
            outcome,
        } = done;
        outcome?;

        let job = self
            .jobs
            .completed_job(slot)
            .ok_or(TerrainError::UnknownJobSlot(slot))?;
        if job.generation() != self.generation {
            debug!(
                "Discarding job slot #{} from configuration generation {} (now {})",
                slot,
                job.generation(),
                self.generation
            );
            return Ok(false);
        }

        let coord = coord.ok_or(TerrainError::UnknownJobSlot(slot))?;
        let Some(&chunk_idx) = self.assignments.get(&coord) else {
            if self.window.is_some_and(|window| window.contains(coord)) {
                return Err(TerrainError::ChunkPoolExhausted { slot });
            }
            debug!("Chunk ({}, {}) left the window, discarding its mesh", coord.x, coord.z);
            return Ok(false);
        };

        let origin = job.origin();
        let mut mesh = job.mesh().clone();
        mesh.to_local(origin);
        if self.smooth_normals {
            mesh = mesh.smoothed();
        }

        let chunk = &mut self.chunks[chunk_idx];
        sink.apply_mesh(chunk.handle(), mesh.vertices(), mesh.indices());
        if chunk.state() == ChunkState::Queued {
            // Re-entered the window while its old job was still running.
            self.origin_queue.retain(|queued| *queued != coord);
        }
        chunk.mark_ready(mesh.triangle_count());

        debug!(
            "Chunk ({}, {}) ready: {} triangles, {} vertices in {:?}",
            coord.x,
            coord.z,
            mesh.triangle_count(),
            mesh.vertices().len(),
            elapsed
        );
        Ok(true)
    }

    /// Switches to new parameters and starts streaming the window from scratch.
    ///
    /// Every job is resized (growing only), the chunk pool is resized to the
    /// new window, and results still in flight from the old parameters are
    /// dropped when they arrive. The next tick queues the full window again.
    ///
    /// # Errors
    /// A configuration error if the parameters are unusable; the pool keeps
    /// streaming with its current configuration.
    pub fn reset_parameters(
        &mut self,
        render_distance: u32,
        noise: NoiseParameters,
        terrain: TerrainParameters,
        smooth_normals: bool,
        sink: &mut impl RenderSink,
    ) -> Result<(), TerrainError> {
        terrain.validate()?;
        noise.validate()?;
        validate_render_distance(render_distance)?;

        let generation = self.generation + 1;
        self.jobs.reset_parameters(noise, terrain, generation)?;
        self.generation = generation;
        self.noise = noise;
        self.terrain = terrain;
        self.render_distance = render_distance;
        self.smooth_normals = smooth_normals;

        let chunk_count = ChunkWindow::new(ChunkCoord::new(0, 0), render_distance).len();
        if chunk_count < self.chunks.len() {
            for chunk in self.chunks.drain(chunk_count..) {
                sink.release_chunk(chunk.handle());
            }
        } else {
            let start = self.chunks.len();
            self.chunks.extend((start..chunk_count).map(|idx| Chunk::new(ChunkHandle(idx))));
        }
        for chunk in &mut self.chunks {
            chunk.evict();
        }

        self.assignments.clear();
        self.origin_queue.clear();
        self.available_chunks = (0..chunk_count).collect();
        self.window = None;

        info!(
            "Loader pool reset (generation {}): {} chunks, render distance {}, smooth normals {}",
            generation, chunk_count, render_distance, smooth_normals
        );
        Ok(())
    }

    /// Shuts the pool down, disposing every job and releasing every chunk.
    ///
    /// Blocks until jobs still running on workers have finished.
    pub fn release(mut self, sink: &mut impl RenderSink) {
        self.jobs.dispose_jobs();
        for chunk in self.chunks.drain(..) {
            sink.release_chunk(chunk.handle());
        }
        info!("Chunk loader pool released");
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The chunk currently bound to `coord`, if any.
    pub fn chunk_at(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.assignments.get(&coord).map(|&idx| &self.chunks[idx])
    }

    pub fn window(&self) -> Option<ChunkWindow> {
        self.window
    }

    pub fn current_center(&self) -> Option<ChunkCoord> {
        self.window.map(|window| window.center)
    }

    pub fn queued_origins(&self) -> usize {
        self.origin_queue.len()
    }

    pub fn running_jobs(&self) -> usize {
        self.jobs.running()
    }

    /// Job slots not yet returned to the idle pool.
    pub fn jobs_in_use(&self) -> usize {
        self.jobs.in_use()
    }

    pub fn job_slots(&self) -> usize {
        self.jobs.max_size()
    }

    /// Whether every position in the window has a mesh in the sink.
    pub fn is_settled(&self) -> bool {
        self.window.is_some()
            && self.origin_queue.is_empty()
            && self.jobs.in_use() == 0
            && self
                .assignments
                .values()
                .all(|&idx| self.chunks[idx].state() == ChunkState::Ready)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn noise(&self) -> &NoiseParameters {
        &self.noise
    }

    pub fn terrain(&self) -> &TerrainParameters {
        &self.terrain
    }

    pub fn render_distance(&self) -> u32 {
        self.render_distance
    }

    pub fn smooth_normals(&self) -> bool {
        self.smooth_normals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine_state::rendering::MeshStore, settings::StreamingSettings};

    fn settings(render_distance: u32) -> TerrainSettings {
        TerrainSettings {
            terrain: TerrainParameters {
                sampling_width: 4,
                sampling_length: 4,
                sampling_height: 4,
                ..Default::default()
            },
            streaming: StreamingSettings {
                render_distance,
                worker_threads: 1,
                job_slots: 2,
                smooth_normals: false,
            },
            ..Default::default()
        }
    }

    #[test]
    fn first_window_queues_every_position() {
        let mut pool = ChunkLoaderPool::new(&settings(1)).unwrap();
        let diff = pool.create_chunk_queue(Point3::new(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(diff.added.len(), 9);
        assert!(diff.evicted.is_empty());
        assert_eq!(pool.queued_origins(), 9);
        assert!(pool.chunks().iter().all(|chunk| chunk.state() == ChunkState::Queued));

        assert_eq!(pool.dispatch_queue(), 2);
        assert_eq!(pool.queued_origins(), 7);
        assert_eq!(pool.jobs_in_use(), 2);
        assert_eq!(pool.running_jobs(), 2);
        assert_eq!(pool.job_slots(), 2);
    }

    #[test]
    fn moving_inside_the_center_chunk_is_a_no_op() {
        let mut pool = ChunkLoaderPool::new(&settings(1)).unwrap();
        pool.create_chunk_queue(Point3::new(0.0, 0.0, 0.0)).unwrap();
        let diff = pool.create_chunk_queue(Point3::new(1.9, 10.0, -1.9)).unwrap();
        assert!(diff.is_empty());
        assert_eq!(pool.queued_origins(), 9);
    }

    #[test]
    fn recentering_reuses_evicted_chunks() {
        let mut pool = ChunkLoaderPool::new(&settings(1)).unwrap();
        pool.create_chunk_queue(Point3::new(0.0, 0.0, 0.0)).unwrap();

        let diff = pool.create_chunk_queue(Point3::new(4.0, 0.0, 0.0)).unwrap();
        assert_eq!(diff.evicted.len(), 3);
        assert_eq!(diff.added.len(), 3);
        // The evicted column was still queued, so only the new window remains.
        assert_eq!(pool.queued_origins(), 9);
        assert_eq!(pool.current_center(), Some(ChunkCoord::new(1, 0)));

        for coord in &diff.added {
            let chunk = pool.chunk_at(*coord).unwrap();
            assert_eq!(chunk.state(), ChunkState::Queued);
            assert_eq!(chunk.origin(), Some(coord.origin(4, 4)));
        }
        for coord in &diff.evicted {
            assert!(pool.chunk_at(*coord).is_none());
        }
        let mut handles: Vec<_> = pool.chunks().iter().map(|chunk| chunk.handle()).collect();
        handles.dedup();
        assert_eq!(handles.len(), 9);
    }

    #[test]
    fn reset_resizes_the_chunk_pool() {
        let mut pool = ChunkLoaderPool::new(&settings(1)).unwrap();
        let mut sink = MeshStore::new();
        pool.create_chunk_queue(Point3::new(0.0, 0.0, 0.0)).unwrap();

        let terrain = *pool.terrain();
        pool.reset_parameters(2, NoiseParameters::default(), terrain, true, &mut sink)
            .unwrap();
        assert_eq!(pool.chunks().len(), 25);
        assert_eq!(pool.generation(), 1);
        assert_eq!(pool.queued_origins(), 0);
        assert!(pool.window().is_none());
        assert!(pool.smooth_normals());

        let diff = pool.create_chunk_queue(Point3::new(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(diff.added.len(), 25);
    }

    #[test]
    fn invalid_reset_keeps_streaming() {
        let mut pool = ChunkLoaderPool::new(&settings(1)).unwrap();
        let mut sink = MeshStore::new();
        pool.create_chunk_queue(Point3::new(0.0, 0.0, 0.0)).unwrap();

        let broken = TerrainParameters { scale: 0, ..*pool.terrain() };
        let err = pool
            .reset_parameters(1, NoiseParameters::default(), broken, false, &mut sink)
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(pool.generation(), 0);
        assert_eq!(pool.terrain().scale, 1);
        assert_eq!(pool.queued_origins(), 9);
    }

    #[test]
    fn oversized_reset_is_rejected() {
        let mut pool = ChunkLoaderPool::new(&settings(0)).unwrap();
        let mut sink = MeshStore::new();
        pool.create_chunk_queue(Point3::new(0.0, 0.0, 0.0)).unwrap();

        let huge = TerrainParameters {
            sampling_width: 1 << 20,
            sampling_length: 1 << 20,
            sampling_height: 1 << 20,
            ..*pool.terrain()
        };
        let err = pool
            .reset_parameters(0, NoiseParameters::default(), huge, false, &mut sink)
            .unwrap_err();
        assert!(matches!(err, TerrainError::VolumeTooLarge { .. }));
        assert_eq!(pool.generation(), 0);
        assert_eq!(pool.terrain().sampling_width, 4);

        let terrain = *pool.terrain();
        let err = pool
            .reset_parameters(100_000, NoiseParameters::default(), terrain, false, &mut sink)
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(pool.generation(), 0);
        assert_eq!(pool.chunks().len(), 1);
        assert_eq!(pool.queued_origins(), 1);
    }
}
