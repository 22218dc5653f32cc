//! # Engine State Module
//!
//! The streaming loop that ties the terrain subsystems to the outside world.
//!
//! ## Key Components
//!
//! * `EngineState` - Owns the loader pool and its three collaborators
//! * `meshing` - Marching Cubes triangulation
//! * `rendering` - The render sink interface and an in-memory sink
//! * `streaming` - Chunk window, job pool and loader pool
//! * `task_management` - Worker threads
//! * `voxels` - Noise, density sampling and pooled chunks
//!
//! ## Architecture
//!
//! `EngineState` is driven by explicit calls to [`EngineState::tick`]. Each
//! tick it:
//!
//! 1. asks the [`ConfigurationSource`] for the current settings and, if they
//!    changed, resets the loader pool
//! 2. polls the [`ObserverSource`] for the observer position
//! 3. runs one loader pool tick, which pushes finished meshes into the
//!    [`RenderSink`]
//!
//! No state is global. Everything lives in the `EngineState` value.

use cgmath::Point3;
use log::{error, info, warn};

use crate::{
    error::TerrainError,
    settings::{loader::ConfigurationSource, TerrainSettings},
};

pub mod meshing;
pub mod rendering;
pub mod streaming;
pub mod task_management;
pub mod voxels;

use rendering::RenderSink;
use streaming::{ChunkLoaderPool, TickReport};

/// Supplies the observer position once per tick.
///
/// Any `FnMut() -> Point3<f32>` closure is an observer source.
pub trait ObserverSource {
    fn observer_position(&mut self) -> Point3<f32>;
}

impl<F> ObserverSource for F
where
    F: FnMut() -> Point3<f32>,
{
    fn observer_position(&mut self) -> Point3<f32> {
        self()
    }
}

/// The terrain streaming loop.
///
/// # Examples
///
/// ```rust,ignore
/// let mut engine = EngineState::new(
///     || camera.position(),
///     StaticConfiguration(TerrainSettings::default()),
///     MeshStore::new(),
/// )?;
///
/// loop {
///     engine.tick();
/// }
/// ```
pub struct EngineState<O, C, R> {
    observer: O,
    configuration: C,
    sink: R,
    settings: TerrainSettings,
    pool: ChunkLoaderPool,
    ticks: u64,
}

impl<O, C, R> EngineState<O, C, R>
where
    O: ObserverSource,
    C: ConfigurationSource,
    R: RenderSink,
{
    /// Creates the loader pool from the configuration source's current settings.
    ///
    /// # Errors
    /// Fails if the initial settings are invalid or the workers cannot start.
    pub fn new(observer: O, mut configuration: C, sink: R) -> Result<Self, TerrainError> {
        let settings = configuration.current_settings();
        let pool = ChunkLoaderPool::new(&settings)?;
        Ok(Self {
            observer,
            configuration,
            sink,
            settings,
            pool,
            ticks: 0,
        })
    }

    /// Advances streaming by one step.
    pub fn tick(&mut self) -> TickReport {
        self.apply_settings_changes();
        let position = self.observer.observer_position();
        let report = self.pool.tick(position, &mut self.sink);
        self.ticks += 1;
        report
    }

    // Terrain parameters compare without their origin, so only real
    // configuration changes trigger a reset.
    fn apply_settings_changes(&mut self) {
        let next = self.configuration.current_settings();
        if next == self.settings {
            return;
        }
        let (current, incoming) = (self.settings.streaming, next.streaming);

        if current.worker_threads != incoming.worker_threads || current.job_slots != incoming.job_slots {
            warn!("Worker thread and job slot counts only take effect after a restart");
        }

        let needs_reset = next.noise != self.settings.noise
            || next.terrain != self.settings.terrain
            || incoming.render_distance != current.render_distance
            || incoming.smooth_normals != current.smooth_normals;

        if needs_reset {
            info!("Terrain settings changed, resetting the loader pool");
            if let Err(err) = self.pool.reset_parameters(
                incoming.render_distance,
                next.noise,
                next.terrain,
                incoming.smooth_normals,
                &mut self.sink,
            ) {
                error!("Rejected new terrain settings, keeping the previous ones: {}", err);
            }
        }
        self.settings = next;
    }

    /// Shuts streaming down and hands the render sink back.
    pub fn release(self) -> R {
        let Self { pool, mut sink, .. } = self;
        pool.release(&mut sink);
        sink
    }

    pub fn pool(&self) -> &ChunkLoaderPool {
        &self.pool
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    /// The last settings seen from the configuration source.
    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
