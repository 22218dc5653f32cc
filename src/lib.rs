//! # Marching Terrain
//!
//! Streams procedurally generated, smooth voxel terrain around a moving
//! observer.
//!
//! Terrain is a density field built from layered Perlin noise. The field is
//! sampled chunk by chunk on a regular grid, and each chunk is turned into a
//! triangle mesh with Marching Cubes. A bounded pool of reusable jobs does the
//! work on background threads while the calling thread keeps a square window of
//! chunks populated around the observer.
//!
//! ## Key Modules
//!
//! * `settings` - Noise, terrain and streaming parameters, loaded from JSON
//! * `error` - The `TerrainError` type shared by the whole crate
//! * `engine_state` - The streaming loop and every subsystem it drives
//!
//! ## Usage
//!
//! ```rust,ignore
//! use marching_terrain::{EngineState, MeshStore, StaticConfiguration, TerrainSettings};
//!
//! let mut engine = EngineState::new(
//!     || observer_position(),
//!     StaticConfiguration(TerrainSettings::default()),
//!     MeshStore::new(),
//! )?;
//! loop {
//!     engine.tick();
//! }
//! ```
//!
//! The `marching-terrain` binary runs a headless session: an observer walks
//! along +X and the meshes land in an in-memory store.

use std::thread;

use cgmath::Point3;
use log::{error, info};
use web_time::{Duration, Instant};

pub mod engine_state;
pub mod error;
pub mod settings;

pub use engine_state::{
    meshing::{ChunkMesh, Vertex},
    rendering::{ChunkHandle, MeshStore, RenderSink},
    streaming::{ChunkCoord, ChunkLoaderPool, TickReport},
    voxels::{tasks::generate_chunk_mesh, NoiseField, VoxelGrid},
    EngineState, ObserverSource,
};
pub use error::TerrainError;
pub use settings::{
    loader::{load_settings_from_file, ConfigurationSource, JsonFileConfiguration, StaticConfiguration},
    NoiseParameters, StreamingSettings, TerrainParameters, TerrainSettings,
};

/// Ticks the headless session walks for before waiting for the window to settle.
const WALK_TICKS: u32 = 240;
/// World units the observer moves along +X per tick.
const OBSERVER_SPEED: f32 = 0.5;
/// Target duration of one tick.
const TICK_INTERVAL: Duration = Duration::from_millis(16);
/// Upper bound on how long the session waits for outstanding chunks.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs a headless streaming session.
///
/// Settings come from the JSON file named by the first command-line argument
/// (re-read whenever it changes) or from the defaults.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let result = match std::env::args().nth(1) {
        Some(path) => JsonFileConfiguration::open(path).and_then(run_session),
        None => run_session(StaticConfiguration::default()),
    };
    if let Err(err) = result {
        error!("Terrain session failed: {}", err);
    }
}

fn run_session<C: ConfigurationSource>(configuration: C) -> Result<(), TerrainError> {
    let start = Instant::now();
    let mut tick = 0u32;
    let observer = move || {
        tick += 1;
        Point3::new(tick.min(WALK_TICKS) as f32 * OBSERVER_SPEED, 0.0, 0.0)
    };

    let mut engine = EngineState::new(observer, configuration, MeshStore::new())?;
    let mut totals = TickReport::default();

    for _ in 0..WALK_TICKS {
        totals += engine.tick();
        thread::sleep(TICK_INTERVAL);
    }

    let settle_start = Instant::now();
    while !engine.pool().is_settled() && settle_start.elapsed() < SETTLE_TIMEOUT {
        totals += engine.tick();
        thread::sleep(TICK_INTERVAL);
    }

    let pool = engine.pool();
    let ready = pool
        .chunks()
        .iter()
        .filter(|chunk| chunk.state() == engine_state::voxels::ChunkState::Ready)
        .count();
    info!(
        "Session finished after {} ticks in {:?}: {} of {} chunks ready, {} triangles resident",
        engine.ticks(),
        start.elapsed(),
        ready,
        pool.chunks().len(),
        engine.sink().total_triangles()
    );
    info!(
        "Totals: {} queued, {} evicted, {} dispatched, {} applied, {} discarded",
        totals.queued, totals.evicted, totals.dispatched, totals.applied, totals.discarded
    );

    engine.release();
    Ok(())
}
