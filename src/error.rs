//! # Terrain Errors
//!
//! Every fallible operation in the crate reports a [`TerrainError`]. Errors fall
//! into two groups:
//!
//! - **Configuration errors** (zero-size or oversized volumes, an unusable noise
//!   sample level, unreadable settings). These are fatal for the configuration that produced
//!   them: no chunk is generated with undefined grid geometry.
//! - **Invariant violations** (too many triangles in one cell, a window diff whose
//!   halves disagree, a completed job with nowhere to go). The offending operation
//!   is abandoned and logged, and streaming continues for every other chunk.
//!
//! Degenerate numeric cases never surface as errors; they are guarded where they
//! occur (see `meshing::edge_weight`).

use thiserror::Error;

/// Errors produced while configuring, sampling, meshing or streaming terrain.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// One of the sampling extents is zero.
    #[error("cannot sample a zero size volume (length {length}, width {width}, height {height})")]
    ZeroSizeVolume {
        /// Sampling length (Z extent) in world units
        length: u32,
        /// Sampling width (X extent) in world units
        width: u32,
        /// Sampling height (Y extent) in world units
        height: u32,
    },
    /// The sampling volume needs more density samples than one job may hold.
    #[error("sampling volume {width}x{height}x{length} at scale {scale} needs more than {limit} samples")]
    VolumeTooLarge {
        /// Sampling length (Z extent) in world units
        length: u32,
        /// Sampling width (X extent) in world units
        width: u32,
        /// Sampling height (Y extent) in world units
        height: u32,
        /// Subdivisions per unit
        scale: u32,
        /// Largest accepted sample count
        limit: usize,
    },
    /// The chunk window would hold more chunks than the pool allows.
    #[error("render distance {requested} exceeds the maximum of {limit}")]
    RenderDistanceTooLarge {
        /// The configured window radius
        requested: u32,
        /// Largest accepted window radius
        limit: u32,
    },
    /// The subdivision scale is zero.
    #[error("terrain scale must be at least one subdivision per unit")]
    ZeroScale,
    /// The noise sample level would divide every coordinate by zero (or is not finite).
    #[error("noise sample level must be a finite non-zero value, got {0}")]
    InvalidSampleLevel(f32),
    /// Noise with zero octaves has no defined average.
    #[error("noise octave count must be at least one")]
    InvalidOctaveCount,
    /// The case table asked for more triangles than a cube can topologically hold.
    #[error("edge mask {edge_mask:#010b} produced {count} triangles, more than the maximum of 5")]
    TriangleLimitExceeded {
        /// The offending cell classification
        edge_mask: u8,
        /// The triangle count looked up for it
        count: usize,
    },
    /// A window move evicted a different number of chunks than it added.
    #[error("window eviction set has {evicted} origins but addition set has {added}")]
    WindowSizeMismatch {
        /// Number of origins leaving the window
        evicted: usize,
        /// Number of origins entering the window
        added: usize,
    },
    /// A completed job had no chunk to write its mesh into.
    #[error("job slot #{slot} completed but the chunk pool has no chunk bound to its origin")]
    ChunkPoolExhausted {
        /// The job slot whose results were dropped
        slot: usize,
    },
    /// A worker returned a job for a slot the pool does not own.
    #[error("job slot #{0} does not exist in this pool")]
    UnknownJobSlot(usize),
    /// A worker thread could not be started.
    #[error("failed to spawn terrain worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    /// A settings file could not be read.
    #[error("failed to read terrain settings: {0}")]
    SettingsIo(#[from] std::io::Error),
    /// A settings file was not valid JSON for [`crate::settings::TerrainSettings`].
    #[error("failed to parse terrain settings: {0}")]
    SettingsParse(#[from] serde_json::Error),
}

impl TerrainError {
    /// Returns `true` for errors caused by the configuration itself.
    ///
    /// Configuration errors abort (re)generation for that configuration; every
    /// other error is an internal invariant violation that only abandons the
    /// operation that hit it.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TerrainError::ZeroSizeVolume { .. }
                | TerrainError::VolumeTooLarge { .. }
                | TerrainError::RenderDistanceTooLarge { .. }
                | TerrainError::ZeroScale
                | TerrainError::InvalidSampleLevel(_)
                | TerrainError::InvalidOctaveCount
                | TerrainError::SettingsIo(_)
                | TerrainError::SettingsParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_classified() {
        assert!(TerrainError::ZeroScale.is_configuration());
        assert!(TerrainError::InvalidSampleLevel(0.0).is_configuration());
        assert!(TerrainError::ZeroSizeVolume { length: 1, width: 0, height: 1 }.is_configuration());
        assert!(TerrainError::RenderDistanceTooLarge { requested: 500, limit: 32 }.is_configuration());
        assert!(!TerrainError::WindowSizeMismatch { evicted: 3, added: 2 }.is_configuration());
        assert!(!TerrainError::TriangleLimitExceeded { edge_mask: 7, count: 6 }.is_configuration());
    }

    #[test]
    fn messages_name_the_offending_values() {
        let message = TerrainError::ZeroSizeVolume { length: 16, width: 0, height: 32 }.to_string();
        assert!(message.contains("width 0"));
        let message = TerrainError::TriangleLimitExceeded { edge_mask: 15, count: 6 }.to_string();
        assert!(message.contains("0b00001111"));
        let message = TerrainError::VolumeTooLarge { length: 8, width: 4096, height: 8, scale: 2, limit: 64 }.to_string();
        assert!(message.contains("4096x8x8 at scale 2"));
    }
}
