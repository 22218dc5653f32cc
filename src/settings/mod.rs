//! # Terrain Settings
//!
//! Value types describing how terrain is sampled and streamed, together with
//! their defaults and validation.
//!
//! Settings are stored as JSON (see [`loader`]). Every field has a serde default,
//! so a settings file only needs to name the values it changes.
//!
//! ## Equality
//! - [`NoiseParameters`] compare every field.
//! - [`TerrainParameters`] compare every field *except* `origin`. The origin moves
//!   with each chunk, while the rest of the struct describes the configuration,
//!   and "did the configuration change" is the only question the streaming loop
//!   asks. Use [`TerrainParameters::eq_including_origin`] for a full comparison.

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use crate::error::TerrainError;

pub mod loader;

/// Largest number of density samples a single chunk volume may need.
pub const MAX_VOLUME_POINTS: usize = 1 << 24;

/// Largest accepted window radius, in chunks.
pub const MAX_RENDER_DISTANCE: u32 = 32;

/// Parameters of the layered noise that produces voxel densities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseParameters {
    #[serde(default = "NoiseParameters::default_seed")]
    pub seed: u32, // Offsets every noise sample and seeds the Perlin permutation
    #[serde(default = "NoiseParameters::default_frequency")]
    pub frequency: f32, // Frequency of the first octave, doubled per octave
    #[serde(default = "NoiseParameters::default_amplitude")]
    pub amplitude: f32, // Amplitude of the first octave
    #[serde(default = "NoiseParameters::default_persistence")]
    pub persistence: f32, // Amplitude multiplier applied between octaves
    #[serde(default = "NoiseParameters::default_octave_count")]
    pub octave_count: u32, // Number of fractal octaves summed
    #[serde(default = "NoiseParameters::default_sample_level")]
    pub sample_level: f32, // Divisor applied to world coordinates before sampling
}

impl NoiseParameters {
    fn default_seed() -> u32 { 42 }
    fn default_frequency() -> f32 { 1.0 }
    fn default_amplitude() -> f32 { 1.0 }
    fn default_persistence() -> f32 { 0.5 }
    fn default_octave_count() -> u32 { 4 }
    fn default_sample_level() -> f32 { 24.0 }

    /// Checks that these parameters describe a usable noise function.
    ///
    /// # Errors
    /// - [`TerrainError::InvalidSampleLevel`] when `sample_level` is zero or not finite
    /// - [`TerrainError::InvalidOctaveCount`] when `octave_count` is zero
    pub fn validate(&self) -> Result<(), TerrainError> {
        if self.sample_level == 0.0 || !self.sample_level.is_finite() {
            return Err(TerrainError::InvalidSampleLevel(self.sample_level));
        }
        if self.octave_count == 0 {
            return Err(TerrainError::InvalidOctaveCount);
        }
        Ok(())
    }
}

impl Default for NoiseParameters {
    fn default() -> Self {
        Self {
            seed: Self::default_seed(),
            frequency: Self::default_frequency(),
            amplitude: Self::default_amplitude(),
            persistence: Self::default_persistence(),
            octave_count: Self::default_octave_count(),
            sample_level: Self::default_sample_level(),
        }
    }
}

/// Parameters controlling the size, resolution and surface of a chunk volume.
///
/// The sampled volume of one chunk is `sampling_width × sampling_height ×
/// sampling_length` world units, subdivided `scale` times per unit along every
/// axis. Heights are absolute: the lowest sample of every chunk sits at
/// `bedrock_level`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TerrainParameters {
    #[serde(default = "TerrainParameters::default_origin")]
    pub origin: Point3<f32>, // World-space center of the chunk being sampled
    #[serde(default = "TerrainParameters::default_scale")]
    pub scale: u32, // Subdivisions per world unit
    #[serde(default = "TerrainParameters::default_sampling_length")]
    pub sampling_length: u32, // Chunk extent along Z before scaling
    #[serde(default = "TerrainParameters::default_sampling_width")]
    pub sampling_width: u32, // Chunk extent along X before scaling
    #[serde(default = "TerrainParameters::default_sampling_height")]
    pub sampling_height: u32, // Chunk extent along Y before scaling
    #[serde(default = "TerrainParameters::default_iso_level")]
    pub iso_level: f32, // Density at or above which a point is solid
    #[serde(default = "TerrainParameters::default_surface_level")]
    pub surface_level: i32, // Heights below this are solid without sampling noise
    #[serde(default = "TerrainParameters::default_bedrock_level")]
    pub bedrock_level: i32, // Height of the lowest sample plane
}

impl TerrainParameters {
    fn default_origin() -> Point3<f32> { Point3::new(0.0, 0.0, 0.0) }
    fn default_scale() -> u32 { 1 }
    fn default_sampling_length() -> u32 { 16 }
    fn default_sampling_width() -> u32 { 16 }
    fn default_sampling_height() -> u32 { 32 }
    fn default_iso_level() -> f32 { -0.55 }
    fn default_surface_level() -> i32 { 2 }
    fn default_bedrock_level() -> i32 { 0 }

    /// Checks that these parameters describe a non-empty sampling volume.
    ///
    /// # Errors
    /// - [`TerrainError::ZeroSizeVolume`] when any sampling extent is zero
    /// - [`TerrainError::ZeroScale`] when `scale` is zero
    /// - [`TerrainError::VolumeTooLarge`] when the volume needs more than
    ///   [`MAX_VOLUME_POINTS`] samples
    pub fn validate(&self) -> Result<(), TerrainError> {
        if self.sampling_length == 0 || self.sampling_width == 0 || self.sampling_height == 0 {
            return Err(TerrainError::ZeroSizeVolume {
                length: self.sampling_length,
                width: self.sampling_width,
                height: self.sampling_height,
            });
        }
        if self.scale == 0 {
            return Err(TerrainError::ZeroScale);
        }
        match self.point_count() {
            Some(points) if points <= MAX_VOLUME_POINTS => Ok(()),
            _ => Err(TerrainError::VolumeTooLarge {
                length: self.sampling_length,
                width: self.sampling_width,
                height: self.sampling_height,
                scale: self.scale,
                limit: MAX_VOLUME_POINTS,
            }),
        }
    }

    /// Number of density samples in the volume, or `None` if it overflows.
    pub fn point_count(&self) -> Option<usize> {
        let scale = self.scale as usize;
        let samples = |extent: u32| (extent as usize).checked_mul(scale)?.checked_add(1);
        samples(self.sampling_width)?
            .checked_mul(samples(self.sampling_length)?)?
            .checked_mul(samples(self.sampling_height)?)
    }

    /// Returns a copy of these parameters centered on `origin`.
    pub fn with_origin(&self, origin: Point3<f32>) -> Self {
        Self { origin, ..*self }
    }

    /// Compares every field, origin included.
    pub fn eq_including_origin(&self, other: &Self) -> bool {
        self == other && self.origin == other.origin
    }
}

impl PartialEq for TerrainParameters {
    /// Structural equality that ignores `origin`.
    fn eq(&self, other: &Self) -> bool {
        self.scale == other.scale
            && self.sampling_length == other.sampling_length
            && self.sampling_width == other.sampling_width
            && self.sampling_height == other.sampling_height
            && self.iso_level == other.iso_level
            && self.surface_level == other.surface_level
            && self.bedrock_level == other.bedrock_level
    }
}

impl Default for TerrainParameters {
    fn default() -> Self {
        Self {
            origin: Self::default_origin(),
            scale: Self::default_scale(),
            sampling_length: Self::default_sampling_length(),
            sampling_width: Self::default_sampling_width(),
            sampling_height: Self::default_sampling_height(),
            iso_level: Self::default_iso_level(),
            surface_level: Self::default_surface_level(),
            bedrock_level: Self::default_bedrock_level(),
        }
    }
}

/// Settings for the chunk window and the worker pool that fills it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamingSettings {
    #[serde(default = "StreamingSettings::default_render_distance")]
    pub render_distance: u32, // Window radius in chunks; the window holds (2r+1)^2 chunks
    #[serde(default)]
    pub worker_threads: usize, // Worker threads; 0 uses the available parallelism
    #[serde(default)]
    pub job_slots: usize, // Reusable job slots; 0 uses twice the worker count
    #[serde(default)]
    pub smooth_normals: bool, // Share vertices between triangles before handing meshes off
}

impl StreamingSettings {
    fn default_render_distance() -> u32 { 2 }

    /// # Errors
    /// [`TerrainError::RenderDistanceTooLarge`] above [`MAX_RENDER_DISTANCE`].
    pub fn validate(&self) -> Result<(), TerrainError> {
        validate_render_distance(self.render_distance)
    }

    /// Number of worker threads to spawn, resolving `0` to the machine's parallelism.
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Number of job slots, resolving `0` to twice the worker count.
    pub fn resolved_job_slots(&self) -> usize {
        if self.job_slots > 0 {
            self.job_slots
        } else {
            self.resolved_worker_threads() * 2
        }
    }
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            render_distance: Self::default_render_distance(),
            worker_threads: 0,
            job_slots: 0,
            smooth_normals: false,
        }
    }
}

/// Rejects window radii above [`MAX_RENDER_DISTANCE`].
pub fn validate_render_distance(render_distance: u32) -> Result<(), TerrainError> {
    if render_distance > MAX_RENDER_DISTANCE {
        return Err(TerrainError::RenderDistanceTooLarge {
            requested: render_distance,
            limit: MAX_RENDER_DISTANCE,
        });
    }
    Ok(())
}

/// Top-level settings container, one section per concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TerrainSettings {
    #[serde(default)]
    pub noise: NoiseParameters,
    #[serde(default)]
    pub terrain: TerrainParameters,
    #[serde(default)]
    pub streaming: StreamingSettings,
}

impl TerrainSettings {
    /// Validates every section.
    ///
    /// # Errors
    /// The first configuration error found: terrain, then noise, then streaming.
    pub fn validate(&self) -> Result<(), TerrainError> {
        self.terrain.validate()?;
        self.noise.validate()?;
        self.streaming.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terrain_equality_ignores_origin() {
        let a = TerrainParameters::default();
        let b = a.with_origin(Point3::new(64.0, 0.0, -16.0));
        assert_eq!(a, b);
        assert!(!a.eq_including_origin(&b));

        let c = TerrainParameters { iso_level: 0.25, ..a };
        assert_ne!(a, c);
    }

    #[test]
    fn zero_extent_is_rejected() {
        let params = TerrainParameters { sampling_width: 0, ..Default::default() };
        assert!(matches!(
            params.validate(),
            Err(TerrainError::ZeroSizeVolume { width: 0, .. })
        ));
        let params = TerrainParameters { scale: 0, ..Default::default() };
        assert!(matches!(params.validate(), Err(TerrainError::ZeroScale)));
    }

    #[test]
    fn oversized_volume_is_rejected() {
        let params = TerrainParameters {
            sampling_width: 1 << 20,
            sampling_length: 1 << 20,
            sampling_height: 1 << 20,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(TerrainError::VolumeTooLarge { .. })));

        let params = TerrainParameters { scale: u32::MAX, sampling_width: u32::MAX, ..Default::default() };
        assert_eq!(params.point_count(), None);
        assert!(params.validate().unwrap_err().is_configuration());

        let params = TerrainParameters::default();
        assert_eq!(params.point_count(), Some(17 * 17 * 33));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn render_distance_is_capped() {
        let mut settings = TerrainSettings::default();
        settings.streaming.render_distance = MAX_RENDER_DISTANCE;
        assert!(settings.validate().is_ok());
        settings.streaming.render_distance = MAX_RENDER_DISTANCE + 1;
        assert!(matches!(
            settings.validate(),
            Err(TerrainError::RenderDistanceTooLarge { requested: 33, .. })
        ));
    }

    #[test]
    fn zero_sample_level_is_rejected() {
        let params = NoiseParameters { sample_level: 0.0, ..Default::default() };
        assert!(matches!(params.validate(), Err(TerrainError::InvalidSampleLevel(_))));
        let params = NoiseParameters { sample_level: f32::NAN, ..Default::default() };
        assert!(params.validate().is_err());
        let params = NoiseParameters { octave_count: 0, ..Default::default() };
        assert!(matches!(params.validate(), Err(TerrainError::InvalidOctaveCount)));
    }

    #[test]
    fn job_slots_default_to_twice_the_workers() {
        let streaming = StreamingSettings { worker_threads: 3, ..Default::default() };
        assert_eq!(streaming.resolved_job_slots(), 6);
        let streaming = StreamingSettings { worker_threads: 3, job_slots: 4, ..Default::default() };
        assert_eq!(streaming.resolved_job_slots(), 4);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: TerrainSettings =
            serde_json::from_str(r#"{ "terrain": { "scale": 2 }, "streaming": { "render_distance": 3 } }"#)
                .unwrap();
        assert_eq!(settings.terrain.scale, 2);
        assert_eq!(settings.terrain.sampling_width, 16);
        assert_eq!(settings.streaming.render_distance, 3);
        assert_eq!(settings.noise, NoiseParameters::default());
    }
}
