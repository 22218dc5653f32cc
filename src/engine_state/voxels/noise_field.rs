//! # Noise Field
//!
//! Deterministic scalar noise used to assign a density to every voxel.
//!
//! The field is a fractal sum of 2D Perlin noise. Each octave samples the noise
//! on all six ordered axis pairs of the point (xy, xz, yz, yx, zx, zy) and
//! averages them, which gives a cheap 3D-looking field out of a 2D generator.
//! Between octaves the amplitude is multiplied by the persistence and the
//! frequency doubles.
//!
//! The accumulated average is remapped from the generator's `[0, 1]` range to
//! `[-1, 1]`. Persistence below one keeps later octaves quiet, which pulls the
//! whole field towards the negative end; the default iso-level accounts for that.

use cgmath::Point3;
use noise::{NoiseFn, Perlin};

use crate::{
    error::TerrainError,
    settings::{NoiseParameters, TerrainParameters},
};

/// Density returned for points below the surface level.
pub const SOLID_DENSITY: f32 = 1.0;

/// A seeded fractal noise function.
///
/// Construction validates the parameters, so sampling itself cannot fail.
#[derive(Clone)]
pub struct NoiseField {
    perlin: Perlin,
    params: NoiseParameters,
}

impl NoiseField {
    /// Creates a noise field for the given parameters.
    ///
    /// # Errors
    /// Returns the configuration error from [`NoiseParameters::validate`] when the
    /// sample level is zero or there are no octaves.
    pub fn new(params: NoiseParameters) -> Result<Self, TerrainError> {
        params.validate()?;
        Ok(Self {
            perlin: Perlin::new(params.seed),
            params,
        })
    }

    /// The parameters this field was built with.
    pub fn params(&self) -> &NoiseParameters {
        &self.params
    }

    /// Samples the raw fractal noise at `point`.
    ///
    /// # Returns
    /// A value conceptually in `[-1, 1]`. Identical inputs always give identical
    /// outputs.
    pub fn sample(&self, point: Point3<f32>) -> f32 {
        let sample_level = self.params.sample_level as f64;
        let seed = self.params.seed as f64;
        let x = point.x as f64 / sample_level;
        let y = point.y as f64 / sample_level;
        let z = point.z as f64 / sample_level;

        let mut frequency = self.params.frequency as f64;
        let mut amplitude = self.params.amplitude as f64;
        let persistence = self.params.persistence as f64;

        let mut noise = 0.0;
        for _ in 0..self.params.octave_count {
            let (fx, fy, fz) = (x * frequency + seed, y * frequency + seed, z * frequency + seed);
            let pairs = [
                [fx, fy],
                [fx, fz],
                [fy, fz],
                [fy, fx],
                [fz, fx],
                [fz, fy],
            ];
            let sum: f64 = pairs.iter().map(|pair| self.unit_perlin(*pair)).sum();
            noise += sum * amplitude / 6.0;

            amplitude *= persistence;
            frequency *= 2.0;
        }

        (-1.0 + 2.0 * (noise / self.params.octave_count as f64)) as f32
    }

    /// Density of the terrain at `point`.
    ///
    /// Points below the terrain's surface level are solid bedrock and skip the
    /// noise entirely; everything else is [`NoiseField::sample`].
    pub fn density(&self, point: Point3<f32>, terrain: &TerrainParameters) -> f32 {
        if point.y < terrain.surface_level as f32 {
            return SOLID_DENSITY.max(terrain.iso_level);
        }
        self.sample(point)
    }

    // Perlin output remapped from [-1, 1] to [0, 1]
    fn unit_perlin(&self, point: [f64; 2]) -> f64 {
        (self.perlin.get(point) + 1.0) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> NoiseField {
        NoiseField::new(NoiseParameters::default()).unwrap()
    }

    #[test]
    fn sampling_is_deterministic() {
        let a = field();
        let b = field();
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..200 {
            let point = Point3::new(
                rng.f32() * 512.0 - 256.0,
                rng.f32() * 64.0,
                rng.f32() * 512.0 - 256.0,
            );
            assert_eq!(a.sample(point).to_bits(), a.sample(point).to_bits());
            assert_eq!(a.sample(point).to_bits(), b.sample(point).to_bits());
        }
    }

    #[test]
    fn samples_stay_near_the_unit_range() {
        let field = field();
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..500 {
            let point = Point3::new(rng.f32() * 1000.0, rng.f32() * 100.0, rng.f32() * 1000.0);
            let value = field.sample(point);
            assert!(value.is_finite());
            assert!((-1.5..=1.5).contains(&value), "sample {value} out of range");
        }
    }

    #[test]
    fn below_surface_is_solid() {
        let field = field();
        let terrain = TerrainParameters {
            surface_level: 4,
            iso_level: 0.3,
            ..Default::default()
        };
        let density = field.density(Point3::new(10.0, 3.5, -2.0), &terrain);
        assert!(density >= terrain.iso_level);
        assert_eq!(density, SOLID_DENSITY);
    }

    #[test]
    fn seed_changes_the_field() {
        let a = field();
        let b = NoiseField::new(NoiseParameters { seed: 1234, ..Default::default() }).unwrap();
        let differs = (0..32).any(|i| {
            let point = Point3::new(i as f32 * 3.7, 9.0, i as f32 * 1.3);
            a.sample(point) != b.sample(point)
        });
        assert!(differs);
    }

    #[test]
    fn zero_sample_level_fails_construction() {
        let params = NoiseParameters { sample_level: 0.0, ..Default::default() };
        assert!(matches!(
            NoiseField::new(params),
            Err(TerrainError::InvalidSampleLevel(_))
        ));
    }
}
