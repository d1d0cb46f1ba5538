//! Fractal Brownian motion over simplex noise.

use noise::{NoiseFn, Simplex};

/// Octave parameters for [`Fbm`].
#[derive(Clone, Debug, PartialEq)]
pub struct FbmParams {
    pub octaves: u32,
    /// Frequency of the first octave.
    pub base_frequency: f64,
    /// Amplitude of the first octave.
    pub amplitude: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
}

impl Default for FbmParams {
    fn default() -> Self {
        Self {
            octaves: 5,
            base_frequency: 0.008,
            amplitude: 12.0,
            lacunarity: 2.0,
            persistence: 0.5,
        }
    }
}

/// Sums octaves of simplex noise, each at `lacunarity` times the previous frequency
/// and `persistence` times the previous amplitude.
pub struct Fbm {
    noise: Simplex,
    params: FbmParams,
}

impl Fbm {
    pub fn new(seed: u32, params: FbmParams) -> Self {
        Self {
            noise: Simplex::new(seed),
            params,
        }
    }

    pub fn params(&self) -> &FbmParams {
        &self.params
    }

    pub fn sample_2d(&self, x: f64, z: f64) -> f64 {
        self.accumulate(|frequency| self.noise.get([x * frequency, z * frequency]))
    }

    pub fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        self.accumulate(|frequency| self.noise.get([x * frequency, y * frequency, z * frequency]))
    }

    /// Geometric sum of the octave amplitudes; bounds `|sample|`.
    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amplitude = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amplitude.abs();
            amplitude *= self.params.persistence;
        }
        sum
    }

    fn accumulate(&self, octave: impl Fn(f64) -> f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;
        for _ in 0..self.params.octaves {
            total += octave(frequency) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_values() {
        let a = Fbm::new(7, FbmParams::default());
        let b = Fbm::new(7, FbmParams::default());
        for i in 0..32 {
            let x = f64::from(i) * 13.7 - 200.0;
            assert_eq!(a.sample_2d(x, -x * 0.5).to_bits(), b.sample_2d(x, -x * 0.5).to_bits());
            assert_eq!(a.sample_3d(x, 3.0, x).to_bits(), b.sample_3d(x, 3.0, x).to_bits());
        }
    }

    #[test]
    fn test_samples_stay_within_max_amplitude() {
        let fbm = Fbm::new(99, FbmParams::default());
        let bound = fbm.max_amplitude();
        assert!((bound - 12.0 * (1.0 + 0.5 + 0.25 + 0.125 + 0.0625)).abs() < 1e-9);
        for i in 0..500 {
            let x = f64::from(i) * 7.3;
            let value = fbm.sample_2d(x, x * 1.7 - 1000.0);
            assert!(value.is_finite());
            assert!(value.abs() <= bound * 1.01, "sample {value} exceeds {bound}");
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = Fbm::new(1, FbmParams::default());
        let b = Fbm::new(2, FbmParams::default());
        let differs = (0..16).any(|i| {
            let x = f64::from(i) * 31.0 + 0.5;
            a.sample_2d(x, x) != b.sample_2d(x, x)
        });
        assert!(differs);
    }

    #[test]
    fn test_zero_octaves_is_flat() {
        let fbm = Fbm::new(
            3,
            FbmParams {
                octaves: 0,
                ..FbmParams::default()
            },
        );
        assert_eq!(fbm.sample_2d(12.0, 5.0), 0.0);
        assert_eq!(fbm.max_amplitude(), 0.0);
    }
}
