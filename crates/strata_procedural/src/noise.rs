//! # Noise Generation
//!
//! Deterministic, seed-parameterized scalar noise.
//!
//! - [`NoiseField`]: the primary generator. Each octave sums a few seeded
//!   sinusoidal lattices; octaves are accumulated with `persistence`-scaled
//!   amplitude and doubling frequency, normalized, then clamped to [-1, 1].
//! - [`SimplexNoise`]: 2D simplex with octaved and ridged sampling, used by the
//!   ridge-like region generator.
//! - [`CellularNoise`]: Worley (F1) distance noise, used by the cellular
//!   region generator.
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed`, every generator here produces **exactly** the
//! same values on any platform, any time. No global state, no RNG streams.

use serde::{Deserialize, Serialize};

use crate::error::{ProceduralError, ProceduralResult};

/// World seed for deterministic generation.
///
/// All procedural generation derives from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives a sub-seed for a specific purpose (e.g., biome generation).
    ///
    /// Uses a hash function to create independent streams from one seed.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }

    /// Hashes an integer lattice point into a well-mixed 64-bit value.
    #[inline]
    #[must_use]
    pub const fn hash2(self, x: i64, z: i64) -> u64 {
        let mut h = self.0 ^ 0x9E37_79B9_7F4A_7C15;
        h ^= (x as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h = h.rotate_left(27).wrapping_mul(0x94D0_49BB_1331_11EB);
        h ^= (z as u64).wrapping_mul(0xD6E8_FEB8_6659_FD93);
        h ^= h >> 31;
        h = h.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        h ^ (h >> 29)
    }

    /// Maps a hash to a float in [0, 1).
    #[inline]
    #[must_use]
    pub fn unit(hash: u64) -> f64 {
        (hash >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(0xDEAD_BEEF_CAFE_BABE)
    }
}

/// Spatial frequency parameters for one named noise channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    /// Base frequency (world units → noise units).
    pub scale: f64,
    /// Number of octaves to accumulate.
    pub octaves: u32,
    /// Amplitude multiplier per octave.
    pub persistence: f64,
}

impl NoiseParams {
    /// Creates a parameter set.
    #[must_use]
    pub const fn new(scale: f64, octaves: u32, persistence: f64) -> Self {
        Self {
            scale,
            octaves,
            persistence,
        }
    }
}

/// Octaves beyond this are ignored.
pub const MAX_OCTAVES: usize = 12;

/// Sinusoidal lattices summed per octave.
const LATTICES_PER_OCTAVE: usize = 3;

/// One seeded plane wave.
#[derive(Clone, Copy, Debug)]
struct Wave {
    dir_x: f64,
    dir_z: f64,
    frequency: f64,
    phase: f64,
}

/// Multi-octave sinusoidal noise in [-1, 1].
///
/// # Example
///
/// ```rust,ignore
/// let field = NoiseField::new(WorldSeed::new(42));
/// let elevation = field.sample(100.0, 200.0, &NoiseParams::new(0.02, 4, 0.5));
/// assert!((-1.0..=1.0).contains(&elevation));
/// ```
#[derive(Clone, Debug)]
pub struct NoiseField {
    seed: WorldSeed,
    waves: [[Wave; LATTICES_PER_OCTAVE]; MAX_OCTAVES],
}

impl NoiseField {
    /// Builds the lattice table for a seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        let mut waves = [[Wave {
            dir_x: 1.0,
            dir_z: 0.0,
            frequency: 1.0,
            phase: 0.0,
        }; LATTICES_PER_OCTAVE]; MAX_OCTAVES];

        for (octave, row) in waves.iter_mut().enumerate() {
            for (lattice, wave) in row.iter_mut().enumerate() {
                let h = seed.derive((octave * LATTICES_PER_OCTAVE + lattice) as u64 + 1).value();
                let angle = WorldSeed::unit(h) * std::f64::consts::TAU;
                let h2 = WorldSeed::new(h).derive(0xA5A5).value();
                *wave = Wave {
                    dir_x: angle.cos(),
                    dir_z: angle.sin(),
                    // Slight frequency spread so lattices don't phase-lock.
                    frequency: 0.75 + 0.5 * WorldSeed::unit(h2),
                    phase: WorldSeed::unit(h2.rotate_left(17)) * std::f64::consts::TAU,
                };
            }
        }

        Self { seed, waves }
    }

    /// Returns the seed this field was built from.
    #[inline]
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// Samples the field at world coordinates.
    ///
    /// Out-of-range results (only reachable through non-finite input) are
    /// logged and clamped, never propagated.
    #[must_use]
    pub fn sample(&self, x: f64, z: f64, params: &NoiseParams) -> f64 {
        let raw = self.sample_raw(x, z, params);
        match check_range(raw, x, z) {
            Ok(value) => value,
            Err(anomaly) => {
                tracing::warn!(%anomaly, "noise sample clamped");
                clamp_sample(raw)
            }
        }
    }

    /// Samples and maps to [0, 1].
    #[inline]
    #[must_use]
    pub fn sample_unit(&self, x: f64, z: f64, params: &NoiseParams) -> f64 {
        (self.sample(x, z, params) + 1.0) * 0.5
    }

    /// Unclamped fractal sum.
    fn sample_raw(&self, x: f64, z: f64, params: &NoiseParams) -> f64 {
        let octaves = (params.octaves as usize).clamp(1, MAX_OCTAVES);
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = params.scale;
        let mut max_amplitude = 0.0;

        for row in &self.waves[..octaves] {
            let mut octave_sum = 0.0;
            for wave in row {
                let t = (x * wave.dir_x + z * wave.dir_z) * frequency * wave.frequency + wave.phase;
                octave_sum += t.sin();
            }
            total += octave_sum / LATTICES_PER_OCTAVE as f64 * amplitude;
            max_amplitude += amplitude;
            amplitude *= params.persistence;
            frequency *= 2.0;
        }

        total / max_amplitude
    }
}

/// Checks a sample against the [-1, 1] band.
///
/// # Errors
///
/// Returns [`ProceduralError::NoiseRangeAnomaly`] for values outside the band
/// or non-finite values.
pub fn check_range(value: f64, x: f64, z: f64) -> ProceduralResult<f64> {
    if value.is_finite() && (-1.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ProceduralError::NoiseRangeAnomaly { value, x, z })
    }
}

/// Clamps a sample into [-1, 1]; NaN becomes 0.
#[inline]
#[must_use]
pub fn clamp_sample(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

/// Pre-computed permutation table for simplex noise.
///
/// This is computed once from the seed and reused.
#[derive(Clone, Debug)]
struct PermutationTable {
    /// 512-entry permutation table (256 entries, doubled for overflow handling).
    perm: [u8; 512],
}

impl PermutationTable {
    /// 12 gradient vectors for 2D simplex.
    const GRADIENTS: [[i8; 2]; 12] = [
        [1, 0], [1, 1], [0, 1], [-1, 1],
        [-1, 0], [-1, -1], [0, -1], [1, -1],
        [1, 0], [0, 1], [-1, 0], [0, -1],
    ];

    fn new(seed: WorldSeed) -> Self {
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }

        // Fisher-Yates shuffle with xorshift64
        let mut rng_state = seed.value() | 1;
        for i in (1..256).rev() {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;

            let j = (rng_state as usize) % (i + 1);
            perm.swap(i, j);
        }

        for i in 0..256 {
            perm[256 + i] = perm[i];
        }

        Self { perm }
    }

    #[inline]
    fn get(&self, index: usize) -> u8 {
        self.perm[index & 511]
    }

    #[inline]
    fn gradient(hash: u8) -> [i8; 2] {
        Self::GRADIENTS[(hash % 12) as usize]
    }
}

/// 2D Simplex noise generator.
///
/// Produces smooth, continuous noise values in the range [-1, 1].
#[derive(Clone, Debug)]
pub struct SimplexNoise {
    perm_table: PermutationTable,
}

impl SimplexNoise {
    /// Skewing factor for 2D simplex grid: (sqrt(3) - 1) / 2.
    const F2: f64 = 0.366_025_403_784_439;
    /// Unskewing factor for 2D simplex grid: (3 - sqrt(3)) / 6.
    const G2: f64 = 0.211_324_865_405_187;

    /// Creates a new simplex noise generator from a seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            perm_table: PermutationTable::new(seed),
        }
    }

    /// Samples 2D simplex noise at the given coordinates.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * Self::F2;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);

        let unskew = f64::from(i + j) * Self::G2;
        let x0 = x - (f64::from(i) - unskew);
        let y0 = y - (f64::from(j) - unskew);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - f64::from(i1) + Self::G2;
        let y1 = y0 - f64::from(j1) + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let (i1, j1) = (i1 as usize, j1 as usize);

        let gi0 = self.perm_table.get(ii + self.perm_table.get(jj) as usize);
        let gi1 = self.perm_table.get(ii + i1 + self.perm_table.get(jj + j1) as usize);
        let gi2 = self.perm_table.get(ii + 1 + self.perm_table.get(jj + 1) as usize);

        let n0 = Self::contribution(x0, y0, gi0);
        let n1 = Self::contribution(x1, y1, gi1);
        let n2 = Self::contribution(x2, y2, gi2);

        // 70.0 normalizes the sum to [-1, 1]
        (70.0 * (n0 + n1 + n2)).clamp(-1.0, 1.0)
    }

    #[inline]
    fn contribution(x: f64, y: f64, gradient_index: u8) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            0.0
        } else {
            let grad = PermutationTable::gradient(gradient_index);
            let t2 = t * t;
            t2 * t2 * (x * f64::from(grad[0]) + y * f64::from(grad[1]))
        }
    }

    /// Ridged fractal noise in [0, 1] (sharp crests at noise zero-crossings).
    #[must_use]
    pub fn ridged(&self, x: f64, y: f64, params: &NoiseParams) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = params.scale;
        let mut max_amplitude = 0.0;

        for _ in 0..params.octaves.max(1) {
            let ridge = 1.0 - self.sample(x * frequency, y * frequency).abs();
            total += ridge * ridge * amplitude;
            max_amplitude += amplitude;
            amplitude *= params.persistence;
            frequency *= 2.0;
        }

        total / max_amplitude
    }
}

/// Worley (cellular) noise: distance to the nearest seeded feature point.
#[derive(Clone, Debug)]
pub struct CellularNoise {
    seed: WorldSeed,
}

impl CellularNoise {
    /// Creates a cellular generator from a seed.
    #[must_use]
    pub const fn new(seed: WorldSeed) -> Self {
        Self { seed }
    }

    /// F1 distance mapped to [-1, 1]: 1 at a feature point, -1 at a cell rim.
    #[must_use]
    pub fn sample(&self, x: f64, z: f64, params: &NoiseParams) -> f64 {
        let px = x * params.scale;
        let pz = z * params.scale;
        let cx = px.floor() as i64;
        let cz = pz.floor() as i64;

        let mut nearest = f64::MAX;
        for dz in -1..=1 {
            for dx in -1..=1 {
                let (gx, gz) = (cx + dx, cz + dz);
                let h = self.seed.hash2(gx, gz);
                let fx = gx as f64 + WorldSeed::unit(h);
                let fz = gz as f64 + WorldSeed::unit(h.rotate_left(32));
                let d = ((px - fx).powi(2) + (pz - fz).powi(2)).sqrt();
                nearest = nearest.min(d);
            }
        }

        1.0 - 2.0 * nearest.min(1.0)
    }
}

/// Fast floor function.
#[inline]
fn fast_floor(x: f64) -> i32 {
    let xi = x as i32;
    if x < f64::from(xi) {
        xi - 1
    } else {
        xi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: NoiseParams = NoiseParams::new(0.02, 4, 0.5);

    #[test]
    fn test_determinism() {
        let seed = WorldSeed::new(12345);
        let field1 = NoiseField::new(seed);
        let field2 = NoiseField::new(seed);

        for i in 0..100 {
            let x = f64::from(i) * 7.3;
            let z = f64::from(i) * -3.1;
            assert_eq!(
                field1.sample(x, z, &PARAMS).to_bits(),
                field2.sample(x, z, &PARAMS).to_bits(),
                "Noise should be deterministic"
            );
        }
    }

    #[test]
    fn test_different_seeds_different_results() {
        let field1 = NoiseField::new(WorldSeed::new(1));
        let field2 = NoiseField::new(WorldSeed::new(2));

        let differing = (0..32)
            .filter(|&i| {
                let x = f64::from(i) * 11.0;
                field1.sample(x, x * 0.5, &PARAMS) != field2.sample(x, x * 0.5, &PARAMS)
            })
            .count();

        assert!(differing > 16, "Different seeds should produce different fields");
    }

    #[test]
    fn test_range() {
        let field = NoiseField::new(WorldSeed::new(42));
        let wild = NoiseParams::new(0.37, 12, 1.7);

        for i in 0..10_000 {
            let x = f64::from(i) * 0.1 - 500.0;
            let z = f64::from(i) * 0.13 - 650.0;
            for params in [&PARAMS, &wild] {
                let value = field.sample(x, z, params);
                assert!((-1.0..=1.0).contains(&value), "Value {value} out of range at ({x}, {z})");
            }
        }
    }

    #[test]
    fn test_non_finite_input_is_clamped() {
        let field = NoiseField::new(WorldSeed::new(42));

        assert_eq!(field.sample(f64::NAN, 0.0, &PARAMS), 0.0);
        let value = field.sample(f64::INFINITY, 1.0, &PARAMS);
        assert!((-1.0..=1.0).contains(&value));
    }

    #[test]
    fn test_check_range_reports_anomaly() {
        assert!(check_range(0.5, 0.0, 0.0).is_ok());
        assert!(matches!(
            check_range(1.5, 2.0, 3.0),
            Err(ProceduralError::NoiseRangeAnomaly { x, z, .. }) if x == 2.0 && z == 3.0
        ));
        assert!(check_range(f64::NAN, 0.0, 0.0).is_err());
        assert_eq!(clamp_sample(-4.0), -1.0);
        assert_eq!(clamp_sample(f64::NAN), 0.0);
    }

    #[test]
    fn test_continuity() {
        let field = NoiseField::new(WorldSeed::new(42));

        let v1 = field.sample(100.0, 100.0, &PARAMS);
        let v2 = field.sample(100.01, 100.0, &PARAMS);

        assert!((v1 - v2).abs() < 0.01, "Noise should be continuous");
    }

    #[test]
    fn test_named_scales_differ() {
        let field = NoiseField::new(WorldSeed::new(7));
        let coarse = NoiseParams::new(0.002, 3, 0.5);
        let fine = NoiseParams::new(0.2, 3, 0.5);

        // Fine noise changes much faster over a short walk.
        let walk = |p: &NoiseParams| -> f64 {
            (0..50)
                .map(|i| {
                    let x = f64::from(i);
                    (field.sample(x + 1.0, 0.0, p) - field.sample(x, 0.0, p)).abs()
                })
                .sum()
        };
        assert!(walk(&fine) > walk(&coarse) * 5.0);
    }

    #[test]
    fn test_simplex_range_and_determinism() {
        let a = SimplexNoise::new(WorldSeed::new(42));
        let b = SimplexNoise::new(WorldSeed::new(42));

        for i in 0..2_000 {
            let x = f64::from(i) * 0.37 - 300.0;
            let y = f64::from(i) * 0.11;
            let value = a.sample(x, y);
            assert!((-1.0..=1.0).contains(&value));
            assert_eq!(value.to_bits(), b.sample(x, y).to_bits());
            let ridge = a.ridged(x, y, &PARAMS);
            assert!((0.0..=1.0).contains(&ridge));
        }
    }

    #[test]
    fn test_cellular_range() {
        let cells = CellularNoise::new(WorldSeed::new(9));
        let params = NoiseParams::new(0.05, 1, 0.5);

        for i in 0..2_000 {
            let x = f64::from(i) * 1.7 - 900.0;
            let value = cells.sample(x, x * 0.3, &params);
            assert!((-1.0..=1.0).contains(&value), "{value}");
        }
    }

    #[test]
    fn test_seed_derivation() {
        let base = WorldSeed::new(42);
        assert_ne!(base.derive(1), base.derive(2));
        assert_eq!(base.derive(1), base.derive(1));
        assert_ne!(base.derive(1), base);
    }
}
