//! # Generation Settings
//!
//! Everything the generator needs besides coordinates. Loaded once at startup
//! (as part of the world config file) and handed to the worker in its INIT
//! message. Every field has a default, so a config file only names what it
//! changes.

use serde::{Deserialize, Serialize};

use crate::error::{ProceduralError, ProceduralResult};
use crate::noise::{NoiseParams, WorldSeed};

/// Default chunk footprint (columns per side).
pub const DEFAULT_CHUNK_SIZE: u32 = 8;

/// Complete generation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// World seed.
    pub seed: u64,
    /// Chunk width/depth in columns.
    pub chunk_size: u32,
    /// Named noise parameter sets.
    pub noise: NoiseConfig,
    /// Biome classification settings.
    pub biome: BiomeConfig,
    /// Column construction settings.
    pub terrain: TerrainConfig,
    /// Vegetation / structure placement settings.
    pub features: FeatureConfig,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            seed: WorldSeed::default().value(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            noise: NoiseConfig::default(),
            biome: BiomeConfig::default(),
            terrain: TerrainConfig::default(),
            features: FeatureConfig::default(),
        }
    }
}

impl GenerationSettings {
    /// Default settings with the given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Returns the world seed.
    #[inline]
    #[must_use]
    pub const fn world_seed(&self) -> WorldSeed {
        WorldSeed::new(self.seed)
    }

    /// Checks the settings for values the generator cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ProceduralError::InvalidSettings`] naming the first bad field.
    pub fn validate(&self) -> ProceduralResult<()> {
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size must be > 0"));
        }
        self.noise.validate()?;
        self.biome.validate()?;
        self.terrain.validate()?;
        self.features.validate()
    }
}

/// Named noise parameter sets.
///
/// Each set asks the same [`crate::noise::NoiseField`] for a different
/// spatial frequency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Moisture channel; the main driver of biome choice.
    pub primary_biome: NoiseParams,
    /// Temperature noise added to the latitude gradient.
    pub temperature: NoiseParams,
    /// Surface elevation within a biome's height range.
    pub elevation: NoiseParams,
    /// Small colour jitter on surface voxels.
    pub micro_detail: NoiseParams,
    /// Biome sub-variant selection.
    pub variant: NoiseParams,
    /// Rare extra-tall peaks.
    pub super_feature: NoiseParams,
    /// Relief sampled by the ridged and cellular region generators.
    pub region: NoiseParams,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            primary_biome: NoiseParams::new(0.004, 3, 0.5),
            temperature: NoiseParams::new(0.003, 3, 0.5),
            elevation: NoiseParams::new(0.02, 4, 0.5),
            micro_detail: NoiseParams::new(0.15, 2, 0.5),
            variant: NoiseParams::new(0.01, 2, 0.5),
            super_feature: NoiseParams::new(0.0025, 2, 0.5),
            region: NoiseParams::new(0.012, 3, 0.5),
        }
    }
}

impl NoiseConfig {
    fn validate(&self) -> ProceduralResult<()> {
        let sets = [
            ("primary_biome", &self.primary_biome),
            ("temperature", &self.temperature),
            ("elevation", &self.elevation),
            ("micro_detail", &self.micro_detail),
            ("variant", &self.variant),
            ("super_feature", &self.super_feature),
            ("region", &self.region),
        ];
        for (name, params) in sets {
            if params.octaves == 0 {
                return Err(invalid(format!("noise.{name}.octaves must be > 0")));
            }
            if !(params.scale.is_finite() && params.scale > 0.0) {
                return Err(invalid(format!("noise.{name}.scale must be positive")));
            }
            if !(params.persistence.is_finite() && params.persistence > 0.0) {
                return Err(invalid(format!("noise.{name}.persistence must be positive")));
            }
        }
        Ok(())
    }
}

/// Biome classification settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeConfig {
    /// Lowest height bound any descriptor may carry.
    pub height_floor: f64,
    /// Highest height bound any descriptor may carry.
    pub height_ceiling: f64,
    /// Side length of a generator region, in blocks.
    pub region_size: i32,
    /// Width of the blend band inside each region edge, in blocks.
    pub blend_width: i32,
    /// Distance from the equator (z = 0) to the coldest latitude, in blocks.
    pub latitude_span: f64,
    /// Share of temperature coming from latitude (rest is noise).
    pub latitude_weight: f64,
}

impl Default for BiomeConfig {
    fn default() -> Self {
        Self {
            height_floor: -3.0,
            height_ceiling: 10.0,
            region_size: 256,
            blend_width: 16,
            latitude_span: 2048.0,
            latitude_weight: 0.6,
        }
    }
}

impl BiomeConfig {
    fn validate(&self) -> ProceduralResult<()> {
        if !(self.height_floor < self.height_ceiling) {
            return Err(invalid("biome.height_floor must be below biome.height_ceiling"));
        }
        if self.region_size <= 0 {
            return Err(invalid("biome.region_size must be > 0"));
        }
        if self.blend_width < 0 || self.blend_width * 2 > self.region_size {
            return Err(invalid("biome.blend_width must be in [0, region_size / 2]"));
        }
        if !(self.latitude_span > 0.0) {
            return Err(invalid("biome.latitude_span must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.latitude_weight) {
            return Err(invalid("biome.latitude_weight must be in [0, 1]"));
        }
        Ok(())
    }
}

/// Column construction settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Height that a biome height of 0 maps to.
    pub ground_datum: i32,
    /// Water fills every column up to this level.
    pub sea_level: i32,
    /// Cold biomes get snow at or above this height.
    pub snowline: i32,
    /// Surfaces below this are raised with filler voxels.
    pub min_ground_floor: i32,
    /// Highest surface a column may have.
    pub max_height: i32,
    /// Super-feature noise threshold (0..1 blend starts here).
    pub super_feature_threshold: f64,
    /// Extra height added at full super-feature strength.
    pub super_peak_height: f64,
    /// Surface height of the emergency flat column.
    pub emergency_height: i32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            ground_datum: 8,
            sea_level: 7,
            snowline: 14,
            min_ground_floor: 5,
            max_height: 64,
            super_feature_threshold: 0.55,
            super_peak_height: 28.0,
            emergency_height: 8,
        }
    }
}

impl TerrainConfig {
    fn validate(&self) -> ProceduralResult<()> {
        if self.max_height <= 0 {
            return Err(invalid("terrain.max_height must be > 0"));
        }
        if !(0..=self.max_height).contains(&self.min_ground_floor) {
            return Err(invalid("terrain.min_ground_floor must be in [0, max_height]"));
        }
        if !(0..=self.max_height).contains(&self.emergency_height) {
            return Err(invalid("terrain.emergency_height must be in [0, max_height]"));
        }
        if !(0.0..1.0).contains(&self.super_feature_threshold) {
            return Err(invalid("terrain.super_feature_threshold must be in [0, 1)"));
        }
        if !(self.super_peak_height.is_finite() && self.super_peak_height >= 0.0) {
            return Err(invalid("terrain.super_peak_height must be >= 0"));
        }
        Ok(())
    }
}

/// Vegetation and structure placement settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Candidate chance per column at vegetation density 1.0.
    pub base_chance: f64,
    /// No two features closer than this (blocks, Chebyshev).
    pub spacing_radius: i32,
    /// Maximum remembered feature positions.
    pub memory_capacity: usize,
    /// Prune the memory every this many placements.
    pub prune_interval: u32,
    /// Pruning drops positions farther than this from the current chunk.
    pub prune_distance: i32,
    /// Chunks without a feature before one is forced, per biome.
    pub guarantee_interval: u32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            base_chance: 0.08,
            spacing_radius: 3,
            memory_capacity: 512,
            prune_interval: 64,
            prune_distance: 64,
            guarantee_interval: 4,
        }
    }
}

impl FeatureConfig {
    fn validate(&self) -> ProceduralResult<()> {
        if !(0.0..=1.0).contains(&self.base_chance) {
            return Err(invalid("features.base_chance must be in [0, 1]"));
        }
        if self.spacing_radius < 0 {
            return Err(invalid("features.spacing_radius must be >= 0"));
        }
        if self.memory_capacity == 0 {
            return Err(invalid("features.memory_capacity must be > 0"));
        }
        if self.prune_interval == 0 {
            return Err(invalid("features.prune_interval must be > 0"));
        }
        if self.guarantee_interval == 0 {
            return Err(invalid("features.guarantee_interval must be > 0"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ProceduralError {
    ProceduralError::InvalidSettings(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GenerationSettings::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_band_rejected() {
        let mut settings = GenerationSettings::default();
        settings.biome.height_floor = 12.0;
        assert!(matches!(
            settings.validate(),
            Err(ProceduralError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_zero_octaves_rejected() {
        let mut settings = GenerationSettings::default();
        settings.noise.elevation.octaves = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("elevation"), "{err}");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: GenerationSettings = toml::from_str(
            r#"
            seed = 99
            [terrain]
            sea_level = 3
            "#,
        )
        .unwrap();

        assert_eq!(settings.seed, 99);
        assert_eq!(settings.terrain.sea_level, 3);
        assert_eq!(settings.terrain.snowline, TerrainConfig::default().snowline);
        assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
