//! # World Configuration
//!
//! One TOML document describes a world: its seed and storage location, the
//! generation settings, and the pipeline limits. Every key is optional.
//!
//! ```toml
//! [world]
//! seed = 12345
//! store_dir = "saves"
//!
//! [terrain]
//! sea_level = 6
//!
//! [pipeline]
//! cache_capacity = 512
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_procedural::{
    BiomeConfig, FeatureConfig, GenerationSettings, NoiseConfig, TerrainConfig, WorldSeed,
    DEFAULT_CHUNK_SIZE,
};

use crate::error::{WorldError, WorldResult};

/// The whole world config file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Identity and storage.
    pub world: WorldSection,
    /// Named noise parameter sets.
    pub noise: NoiseConfig,
    /// Biome classification.
    pub biome: BiomeConfig,
    /// Column construction.
    pub terrain: TerrainConfig,
    /// Feature placement.
    pub features: FeatureConfig,
    /// Pipeline limits.
    pub pipeline: PipelineConfig,
}

/// `[world]` section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSection {
    /// World seed.
    pub seed: u64,
    /// Chunk width/depth in columns.
    pub chunk_size: u32,
    /// Root directory for chunk records (one subdirectory per seed).
    pub store_dir: PathBuf,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            seed: WorldSeed::default().value(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            store_dir: PathBuf::from("world_data"),
        }
    }
}

/// `[pipeline]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Resolved chunks kept in RAM.
    pub cache_capacity: usize,
    /// Generations allowed to run at once.
    pub max_concurrent_generations: usize,
    /// Deadline for the worker's INIT acknowledgement.
    pub init_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
            max_concurrent_generations: 1,
            init_timeout_ms: 5000,
        }
    }
}

impl PipelineConfig {
    /// INIT deadline as a duration.
    #[must_use]
    pub const fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

impl WorldConfig {
    /// Parses and validates a config document.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidConfig`] for malformed TOML or values the
    /// pipeline cannot run with.
    pub fn from_toml_str(text: &str) -> WorldResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| WorldError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidConfig`] if the file cannot be read or
    /// does not validate.
    pub fn load(path: impl AsRef<Path>) -> WorldResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            WorldError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> WorldResult<()> {
        if self.pipeline.cache_capacity == 0 {
            return Err(WorldError::InvalidConfig(
                "pipeline.cache_capacity must be > 0".into(),
            ));
        }
        if self.pipeline.max_concurrent_generations == 0 {
            return Err(WorldError::InvalidConfig(
                "pipeline.max_concurrent_generations must be > 0".into(),
            ));
        }
        if self.pipeline.init_timeout_ms == 0 {
            return Err(WorldError::InvalidConfig(
                "pipeline.init_timeout_ms must be > 0".into(),
            ));
        }
        self.generation_settings()
            .validate()
            .map_err(|e| WorldError::InvalidConfig(e.to_string()))
    }

    /// The settings sent to the worker in INIT.
    #[must_use]
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            seed: self.world.seed,
            chunk_size: self.world.chunk_size,
            noise: self.noise.clone(),
            biome: self.biome.clone(),
            terrain: self.terrain.clone(),
            features: self.features.clone(),
        }
    }
}
