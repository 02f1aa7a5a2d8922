//! # STRATA Procedural Generation
//!
//! Deterministic surface-terrain generation for a chunked voxel world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: the same seed and settings always produce the same
//!    biomes and columns
//! 2. **Chunked**: the world is generated in fixed-footprint columns of voxels
//! 3. **Self-healing**: noise anomalies, broken biome descriptors and failed
//!    columns are logged and replaced with safe values, never propagated
//!
//! ## Core Components
//!
//! - `NoiseField`: seeded multi-octave noise in [-1, 1]
//! - `BiomeClassifier`: climate table, variants and region blending
//! - `ColumnBuilder`: one world column as an ordered voxel stack
//! - `FeaturePlacer`: trees and rocks with spacing and guarantee rules
//! - `ChunkGenerator`: all of the above for one chunk
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_procedural::{ChunkGenerator, ChunkKey, GenerationSettings};
//!
//! let generator = ChunkGenerator::new(GenerationSettings::with_seed(12345))?;
//! let voxels = generator.generate(ChunkKey::new(0, 0));
//! assert!(voxels.ground_height(0, 0, 128, -8).is_some());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod biome;
pub mod chunk;
pub mod column;
pub mod config;
pub mod error;
pub mod features;
pub mod material;
pub mod noise;
pub mod voxel;

pub use biome::{BiomeClassifier, BiomeDescriptor, BiomeKind, RegionGenerator, VariantTransform};
pub use chunk::ChunkGenerator;
pub use column::{ColumnBuilder, ColumnStack, ColumnVoxel};
pub use config::{
    BiomeConfig, FeatureConfig, GenerationSettings, NoiseConfig, TerrainConfig, DEFAULT_CHUNK_SIZE,
};
pub use error::{ProceduralError, ProceduralResult};
pub use features::{FeatureKind, FeaturePlacer};
pub use material::{Material, Rgb, TOMBSTONE_ID};
pub use noise::{CellularNoise, NoiseField, NoiseParams, SimplexNoise, WorldSeed};
pub use voxel::{BlockSink, ChunkBuffers, ChunkKey, Voxel, VoxelPos, VoxelSet};
