//! # Procedural Error Types
//!
//! Every failure the generator can detect. None of these escape a generation
//! call: each one is logged and healed where it happens (clamped noise, safe
//! default descriptor, flat fallback column). They exist as values so the
//! healing paths and their tests have something concrete to match on.

use thiserror::Error;

/// Errors that can occur during procedural generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProceduralError {
    /// A noise sample left the expected [-1, 1] band (or was not a number).
    #[error("noise sample {value} outside [-1, 1] at ({x}, {z})")]
    NoiseRangeAnomaly {
        /// The offending sample.
        value: f64,
        /// World X of the sample.
        x: f64,
        /// World Z of the sample.
        z: f64,
    },

    /// Height bounds inverted or non-numeric after a variant or blend.
    #[error("invalid biome descriptor '{name}': min {min_height}, max {max_height}")]
    InvalidBiomeDescriptor {
        /// Biome name as produced by the classifier.
        name: String,
        /// Minimum height after the transform.
        min_height: f64,
        /// Maximum height after the transform.
        max_height: f64,
    },

    /// Computing a column's height or materials failed.
    #[error("terrain generation failed at column ({x}, {z}): {reason}")]
    TerrainGenerationFailure {
        /// World X of the column.
        x: i32,
        /// World Z of the column.
        z: i32,
        /// What went wrong.
        reason: String,
    },

    /// Generation settings rejected at construction.
    #[error("invalid generation settings: {0}")]
    InvalidSettings(String),

    /// Struct-of-arrays voxel buffers with mismatched lengths.
    #[error("malformed chunk buffers: {0}")]
    MalformedBuffers(String),
}

/// Result type for procedural operations.
pub type ProceduralResult<T> = Result<T, ProceduralError>;
