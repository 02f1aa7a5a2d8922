//! # Worker Protocol
//!
//! Messages exchanged with the generation worker. Requests carry plain data;
//! chunk results carry owned struct-of-arrays buffers that are moved, never
//! copied, across the channel.

use strata_procedural::{ChunkBuffers, ChunkKey, GenerationSettings};

/// Message to the generation worker.
#[derive(Clone, Debug)]
pub enum WorkerRequest {
    /// Build the generator. Answered by `InitComplete` or `InitFailed`.
    Init {
        /// Seed, noise, biome, terrain and feature settings.
        settings: Box<GenerationSettings>,
    },
    /// Generate one chunk. Answered by `ChunkReady`.
    GenerateChunk {
        /// Chunk to generate.
        key: ChunkKey,
        /// Footprint in columns per side.
        chunk_size: u32,
    },
    /// Reset generator caches. Answered by `CacheCleared`.
    ClearCache,
    /// Stop the worker.
    Shutdown,
    /// A message type the worker does not understand; logged and ignored.
    Other(String),
}

impl WorkerRequest {
    /// Wire name, for logs.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Init { .. } => "INIT",
            Self::GenerateChunk { .. } => "GENERATE_CHUNK",
            Self::ClearCache => "CLEAR_CACHE",
            Self::Shutdown => "SHUTDOWN",
            Self::Other(kind) => kind,
        }
    }
}

/// Message from the generation worker.
#[derive(Clone, Debug)]
pub enum WorkerResponse {
    /// INIT succeeded.
    InitComplete,
    /// INIT failed; the worker stays up but cannot generate.
    InitFailed(String),
    /// A chunk's raw (base layer) voxels.
    ChunkReady {
        /// Chunk generated.
        key: ChunkKey,
        /// Voxel buffers.
        buffers: ChunkBuffers,
        /// Generation failed and these are the source's fallback voxels.
        /// Fallback chunks are never saved as a base layer.
        fallback: bool,
    },
    /// CLEAR_CACHE finished.
    CacheCleared,
}
