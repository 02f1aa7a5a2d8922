//! # STRATA World
//!
//! The chunk production pipeline: turns chunk requests into resolved voxel
//! sets without blocking the caller on disk or generation.
//!
//! ## Architecture
//!
//! ```text
//!   request_chunk ──> ChunkCache ──hit──> callback
//!                        │ miss
//!                        ▼
//!                  store worker (IO) ──base found──> merge overlay ──> cache ──> callbacks
//!                        │ miss
//!                        ▼
//!               generation worker (N slots) ──> save base ──> merge overlay ──> cache ──> callbacks
//! ```
//!
//! ## Core Components
//!
//! - `ChunkPipeline`: request coalescing, slot-bounded dispatch, edits
//! - `GenerationWorker`: message-driven actor around a `ChunkSource`
//! - `ChunkCache`: LRU of resolved chunks
//! - `ChunkStore`: write-once base records plus modification overlays
//! - `WorldConfig`: the TOML world file

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod store;
mod store_worker;
pub mod worker;

pub use cache::{CacheEntry, ChunkCache, DEFAULT_CACHE_CAPACITY};
pub use config::{PipelineConfig, WorldConfig, WorldSection};
pub use error::{WorldError, WorldResult};
pub use pipeline::{ChunkCallback, ChunkPipeline, ChunkState, PipelineStats};
pub use protocol::{WorkerRequest, WorkerResponse};
pub use store::{ChunkRecord, ChunkStore, Edit, Modification, ModificationOverlay};
pub use worker::{generator_factory, ChunkSource, GenerationWorker, SourceFactory, WorkerHandle};
