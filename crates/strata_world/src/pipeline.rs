//! # Chunk Pipeline
//!
//! Resolves chunk requests through three tiers, cheapest first:
//!
//! 1. **Cache**: a resolved chunk in RAM answers immediately.
//! 2. **Disk**: the store worker loads base + modifications.
//! 3. **Generation**: on a disk miss the chunk is queued for the generation
//!    worker; the fresh base is saved (write-once) and any on-disk
//!    modifications are merged on top.
//!
//! ## Invariants
//!
//! - Every callback passed to [`ChunkPipeline::request_chunk`] fires exactly
//!   once, on the caller's thread, from `request_chunk`, `poll` or
//!   `wait_idle`.
//! - Concurrent requests for the same chunk share one load/generation.
//! - At most `max_concurrent_generations` chunks are with the worker at once;
//!   the rest wait in FIFO order.
//! - An edit is visible in every later resolution of its chunk, from cache,
//!   disk or generation. Unbreakable voxels are never removed.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Select, TryRecvError};
use strata_procedural::{ChunkKey, Voxel, VoxelPos, VoxelSet, WorldSeed};

use crate::cache::ChunkCache;
use crate::config::WorldConfig;
use crate::error::{WorldError, WorldResult};
use crate::protocol::{WorkerRequest, WorkerResponse};
use crate::store::{ChunkStore, Edit, Modification, ModificationOverlay};
use crate::store_worker::{LoadOutcome, StoreRequest, StoreResponse, StoreWorkerHandle};
use crate::worker::{generator_factory, GenerationWorker, SourceFactory, WorkerHandle};

/// Receives a resolved chunk.
pub type ChunkCallback = Box<dyn FnOnce(ChunkKey, Arc<VoxelSet>) + Send>;

/// Where a chunk is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Never requested, or evicted from the cache.
    Unrequested,
    /// Loading from disk or generating.
    Pending,
    /// In the cache.
    Resolved,
}

/// Pipeline counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Calls to `request_chunk`.
    pub requests: u64,
    /// Requests answered from the cache.
    pub cache_hits: u64,
    /// Chunks resolved from disk.
    pub disk_hits: u64,
    /// Chunks produced by the generation worker.
    pub generations: u64,
    /// Requests that joined an in-progress resolution.
    pub coalesced: u64,
    /// Cache evictions.
    pub evictions: u64,
    /// Accepted block edits.
    pub edits: u64,
    /// Disk reads or writes that failed.
    pub persistence_failures: u64,
    /// Chunks with the worker right now.
    pub in_flight: usize,
    /// Chunks waiting for a generation slot.
    pub queued: usize,
    /// Chunks in the cache.
    pub cached: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Loading,
    Queued,
    Generating,
}

/// A chunk between request and resolution.
struct PendingChunk {
    phase: Phase,
    callbacks: Vec<ChunkCallback>,
    /// On-disk modifications found when the base was missing.
    overlay: ModificationOverlay,
    /// Edits made while the chunk was pending.
    edits: Vec<Modification>,
}

impl PendingChunk {
    fn new(callback: ChunkCallback) -> Self {
        Self {
            phase: Phase::Loading,
            callbacks: vec![callback],
            overlay: ModificationOverlay::new(),
            edits: Vec::new(),
        }
    }
}

/// Chunk request pipeline. Owned by one thread; callbacks run on it.
pub struct ChunkPipeline {
    config: WorldConfig,
    cache: ChunkCache,
    pending: HashMap<ChunkKey, PendingChunk>,
    queue: VecDeque<ChunkKey>,
    in_flight: usize,
    worker: Option<WorkerHandle>,
    store: StoreWorkerHandle,
    stats: PipelineStats,
}

impl ChunkPipeline {
    /// Starts the pipeline with the standard chunk generator.
    ///
    /// # Errors
    ///
    /// See [`ChunkPipeline::start`].
    pub fn open(config: WorldConfig) -> WorldResult<Self> {
        Self::start(config, generator_factory())
    }

    /// Starts the store and generation workers and waits for INIT.
    ///
    /// # Errors
    ///
    /// - [`WorldError::InvalidConfig`] if the config does not validate.
    /// - [`WorldError::PersistenceIoFailure`] if the store directory cannot be
    ///   created.
    /// - [`WorldError::WorkerInitTimeout`] if INIT is not acknowledged within
    ///   `pipeline.init_timeout_ms`.
    /// - [`WorldError::WorkerInitFailed`] if the worker rejects INIT.
    pub fn start(config: WorldConfig, factory: SourceFactory) -> WorldResult<Self> {
        config.validate()?;

        let store = ChunkStore::open(&config.world.store_dir, WorldSeed::new(config.world.seed))?;
        let store = StoreWorkerHandle::spawn(store)?;

        let worker =
            GenerationWorker::spawn(factory, config.pipeline.max_concurrent_generations)?;
        worker.send(WorkerRequest::Init {
            settings: Box::new(config.generation_settings()),
        })?;

        match worker.responses().recv_timeout(config.pipeline.init_timeout()) {
            Ok(WorkerResponse::InitComplete) => {}
            Ok(WorkerResponse::InitFailed(reason)) => {
                return Err(WorldError::WorkerInitFailed(reason));
            }
            Ok(other) => {
                return Err(WorldError::WorkerInitFailed(format!(
                    "unexpected reply to INIT: {other:?}"
                )));
            }
            Err(RecvTimeoutError::Timeout) => {
                let timeout_ms = config.pipeline.init_timeout_ms;
                tracing::error!(timeout_ms, "generation worker INIT timed out");
                worker.detach();
                return Err(WorldError::WorkerInitTimeout { timeout_ms });
            }
            Err(RecvTimeoutError::Disconnected) => return Err(WorldError::WorkerDisconnected),
        }

        tracing::info!(
            seed = config.world.seed,
            chunk_size = config.world.chunk_size,
            cache_capacity = config.pipeline.cache_capacity,
            "chunk pipeline started"
        );

        Ok(Self {
            cache: ChunkCache::new(config.pipeline.cache_capacity),
            config,
            pending: HashMap::new(),
            queue: VecDeque::new(),
            in_flight: 0,
            worker: Some(worker),
            store,
            stats: PipelineStats::default(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Chunk footprint in columns.
    #[must_use]
    pub const fn chunk_size(&self) -> u32 {
        self.config.world.chunk_size
    }

    /// Directory holding this world's records.
    #[must_use]
    pub fn store_root(&self) -> &Path {
        self.store.store().root()
    }

    /// Requests a chunk. A cached chunk is delivered before this returns;
    /// otherwise the callback fires from a later `poll` or `wait_idle`.
    pub fn request_chunk<F>(&mut self, key: ChunkKey, callback: F)
    where
        F: FnOnce(ChunkKey, Arc<VoxelSet>) + Send + 'static,
    {
        self.stats.requests += 1;

        if let Some(voxels) = self.cache.get(key) {
            self.stats.cache_hits += 1;
            callback(key, voxels);
            return;
        }

        if let Some(entry) = self.pending.get_mut(&key) {
            self.stats.coalesced += 1;
            entry.callbacks.push(Box::new(callback));
            return;
        }

        tracing::trace!(%key, "chunk requested");
        self.pending.insert(key, PendingChunk::new(Box::new(callback)));
        self.store.send(StoreRequest::Load(key));
    }

    /// Lifecycle state of a chunk.
    #[must_use]
    pub fn state(&self, key: ChunkKey) -> ChunkState {
        if self.cache.contains(key) {
            ChunkState::Resolved
        } else if self.pending.contains_key(&key) {
            ChunkState::Pending
        } else {
            ChunkState::Unrequested
        }
    }

    /// Reads a voxel from a cached chunk without touching recency.
    #[must_use]
    pub fn block(&self, pos: VoxelPos) -> Option<Voxel> {
        let key = ChunkKey::from_world(pos.x, pos.z, self.chunk_size());
        self.cache.peek(key)?.voxels.get(pos).copied()
    }

    /// Handles every message that has arrived, then fills free generation
    /// slots. Returns the number of callbacks fired.
    pub fn poll(&mut self) -> usize {
        let mut fired = 0;

        while let Ok(response) = self.store.responses().try_recv() {
            fired += self.on_store_response(response);
        }

        loop {
            let next = match &self.worker {
                Some(worker) => worker.responses().try_recv(),
                None => break,
            };
            match next {
                Ok(response) => fired += self.on_worker_response(response),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::error!(
                        in_flight = self.in_flight,
                        queued = self.queue.len(),
                        "generation worker disconnected"
                    );
                    self.worker = None;
                    break;
                }
            }
        }

        self.dispatch();
        fired
    }

    /// Polls until nothing is pending or the timeout passes. Returns true if
    /// the pipeline went idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if self.pending.is_empty() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }

            let mut select = Select::new();
            select.recv(self.store.responses());
            if let Some(worker) = &self.worker {
                select.recv(worker.responses());
            }
            let _ = select.ready_timeout(remaining);
        }
    }

    /// Records a player edit. It is persisted in submission order and
    /// applied to the cached chunk, or to the chunk when it resolves.
    ///
    /// Returns false (and does nothing) when removing an unbreakable voxel of
    /// a cached chunk. For chunks not yet in the cache the removal is
    /// recorded, but unbreakable voxels survive it when the chunk resolves.
    pub fn edit_block(&mut self, pos: VoxelPos, edit: Edit) -> bool {
        let modification = Modification::new(pos, edit);
        let key = modification.chunk(self.chunk_size());

        if edit == Edit::Remove
            && self
                .cache
                .peek(key)
                .and_then(|entry| entry.voxels.get(pos))
                .and_then(Voxel::material)
                .is_some_and(|material| material.is_unbreakable())
        {
            tracing::debug!(?pos, "refused to remove unbreakable voxel");
            return false;
        }

        self.store.send(StoreRequest::WriteModification { key, modification });
        self.cache.update(key, |voxels| modification.apply(voxels));
        if let Some(entry) = self.pending.get_mut(&key) {
            entry.edits.push(modification);
        }
        self.stats.edits += 1;
        true
    }

    /// Drops the RAM cache and the generator's cross-chunk state. Disk records
    /// and pending requests are untouched.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        if let Some(worker) = &self.worker {
            if let Err(err) = worker.send(WorkerRequest::ClearCache) {
                tracing::warn!(%err, "CLEAR_CACHE not delivered");
            }
        }
    }

    /// Deletes this seed's records and clears the cache (new game).
    pub fn reset_world(&mut self) {
        self.clear_cache();
        self.store.send(StoreRequest::Reset);
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            persistence_failures: self.store.failures(),
            in_flight: self.in_flight,
            queued: self.queue.len(),
            cached: self.cache.len(),
            evictions: self.cache.evictions(),
            ..self.stats
        }
    }

    /// Stops both workers. Queued disk writes are flushed; pending callbacks
    /// are dropped without firing.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        if self.store.is_running() {
            if !self.pending.is_empty() {
                tracing::debug!(pending = self.pending.len(), "shutting down with pending chunks");
            }
            self.store.shutdown();
            self.pending.clear();
            self.queue.clear();
            tracing::info!("chunk pipeline stopped");
        }
    }

    fn on_store_response(&mut self, response: StoreResponse) -> usize {
        let StoreResponse { key, outcome } = response;
        match outcome {
            LoadOutcome::Resolved(voxels) => {
                let Some(entry) = self.pending.remove(&key) else {
                    return 0;
                };
                self.stats.disk_hits += 1;
                tracing::trace!(%key, "chunk loaded from disk");
                self.resolve(key, voxels, entry)
            }
            LoadOutcome::Missing { overlay } => {
                if let Some(entry) = self
                    .pending
                    .get_mut(&key)
                    .filter(|entry| entry.phase == Phase::Loading)
                {
                    entry.overlay = overlay;
                    entry.phase = Phase::Queued;
                    self.queue.push_back(key);
                }
                0
            }
        }
    }

    fn on_worker_response(&mut self, response: WorkerResponse) -> usize {
        match response {
            WorkerResponse::ChunkReady {
                key,
                buffers,
                fallback,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.stats.generations += 1;

                let (base, durable) = match VoxelSet::from_buffers(&buffers) {
                    Ok(voxels) => (voxels, !fallback),
                    Err(err) => {
                        tracing::error!(%key, %err, "malformed chunk buffers");
                        (VoxelSet::new(), false)
                    }
                };
                let base = Arc::new(base);
                if durable {
                    self.store.send(StoreRequest::SaveBase {
                        key,
                        voxels: Arc::clone(&base),
                    });
                } else {
                    tracing::warn!(%key, "fallback chunk delivered, base not saved");
                }

                let Some(entry) = self.pending.remove(&key) else {
                    tracing::warn!(%key, "generated chunk nobody is waiting for");
                    return 0;
                };
                let mut voxels = (*base).clone();
                entry.overlay.merge_onto(&mut voxels);
                self.resolve(key, voxels, entry)
            }
            WorkerResponse::CacheCleared => {
                tracing::debug!("generator cache cleared");
                0
            }
            other => {
                tracing::warn!(response = ?other, "unexpected worker response");
                0
            }
        }
    }

    fn resolve(&mut self, key: ChunkKey, mut voxels: VoxelSet, entry: PendingChunk) -> usize {
        for modification in &entry.edits {
            modification.apply(&mut voxels);
        }
        let voxels = Arc::new(voxels);
        self.cache.insert(key, Arc::clone(&voxels));

        let fired = entry.callbacks.len();
        for callback in entry.callbacks {
            callback(key, Arc::clone(&voxels));
        }
        fired
    }

    fn dispatch(&mut self) {
        let Some(worker) = &self.worker else {
            return;
        };
        let chunk_size = self.config.world.chunk_size;

        while self.in_flight < self.config.pipeline.max_concurrent_generations {
            let Some(key) = self.queue.pop_front() else {
                break;
            };
            if let Err(err) = worker.send(WorkerRequest::GenerateChunk { key, chunk_size }) {
                tracing::error!(%key, %err, "generation request not delivered");
                self.queue.push_front(key);
                break;
            }
            self.in_flight += 1;
            if let Some(entry) = self.pending.get_mut(&key) {
                entry.phase = Phase::Generating;
            }
        }
    }
}

impl Drop for ChunkPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use parking_lot::Mutex;

    fn config(name: &str) -> WorldConfig {
        let id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut config = WorldConfig::default();
        config.world.seed = 4242;
        config.world.store_dir = std::env::temp_dir().join(format!("strata_pipe_{name}_{id}"));
        config
    }

    fn finish(pipeline: ChunkPipeline) {
        let dir = pipeline.config().world.store_dir.clone();
        drop(pipeline);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_request_resolves_then_hits_cache() {
        let mut pipeline = ChunkPipeline::open(config("basic")).unwrap();
        let key = ChunkKey::new(0, 0);
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        pipeline.request_chunk(key, move |_, voxels| {
            assert!(!voxels.is_empty());
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(pipeline.state(key), ChunkState::Pending);
        assert!(pipeline.wait_idle(Duration::from_secs(30)));
        assert_eq!(pipeline.state(key), ChunkState::Resolved);

        let counter = Arc::clone(&hits);
        pipeline.request_chunk(key, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let stats = pipeline.stats();
        assert_eq!(stats.generations, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cached, 1);
        finish(pipeline);
    }

    #[test]
    fn test_phase_moves_through_queue() {
        let mut pipeline = ChunkPipeline::open(config("phase")).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for x in 0..3 {
            let seen = Arc::clone(&seen);
            pipeline.request_chunk(ChunkKey::new(x, 0), move |key, _| seen.lock().push(key));
        }
        assert!(pipeline.wait_idle(Duration::from_secs(30)));
        assert_eq!(seen.lock().len(), 3);
        assert_eq!(pipeline.stats().in_flight, 0);
        assert_eq!(pipeline.stats().queued, 0);
        finish(pipeline);
    }

    #[test]
    fn test_dead_worker_is_released() {
        let mut pipeline = ChunkPipeline::open(config("dead_worker")).unwrap();
        if let Some(worker) = &pipeline.worker {
            worker.send(WorkerRequest::Shutdown).unwrap();
        }
        pipeline.request_chunk(ChunkKey::new(0, 0), |_, _| {});

        let started = Instant::now();
        assert!(!pipeline.wait_idle(Duration::from_millis(300)));
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(pipeline.worker.is_none());
        assert_eq!(pipeline.state(ChunkKey::new(0, 0)), ChunkState::Pending);
        finish(pipeline);
    }

    #[test]
    fn test_unbreakable_voxel_kept() {
        let mut pipeline = ChunkPipeline::open(config("bedrock")).unwrap();
        let key = ChunkKey::new(0, 0);
        pipeline.request_chunk(key, |_, _| {});
        assert!(pipeline.wait_idle(Duration::from_secs(30)));

        let (ox, oz) = key.origin(pipeline.chunk_size());
        let bedrock = (-64..64)
            .map(|y| VoxelPos::new(ox, y, oz))
            .find(|&pos| {
                pipeline
                    .block(pos)
                    .and_then(|v| v.material())
                    .is_some_and(|m| m.is_unbreakable())
            })
            .unwrap();

        assert!(!pipeline.edit_block(bedrock, Edit::Remove));
        assert!(pipeline.block(bedrock).is_some());
        finish(pipeline);
    }
}
