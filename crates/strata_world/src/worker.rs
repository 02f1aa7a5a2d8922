//! # Generation Worker
//!
//! An actor that owns its mailbox. The actor thread reads [`WorkerRequest`]s
//! and hands chunk jobs to a fixed pool of executor threads; the pool size is
//! the maximum number of generations that can run at once.
//!
//! ```text
//!   pipeline ──requests──> [actor] ──jobs──> [executor × N] ──responses──> pipeline
//!                             │                                   ▲
//!                             └───────── INIT / CLEAR acks ───────┘
//! ```
//!
//! Nothing is shared with the caller except the two channels.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use strata_procedural::{ChunkGenerator, ChunkKey, GenerationSettings, VoxelSet};

use crate::error::{WorldError, WorldResult};
use crate::protocol::{WorkerRequest, WorkerResponse};

/// Something that can produce a chunk's base voxels.
///
/// Implementations are shared by every executor thread.
pub trait ChunkSource: Send + Sync {
    /// Generates the raw voxels of one chunk.
    fn generate(&self, key: ChunkKey, chunk_size: u32) -> VoxelSet;

    /// Drops any cross-chunk state.
    fn clear_cache(&self);

    /// Voxels delivered when [`ChunkSource::generate`] panics. Empty by default.
    fn fallback(&self, key: ChunkKey, chunk_size: u32) -> VoxelSet {
        let _ = (key, chunk_size);
        VoxelSet::new()
    }
}

impl ChunkSource for ChunkGenerator {
    fn generate(&self, key: ChunkKey, chunk_size: u32) -> VoxelSet {
        self.generate_sized(key, chunk_size)
    }

    fn clear_cache(&self) {
        ChunkGenerator::clear_cache(self);
    }

    fn fallback(&self, key: ChunkKey, chunk_size: u32) -> VoxelSet {
        self.emergency_chunk(key, chunk_size)
    }
}

/// Builds the chunk source when INIT arrives.
pub type SourceFactory =
    Box<dyn FnMut(&GenerationSettings) -> WorldResult<Arc<dyn ChunkSource>> + Send>;

/// The factory used in production: a [`ChunkGenerator`] from the settings.
#[must_use]
pub fn generator_factory() -> SourceFactory {
    Box::new(|settings: &GenerationSettings| {
        let generator = ChunkGenerator::new(settings.clone())?;
        Ok(Arc::new(generator) as Arc<dyn ChunkSource>)
    })
}

/// One chunk job for an executor.
struct Job {
    key: ChunkKey,
    chunk_size: u32,
}

/// Runs one job. A panicking source yields its fallback chunk (flagged
/// `true`) so the slot is still released.
fn generate_or_fallback(source: &dyn ChunkSource, job: &Job) -> (VoxelSet, bool) {
    match panic::catch_unwind(AssertUnwindSafe(|| source.generate(job.key, job.chunk_size))) {
        Ok(voxels) => (voxels, false),
        Err(_) => {
            tracing::error!(key = %job.key, "chunk generation panicked, using fallback chunk");
            let voxels =
                panic::catch_unwind(AssertUnwindSafe(|| source.fallback(job.key, job.chunk_size)))
                    .unwrap_or_default();
            (voxels, true)
        }
    }
}

/// The running executor pool.
struct Executors {
    source: Arc<dyn ChunkSource>,
    jobs: Sender<Job>,
    threads: Vec<JoinHandle<()>>,
}

impl Executors {
    fn spawn(
        source: Arc<dyn ChunkSource>,
        count: usize,
        responses: &Sender<WorkerResponse>,
    ) -> WorldResult<Self> {
        let (jobs, job_rx) = unbounded::<Job>();
        let mut threads = Vec::with_capacity(count);

        for index in 0..count {
            let source = Arc::clone(&source);
            let job_rx = job_rx.clone();
            let responses = responses.clone();
            let handle = thread::Builder::new()
                .name(format!("strata-gen-{index}"))
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        let (voxels, fallback) = generate_or_fallback(source.as_ref(), &job);
                        tracing::debug!(key = %job.key, voxels = voxels.len(), "chunk generated");
                        let ready = WorkerResponse::ChunkReady {
                            key: job.key,
                            buffers: voxels.to_buffers(),
                            fallback,
                        };
                        if responses.send(ready).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| WorldError::WorkerInitFailed(format!("spawn executor: {e}")))?;
            threads.push(handle);
        }

        Ok(Self {
            source,
            jobs,
            threads,
        })
    }

    /// Lets queued jobs finish, then joins every executor.
    fn stop(self) {
        drop(self.jobs);
        for handle in self.threads {
            let _ = handle.join();
        }
    }
}

/// Caller side of a running worker.
pub struct WorkerHandle {
    requests: Sender<WorkerRequest>,
    responses: Receiver<WorkerResponse>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Sends a request.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorkerDisconnected`] if the worker has exited.
    pub fn send(&self, request: WorkerRequest) -> WorldResult<()> {
        self.requests
            .send(request)
            .map_err(|_| WorldError::WorkerDisconnected)
    }

    /// The response mailbox.
    #[must_use]
    pub fn responses(&self) -> &Receiver<WorkerResponse> {
        &self.responses
    }

    /// Asks the worker to stop and waits for it.
    pub fn shutdown(mut self) {
        self.stop(true);
    }

    /// Asks the worker to stop without waiting (it may be stuck in INIT).
    pub fn detach(mut self) {
        self.stop(false);
    }

    fn stop(&mut self, join: bool) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.thread.take() {
            if join {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop(true);
    }
}

/// The generation worker actor.
pub struct GenerationWorker {
    factory: SourceFactory,
    max_concurrent: usize,
    requests: Receiver<WorkerRequest>,
    responses: Sender<WorkerResponse>,
    executors: Option<Executors>,
}

impl GenerationWorker {
    /// Starts the actor thread. The executor pool starts on INIT.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorkerInitFailed`] if the thread cannot start.
    pub fn spawn(factory: SourceFactory, max_concurrent: usize) -> WorldResult<WorkerHandle> {
        let (request_tx, request_rx) = unbounded();
        let (response_tx, response_rx) = unbounded();

        let worker = Self {
            factory,
            max_concurrent: max_concurrent.max(1),
            requests: request_rx,
            responses: response_tx,
            executors: None,
        };

        let thread = thread::Builder::new()
            .name("strata-worker".into())
            .spawn(move || worker.run())
            .map_err(|e| WorldError::WorkerInitFailed(format!("spawn worker: {e}")))?;

        Ok(WorkerHandle {
            requests: request_tx,
            responses: response_rx,
            thread: Some(thread),
        })
    }

    fn run(mut self) {
        tracing::debug!(max_concurrent = self.max_concurrent, "generation worker started");

        while let Ok(request) = self.requests.recv() {
            match request {
                WorkerRequest::Init { settings } => self.init(&settings),
                WorkerRequest::GenerateChunk { key, chunk_size } => {
                    let Some(executors) = &self.executors else {
                        tracing::error!(%key, "GENERATE_CHUNK before INIT, ignored");
                        continue;
                    };
                    if executors.jobs.send(Job { key, chunk_size }).is_err() {
                        tracing::error!(%key, "executor pool gone, chunk dropped");
                    }
                }
                WorkerRequest::ClearCache => {
                    if let Some(executors) = &self.executors {
                        executors.source.clear_cache();
                    }
                    if self.responses.send(WorkerResponse::CacheCleared).is_err() {
                        break;
                    }
                }
                WorkerRequest::Shutdown => break,
                WorkerRequest::Other(kind) => {
                    tracing::warn!(kind = %kind, "unknown worker message ignored");
                }
            }
        }

        if let Some(executors) = self.executors.take() {
            executors.stop();
        }
        tracing::debug!("generation worker stopped");
    }

    fn init(&mut self, settings: &GenerationSettings) {
        if let Some(old) = self.executors.take() {
            old.stop();
        }

        let response = match (self.factory)(settings).and_then(|source| {
            Executors::spawn(source, self.max_concurrent, &self.responses)
        }) {
            Ok(executors) => {
                self.executors = Some(executors);
                tracing::info!(seed = settings.seed, "generation worker initialized");
                WorkerResponse::InitComplete
            }
            Err(err) => {
                tracing::error!(%err, "generation worker INIT failed");
                WorkerResponse::InitFailed(err.to_string())
            }
        };
        let _ = self.responses.send(response);
    }
}
