//! # Store Worker
//!
//! Background IO thread in front of [`ChunkStore`]. Loads, base writes and
//! modification writes run off the caller's thread in submission order, so a
//! load queued after a write always observes it.
//!
//! Persistence failures never reach the caller as errors: a failed read is a
//! miss, a failed write is logged and dropped. Both are counted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use strata_procedural::{ChunkKey, VoxelSet};

use crate::error::{WorldError, WorldResult};
use crate::store::{ChunkStore, Modification, ModificationOverlay};

/// Work for the IO thread.
#[derive(Debug)]
pub(crate) enum StoreRequest {
    /// Resolve a chunk from disk.
    Load(ChunkKey),
    /// Persist a freshly generated base layer.
    SaveBase {
        key: ChunkKey,
        voxels: Arc<VoxelSet>,
    },
    /// Append one edit to a chunk's overlay.
    WriteModification {
        key: ChunkKey,
        modification: Modification,
    },
    /// Delete everything for this seed.
    Reset,
}

/// Result of a disk lookup.
#[derive(Debug)]
pub(crate) enum LoadOutcome {
    /// Base found; overlay already applied.
    Resolved(VoxelSet),
    /// No usable base. Any overlay on disk must be applied after generation.
    Missing { overlay: ModificationOverlay },
}

/// Reply from the IO thread.
#[derive(Debug)]
pub(crate) struct StoreResponse {
    pub key: ChunkKey,
    pub outcome: LoadOutcome,
}

/// Caller side of the IO thread.
pub(crate) struct StoreWorkerHandle {
    requests: Option<Sender<StoreRequest>>,
    responses: Receiver<StoreResponse>,
    store: Arc<ChunkStore>,
    failures: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StoreWorkerHandle {
    /// Starts the IO thread.
    pub(crate) fn spawn(store: ChunkStore) -> WorldResult<Self> {
        let store = Arc::new(store);
        let failures = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (request_tx, request_rx) = unbounded();
        let (response_tx, response_rx) = unbounded();
        let root = store.root().to_path_buf();

        let thread = {
            let store = Arc::clone(&store);
            let failures = Arc::clone(&failures);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("strata-io".into())
                .spawn(move || io_loop(&store, &request_rx, &response_tx, &failures, &shutdown))
                .map_err(|e| WorldError::io(&root, e))?
        };

        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            store,
            failures,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Queues a request. A stopped worker drops it with an error log.
    pub(crate) fn send(&self, request: StoreRequest) {
        let sent = self
            .requests
            .as_ref()
            .is_some_and(|tx| tx.send(request).is_ok());
        if !sent {
            tracing::error!("store worker stopped, request dropped");
        }
    }

    pub(crate) fn responses(&self) -> &Receiver<StoreResponse> {
        &self.responses
    }

    pub(crate) fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// Reads and writes that failed so far.
    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// True until `shutdown` is called.
    pub(crate) fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Flushes queued writes and joins the thread.
    pub(crate) fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.requests = None;
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StoreWorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn io_loop(
    store: &ChunkStore,
    requests: &Receiver<StoreRequest>,
    responses: &Sender<StoreResponse>,
    failures: &AtomicU64,
    shutdown: &AtomicBool,
) {
    let fail = |err: &WorldError| {
        failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(%err, "persistence failure");
    };

    // Runs until every sender is gone, so queued writes always land.
    while let Ok(request) = requests.recv() {
        match request {
            StoreRequest::Load(key) => {
                if shutdown.load(Ordering::SeqCst) {
                    continue;
                }
                let overlay = store.load_overlay(key).unwrap_or_else(|err| {
                    fail(&err);
                    ModificationOverlay::new()
                });
                let outcome = match store.load_base(key) {
                    Ok(Some(record)) => {
                        let mut voxels = record.voxels;
                        overlay.merge_onto(&mut voxels);
                        LoadOutcome::Resolved(voxels)
                    }
                    Ok(None) => LoadOutcome::Missing { overlay },
                    Err(err) => {
                        fail(&err);
                        LoadOutcome::Missing { overlay }
                    }
                };
                let _ = responses.send(StoreResponse { key, outcome });
            }
            StoreRequest::SaveBase { key, voxels } => {
                if let Err(err) = store.save_base(key, &voxels) {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(%key, %err, "base write dropped");
                }
            }
            StoreRequest::WriteModification { key, modification } => {
                if let Err(err) = store.write_modification(key, modification) {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(%key, %err, "modification write dropped");
                }
            }
            StoreRequest::Reset => {
                if let Err(err) = store.reset_world() {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(%err, "world reset failed");
                }
            }
        }
    }
    tracing::debug!("store worker stopped");
}
