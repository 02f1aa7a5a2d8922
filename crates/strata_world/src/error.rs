//! # World Error Types
//!
//! Errors the chunk pipeline can report. Persistence failures are mostly
//! handled where they happen (a failed read is a miss, a failed write is
//! logged and dropped); they surface as values only from explicit store calls.

use std::path::Path;

use strata_procedural::ProceduralError;
use thiserror::Error;

/// Errors that can occur in the chunk pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorldError {
    /// Disk read or write failed, or a record did not verify.
    #[error("persistence failure at {path}: {reason}")]
    PersistenceIoFailure {
        /// File or directory involved.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// The generation worker did not acknowledge INIT in time.
    #[error("generation worker did not acknowledge INIT within {timeout_ms} ms")]
    WorkerInitTimeout {
        /// The deadline that passed.
        timeout_ms: u64,
    },

    /// The generation worker rejected INIT.
    #[error("generation worker failed to initialize: {0}")]
    WorkerInitFailed(String),

    /// The worker's mailbox closed while the pipeline was running.
    #[error("generation worker disconnected")]
    WorkerDisconnected,

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generation settings rejected.
    #[error(transparent)]
    Procedural(#[from] ProceduralError),
}

impl WorldError {
    /// Builds a [`WorldError::PersistenceIoFailure`] for a path.
    pub(crate) fn io(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::PersistenceIoFailure {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
