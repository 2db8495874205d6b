//! Typed error hierarchy for the ADW orchestrator.
//!
//! One enum per subsystem, each with a transparent `Other` arm so call
//! sites that only have an `anyhow::Error` at hand can still convert.

use thiserror::Error;

/// Errors reading/writing the plan or chunk artifacts.
#[derive(Debug, Error)]
pub enum ChunkerError {
    #[error("Failed to read plan file at {path}: {source}")]
    PlanReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write chunk body at {path}: {source}")]
    ChunkWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors reading/writing handoff artifacts. Parse/validation failures are
/// not represented here — they surface as `ValidationIssue`s instead, since
/// the validator is specified to never raise.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("Failed to write handoff at {path}: {source}")]
    WriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Git recovery command failed: {0}")]
    GitRecoveryFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors invoking the build tool itself (not a failed build).
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Failed to spawn build command {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn fix worker: {0}")]
    FixWorkerSpawnFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors preparing inputs for or spawning a worker process.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to spawn worker process {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write input artifact at {path}: {source}")]
    InputWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Top-level errors surfaced by the orchestrator's run loop.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Chunk {chunk_id} failed: {message}")]
    ChunkFailed { chunk_id: String, message: String },

    #[error("Chunker validation failed with {error_count} error(s)")]
    ChunkerValidationFailed { error_count: usize },

    #[error("Git worktree operation failed: {0}")]
    GitWorktreeFailed(String),

    #[error("No chunk named {0} exists in this run")]
    UnknownChunk(String),

    #[error("Chunk {0} is not in a failed state and cannot be retried")]
    NotFailed(String),

    #[error(transparent)]
    Chunker(#[from] ChunkerError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
