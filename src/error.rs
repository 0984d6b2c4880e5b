use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::updater::UpdateStep;

/// Custom error type for docs_webhook startup and sidebar operations
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to read directory '{}': {source}", .path.display())]
    ReadDirFailed { path: PathBuf, source: io::Error },

    #[error("Failed to read metadata for '{}': {source}", .path.display())]
    MetadataFailed { path: PathBuf, source: io::Error },

    #[error("Failed to write sidebar '{}': {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Failure of the update action, attributed to the step that caused it
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("{step} failed to start: {source}")]
    SpawnFailed { step: UpdateStep, source: io::Error },

    #[error("{step} exited with {}: {stderr}", exit_code_label(.code))]
    NonZeroExit {
        step: UpdateStep,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{step} timed out after {}s", .after.as_secs())]
    TimedOut { step: UpdateStep, after: Duration },

    #[error("{step} failed: {source}")]
    GeneratorFailed { step: UpdateStep, source: HookError },

    #[error("{step} task aborted: {message}")]
    TaskAborted { step: UpdateStep, message: String },

    #[error("another update is still running after waiting {}s", .waited.as_secs())]
    LockWaitExpired { waited: Duration },

    #[error("update worker aborted: {message}")]
    WorkerAborted { message: String },
}

impl UpdateError {
    /// The step the failure belongs to, if it got as far as running one.
    pub fn step(&self) -> Option<UpdateStep> {
        match self {
            UpdateError::SpawnFailed { step, .. }
            | UpdateError::NonZeroExit { step, .. }
            | UpdateError::TimedOut { step, .. }
            | UpdateError::GeneratorFailed { step, .. }
            | UpdateError::TaskAborted { step, .. } => Some(*step),
            UpdateError::LockWaitExpired { .. } | UpdateError::WorkerAborted { .. } => None,
        }
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}

/// Helper type for Results that use HookError
pub type Result<T> = std::result::Result<T, HookError>;
