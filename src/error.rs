//! Error types for the pipeline.

use std::path::PathBuf;
use std::time::Duration;

/// Fatal conditions that stop a run before or during processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The text and identifier inputs do not describe the same records.
    #[error("input line count mismatch: {texts} text lines but {ids} identifiers")]
    CountMismatch { texts: usize, ids: usize },

    /// The checkpoint index exists but could not be read.
    #[error("failed to read checkpoint index {}: {source}", path.display())]
    CheckpointRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure of a single annotation call.
///
/// These never escape the per-record unit of work; the scheduler logs and
/// discards them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnnotationError {
    #[error("annotation service error: {0}")]
    Service(String),

    #[error("annotation timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed annotation response: {0}")]
    Malformed(String),

    #[error("annotation task aborted: {0}")]
    TaskAborted(String),
}
