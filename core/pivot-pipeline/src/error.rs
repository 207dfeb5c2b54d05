//! FILENAME: core/pivot-pipeline/src/error.rs

use std::time::Duration;

use pivot_engine::PivotError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no offload context is available")]
    Unavailable,

    #[error("offload transport failed: {0}")]
    Transport(String),

    #[error("offload timed out after {0:?}")]
    Timeout(Duration),

    #[error("offload protocol violation: {0}")]
    Protocol(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The worker answered with an ERROR message.
    #[error("worker error: {0}")]
    Worker(String),

    #[error("computation failed: {0}")]
    Computation(String),

    #[error("no record source has been set")]
    NoSource,

    #[error("pipeline driver has shut down")]
    Closed,
}

impl From<PivotError> for PipelineError {
    fn from(e: PivotError) -> Self {
        PipelineError::Computation(e.to_string())
    }
}

impl PipelineError {
    /// Errors the pipeline recovers from by computing inline.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PipelineError::Computation(_) | PipelineError::NoSource | PipelineError::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offload_failures_are_recoverable() {
        assert!(PipelineError::Unavailable.is_recoverable());
        assert!(PipelineError::Timeout(Duration::from_secs(60)).is_recoverable());
        assert!(PipelineError::Worker("boom".into()).is_recoverable());
        assert!(!PipelineError::from(PivotError::Sealed).is_recoverable());
    }
}
