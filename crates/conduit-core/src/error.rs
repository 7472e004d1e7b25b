//! Pipeline error types

use crate::capsule::ErrorCapsule;
use thiserror::Error;

/// Errors that end a pipeline run without a response
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No registered strategy accepts the selector
    #[error("no error-handling strategy accepts selector `{0}`")]
    StrategyNotFound(String),

    /// A command failed with a fault rather than a recorded capsule
    #[error("command `{command}` aborted: {fault:#}")]
    CommandAborted {
        /// Name of the failing command
        command: String,
        /// Underlying fault
        fault: anyhow::Error,
    },

    /// The active strategy re-raised a recorded failure
    #[error("error raised: {0}")]
    Raised(ErrorCapsule),
}

impl PipelineError {
    /// Check if the error stems from wiring rather than input
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::StrategyNotFound(_))
    }

    /// Check if re-delivering the same input may succeed
    ///
    /// Raised capsules are domain failures and never retryable; faults may be.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CommandAborted { .. })
    }

    /// Capsule carried by a raised failure
    #[inline]
    #[must_use]
    pub fn capsule(&self) -> Option<&ErrorCapsule> {
        match self {
            Self::Raised(capsule) => Some(capsule),
            _ => None,
        }
    }
}
