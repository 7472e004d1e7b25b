//! Adapter error types

use crate::codec::CodecError;
use conduit_core::PipelineError;
use conduit_mapper::MappingError;
use thiserror::Error;

/// Errors raised while adapting an invocation to a pipeline run
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Pipeline run failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Payload could not be decoded or encoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Payload could not be mapped to or from its typed form
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// No handler registered for the event type
    #[error("{0} does not match any registered event handler")]
    EventNotFound(String),

    /// Record carries no `messageType` attribute
    #[error("record `{0}` has no message type")]
    MissingEventType(String),

    /// Invocation is neither an API request nor an event batch
    #[error("invocation matches no known envelope")]
    InvalidEnvelope,

    /// Invocation has a known shape but invalid fields
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),

    /// Response payload type has no registered status code
    #[error("no status code registered for `{0}`")]
    StatusCodeNotMapped(String),
}

impl AdapterError {
    /// Check if the failure stems from wiring rather than the record itself
    ///
    /// Re-delivering the same input cannot fix these, so they abort the batch.
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Pipeline(e) if e.is_configuration())
    }
}
