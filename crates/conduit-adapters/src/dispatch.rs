//! Invocation dispatch
//!
//! A single entry point receiving either an API request or an event batch.

use crate::codec::CodecError;
use crate::error::AdapterError;
use crate::event::{EventBatch, EventRunner};
use crate::web::{ApiRequest, WebRunner};
use serde_json::Value;
use tracing::{debug, warn};

/// Kind of an inbound invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    /// Envelope with a `routeKey`
    ApiRequest,
    /// Envelope with `Records`
    EventBatch,
}

impl InvocationKind {
    /// Classify a raw envelope
    #[must_use]
    pub fn detect(envelope: &Value) -> Option<Self> {
        let object = envelope.as_object()?;
        if object.contains_key("routeKey") {
            Some(Self::ApiRequest)
        } else if object.contains_key("Records") {
            Some(Self::EventBatch)
        } else {
            None
        }
    }
}

/// Dispatches raw invocations to the web or event runner
#[derive(Debug, Clone)]
pub struct InvocationRunner {
    web: WebRunner,
    events: EventRunner,
}

impl InvocationRunner {
    /// Create dispatcher
    #[must_use]
    pub fn new(web: WebRunner, events: EventRunner) -> Self {
        Self { web, events }
    }

    /// Run one invocation and return the encoded envelope
    ///
    /// # Errors
    /// Returns error if the envelope has no known shape, its fields are
    /// invalid, or an event pipeline is misconfigured
    pub fn run(&self, envelope: Value) -> Result<Value, AdapterError> {
        let Some(kind) = InvocationKind::detect(&envelope) else {
            warn!("invocation matches no known envelope");
            return Err(AdapterError::InvalidEnvelope);
        };
        debug!(?kind, "dispatching invocation");

        let encoded = match kind {
            InvocationKind::ApiRequest => {
                let request: ApiRequest = serde_json::from_value(envelope)?;
                serde_json::to_value(self.web.run(&request))
            }
            InvocationKind::EventBatch => {
                let batch: EventBatch = serde_json::from_value(envelope)?;
                serde_json::to_value(self.events.run(&batch)?)
            }
        };
        Ok(encoded.map_err(CodecError::from)?)
    }
}
