//! Event batch adapter
//!
//! Each record of a queued batch is routed by its `messageType` attribute
//! to an [`EventHandler`], which runs its pipeline with the `raise`
//! strategy. Failing records are reported back so the queue can redeliver
//! them; the rest of the batch still runs.

use crate::codec::CaseConvertingCodec;
use crate::error::AdapterError;
use conduit_core::{Context, ErrorHandlingSelector, PipelineRunner, SequenceComposer};
use conduit_mapper::{Mapped, StructuralMapper};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{error, info, info_span};

/// Variable key under which the typed event is stored
pub const EVENT: &str = "EVENT";

/// Attribute carrying the event type
pub const MESSAGE_TYPE: &str = "messageType";

/// One typed message attribute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttribute {
    /// String value
    #[serde(default)]
    pub string_value: Option<String>,
    /// Declared data type
    #[serde(default)]
    pub data_type: Option<String>,
}

/// One queued message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Queue-assigned identifier
    pub message_id: String,
    /// Raw message body
    #[serde(default)]
    pub body: String,
    /// Message attributes
    #[serde(default)]
    pub message_attributes: HashMap<String, MessageAttribute>,
}

impl EventRecord {
    /// Create record with its event type attribute set
    #[must_use]
    pub fn new(
        message_id: impl Into<String>,
        event_type: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let attribute = MessageAttribute {
            string_value: Some(event_type.into()),
            data_type: Some("String".to_owned()),
        };
        Self {
            message_id: message_id.into(),
            body: body.into(),
            message_attributes: HashMap::from([(MESSAGE_TYPE.to_owned(), attribute)]),
        }
    }

    /// Event type named by the `messageType` attribute
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.message_attributes
            .get(MESSAGE_TYPE)?
            .string_value
            .as_deref()
    }
}

/// Batch of queued messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Records in delivery order
    #[serde(rename = "Records")]
    pub records: Vec<EventRecord>,
}

/// One failed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    /// Message id of the failed record
    pub item_identifier: String,
}

/// Partial-failure report for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    /// Failed records, in batch order
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchResponse {
    /// Message ids of the failed records
    #[must_use]
    pub fn failed_ids(&self) -> Vec<&str> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect()
    }
}

/// Runs a pipeline for one event type
pub trait EventHandler: Send + Sync {
    /// Event type served, matched against the record's `messageType`
    fn event_type(&self) -> &str;

    /// Decode `body` and run the pipeline
    ///
    /// # Errors
    /// Returns error if decoding or mapping fails, or the pipeline faults
    /// or escalates
    fn handle(&self, body: &str) -> Result<Context, AdapterError>;
}

/// Handler mapping the body into event type `E` before running
///
/// The typed event is stored under [`EVENT`]; the decoded body stays on
/// [`Context::body`].
pub struct TypedEventHandler<E> {
    event_type: String,
    composer: Arc<SequenceComposer>,
    runner: PipelineRunner,
    codec: CaseConvertingCodec,
    mapper: StructuralMapper,
    _event: PhantomData<fn() -> E>,
}

impl<E: Mapped + Debug + Send + Sync> TypedEventHandler<E> {
    /// Create handler serving the short type name of `E`
    #[must_use]
    pub fn new(composer: Arc<SequenceComposer>, runner: PipelineRunner) -> Self {
        let full = std::any::type_name::<E>();
        let short = full.rsplit("::").next().unwrap_or(full);
        Self {
            event_type: short.to_owned(),
            composer,
            runner,
            codec: CaseConvertingCodec::new(),
            mapper: StructuralMapper::new(),
            _event: PhantomData,
        }
    }

    /// With an explicit event type name
    #[inline]
    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }
}

impl<E> Debug for TypedEventHandler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedEventHandler")
            .field("event_type", &self.event_type)
            .field("composer", &self.composer.name())
            .finish_non_exhaustive()
    }
}

impl<E: Mapped + Debug + Send + Sync> EventHandler for TypedEventHandler<E> {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn handle(&self, body: &str) -> Result<Context, AdapterError> {
        let decoded = self.codec.deserialize(body)?;
        let event: E = self.mapper.map_from_untyped(&decoded)?;

        let mut context = Context::new(decoded).with_error_handling(ErrorHandlingSelector::raise());
        context.variables.insert(EVENT, event);
        self.runner.run(&mut context, &self.composer)?;
        Ok(context)
    }
}

/// Routes batch records to their handlers
#[derive(Clone, Default)]
pub struct EventRunner {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventRunner {
    /// Create runner
    #[must_use]
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        Self { handlers }
    }

    /// Register a handler after the existing ones
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    /// Run every record, collecting the ids of those that fail
    ///
    /// # Errors
    /// Returns the first configuration error instead of reporting the record
    /// as failed; the rest of the batch is not run
    pub fn run(&self, batch: &EventBatch) -> Result<BatchResponse, AdapterError> {
        let mut response = BatchResponse::default();
        for record in &batch.records {
            let span = info_span!(
                "event",
                message_id = %record.message_id,
                event_type = record.event_type().unwrap_or_default()
            );
            let _enter = span.enter();

            match self.run_record(record) {
                Ok(()) => info!("event handled"),
                Err(err) if err.is_configuration() => {
                    error!(error = %err, "event runner aborted batch");
                    return Err(err);
                }
                Err(err) => {
                    error!(error = %err, "event runner captured error");
                    response.batch_item_failures.push(BatchItemFailure {
                        item_identifier: record.message_id.clone(),
                    });
                }
            }
        }
        Ok(response)
    }

    fn run_record(&self, record: &EventRecord) -> Result<(), AdapterError> {
        let event_type = record
            .event_type()
            .ok_or_else(|| AdapterError::MissingEventType(record.message_id.clone()))?;
        let handler = self
            .handlers
            .iter()
            .find(|h| h.event_type() == event_type)
            .ok_or_else(|| AdapterError::EventNotFound(event_type.to_owned()))?;
        handler.handle(&record.body)?;
        Ok(())
    }
}

impl Debug for EventRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<_> = self.handlers.iter().map(|h| h.event_type()).collect();
        f.debug_struct("EventRunner").field("handlers", &types).finish()
    }
}
