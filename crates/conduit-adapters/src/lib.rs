//! Conduit adapters - entry points for pipelines
//!
//! Thin layers turning inbound invocations into [`conduit_core::Context`]s
//! and pipeline outcomes back into wire envelopes:
//!
//! - [`web`]: API requests, `respond` error handling, status-code mapping
//! - [`event`]: queued event batches, `raise` error handling, partial
//!   batch failures
//! - [`dispatch`]: one entry point for both envelope kinds
//! - [`codec`]: JSON with camelCase keys on the wire, snake_case inside
//! - [`config`] / [`telemetry`]: configuration and tracing setup
//!
//! # Example
//!
//! ```rust
//! use conduit_adapters::web::{ApiRequest, RequestHandler, StatusCodeMapping, WebRunner};
//! use conduit_core::{ErrorHandlingStrategyFactory, PipelineRunner, SequenceComposer};
//! use std::sync::Arc;
//!
//! let runner = PipelineRunner::new(Arc::new(ErrorHandlingStrategyFactory::default()));
//! let handler = RequestHandler::new("GET /ping", Arc::new(SequenceComposer::new("ping")), runner);
//! let web = WebRunner::new(vec![handler], StatusCodeMapping::new());
//!
//! assert_eq!(web.run(&ApiRequest::new("GET /ping")).status_code, 204);
//! assert_eq!(web.run(&ApiRequest::new("GET /nope")).status_code, 404);
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod telemetry;
pub mod web;

pub use codec::{CaseConvertingCodec, CodecError};
pub use config::{ConduitConfig, ConfigError, LogFormat, LoggingConfig, WebConfig};
pub use dispatch::{InvocationKind, InvocationRunner};
pub use error::AdapterError;
pub use event::{
    BatchItemFailure, BatchResponse, EventBatch, EventHandler, EventRecord, EventRunner,
    TypedEventHandler, EVENT,
};
pub use telemetry::init_tracing;
pub use web::{ApiRequest, ApiResponse, RequestHandler, StatusCodeMapping, WebRunner};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
