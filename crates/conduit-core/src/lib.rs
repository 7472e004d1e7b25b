//! Conduit Core - command pipeline engine
//!
//! Business operations are written as small [`Command`]s, composed
//! declaratively into [`SequenceComposer`]s (which may nest), flattened into
//! an [`ExecutionPlan`] and executed by the [`PipelineRunner`] against a
//! per-run [`Context`].
//!
//! Commands report expected, domain-level failures by appending an
//! [`ErrorCapsule`] to the context. The runner stops after the first command
//! that does so and hands the most recent capsule to the
//! [`ErrorHandlingStrategy`] chosen by the run's [`ErrorHandlingSelector`].
//! Unexpected faults (`Err` from a command) abort the run unhandled.
//!
//! # Example
//!
//! ```rust
//! use conduit_core::prelude::*;
//! use std::sync::Arc;
//!
//! struct Greet;
//!
//! impl Command for Greet {
//!     fn run(&self, context: &mut Context) -> anyhow::Result<()> {
//!         match context.body["name"].as_str() {
//!             Some(name) => context.variables.insert("greeting", format!("hello {name}")),
//!             None => context.push_error(ErrorCapsule::new("name is required").with_status(400)),
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut composer = SequenceComposer::new("greet");
//! composer.add_command(Arc::new(Greet));
//!
//! let runner = PipelineRunner::new(Arc::new(ErrorHandlingStrategyFactory::default()));
//! let mut context = Context::new(serde_json::json!({}));
//! let outcome = runner.run(&mut context, &composer).unwrap();
//!
//! assert!(outcome.is_short_circuited());
//! assert_eq!(context.response.unwrap().as_error().unwrap().status, Some(400));
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod capsule;
pub mod command;
pub mod context;
pub mod error;
pub mod runner;
pub mod sequence;
pub mod strategy;

pub use capsule::ErrorCapsule;
pub use command::Command;
pub use context::{Context, Response, ResponsePayload, RunId, VariableError, Variables};
pub use error::PipelineError;
pub use runner::{PipelineRunner, RunOutcome, RunState};
pub use sequence::{ExecutionPlan, SequenceBuilder, SequenceComponent, SequenceComposer};
pub use strategy::{
    ErrorHandlingSelector, ErrorHandlingStrategy, ErrorHandlingStrategyFactory, RaiseStrategy,
    RespondStrategy,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for writing commands and wiring pipelines
    pub use crate::{
        Command, Context, ErrorCapsule, ErrorHandlingSelector, ErrorHandlingStrategyFactory,
        PipelineError, PipelineRunner, Response, RunOutcome, SequenceBuilder, SequenceComposer,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
