//! Testing utilities for the Conduit workspace
//!
//! Shared commands, strategies, and fixtures.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use conduit_core::{
    Command, Context, ErrorCapsule, ErrorHandlingSelector, ErrorHandlingStrategy,
    ErrorHandlingStrategyFactory, PipelineError, PipelineRunner,
};
use conduit_mapper::impl_mapped;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;

/// Appends its label to `body["trail"]`
#[derive(Debug, Clone, Copy)]
pub struct TrailCommand(pub &'static str);

impl Command for TrailCommand {
    fn run(&self, context: &mut Context) -> anyhow::Result<()> {
        push_trail(context, self.0);
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.0
    }
}

/// Appends its label to the trail, then one capsule per message
#[derive(Debug, Clone)]
pub struct ErrorCommand {
    pub label: &'static str,
    pub messages: Vec<&'static str>,
}

impl ErrorCommand {
    pub fn new(label: &'static str, messages: &[&'static str]) -> Self {
        Self {
            label,
            messages: messages.to_vec(),
        }
    }
}

impl Command for ErrorCommand {
    fn run(&self, context: &mut Context) -> anyhow::Result<()> {
        push_trail(context, self.label);
        context.extend_errors(self.messages.iter().map(|m| ErrorCapsule::new(*m)));
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

/// Appends its label to the trail and responds with a [`Greeting`]
#[derive(Debug, Clone, Copy)]
pub struct RespondCommand {
    pub label: &'static str,
    pub message: &'static str,
}

impl RespondCommand {
    pub fn new(label: &'static str, message: &'static str) -> Self {
        Self { label, message }
    }
}

impl Command for RespondCommand {
    fn run(&self, context: &mut Context) -> anyhow::Result<()> {
        push_trail(context, self.label);
        context.respond(Greeting::new(self.message));
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

/// Appends its label to the trail, then fails with a fault
#[derive(Debug, Clone, Copy)]
pub struct FaultCommand(pub &'static str);

impl Command for FaultCommand {
    fn run(&self, context: &mut Context) -> anyhow::Result<()> {
        push_trail(context, self.0);
        anyhow::bail!("{} failed unexpectedly", self.0)
    }

    fn name(&self) -> &'static str {
        self.0
    }
}

/// Strategy that records every capsule it receives
#[derive(Debug)]
pub struct RecordingStrategy {
    identifier: String,
    handled: Mutex<Vec<ErrorCapsule>>,
}

impl RecordingStrategy {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            handled: Mutex::new(Vec::new()),
        }
    }

    pub fn handled(&self) -> Vec<ErrorCapsule> {
        self.handled.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.handled.lock().len()
    }
}

impl ErrorHandlingStrategy for RecordingStrategy {
    fn handle(&self, _context: &mut Context, error: &ErrorCapsule) -> Result<(), PipelineError> {
        self.handled.lock().push(error.clone());
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Sample mapped payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Greeting {
    pub message: Option<String>,
    pub amount: Option<Decimal>,
    pub issued_at: Option<DateTime<Utc>>,
}

impl_mapped!(Greeting { message, amount, issued_at });

impl Greeting {
    pub fn new(message: &str) -> Self {
        Self {
            message: Some(message.to_owned()),
            ..Self::default()
        }
    }
}

/// Sample mapped event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPlaced {
    pub order_id: String,
    pub total: Option<Decimal>,
    pub placed_at: Option<DateTime<Utc>>,
}

impl_mapped!(OrderPlaced { order_id, total, placed_at });

/// Context with an empty trail
pub fn trail_context() -> Context {
    Context::new(json!({ "trail": [] }))
}

/// Labels appended to `body["trail"]`, in order
pub fn trail(context: &Context) -> Vec<String> {
    context.body["trail"]
        .as_array()
        .map(|labels| {
            labels
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Runner with the default strategies, selecting `respond` by default
pub fn default_runner() -> PipelineRunner {
    PipelineRunner::new(Arc::new(ErrorHandlingStrategyFactory::default()))
}

/// Runner whose only strategy is `strategy`, selected by default
pub fn recording_runner(strategy: Arc<RecordingStrategy>) -> PipelineRunner {
    let selector = ErrorHandlingSelector::new(strategy.identifier());
    let mut factory = ErrorHandlingStrategyFactory::new(selector);
    factory.register(strategy);
    PipelineRunner::new(Arc::new(factory))
}

fn push_trail(context: &mut Context, label: &str) {
    if !context.body.is_object() {
        context.body = json!({});
    }
    if !context.body["trail"].is_array() {
        context.body["trail"] = json!([]);
    }
    if let Some(labels) = context.body["trail"].as_array_mut() {
        labels.push(json!(label));
    }
}
