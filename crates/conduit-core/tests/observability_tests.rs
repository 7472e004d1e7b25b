//! Tracing output emitted by the runner

use conduit_core::SequenceComposer;
use conduit_test_utils::{default_runner, trail_context, ErrorCommand, TrailCommand};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

#[derive(Debug, Clone)]
struct Recorded {
    level: Level,
    fields: HashMap<String, String>,
}

impl Recorded {
    fn message(&self) -> &str {
        self.fields.get("message").map_or("", String::as_str)
    }
}

#[derive(Default)]
struct FieldVisitor(HashMap<String, String>);

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_owned(), value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_owned(), format!("{value:?}"));
    }
}

#[derive(Clone, Default)]
struct RecordingLayer(Arc<Mutex<Vec<Recorded>>>);

impl<S: Subscriber> Layer<S> for RecordingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.0.lock().push(Recorded {
            level: *event.metadata().level(),
            fields: visitor.0,
        });
    }
}

fn capture(run: impl FnOnce()) -> Vec<Recorded> {
    let layer = RecordingLayer::default();
    let subscriber = Registry::default().with(layer.clone());
    tracing::subscriber::with_default(subscriber, run);
    let events = layer.0.lock().clone();
    events
}

#[test]
fn every_command_is_announced_in_order() {
    let mut composer = SequenceComposer::new("announced");
    composer
        .add_command(Arc::new(TrailCommand("load")))
        .add_command(Arc::new(TrailCommand("save")));

    let events = capture(|| {
        default_runner()
            .run(&mut trail_context(), &composer)
            .unwrap();
    });

    let started: Vec<_> = events
        .iter()
        .filter(|e| e.message() == "command started")
        .map(|e| (e.level, e.fields["command"].clone()))
        .collect();
    assert_eq!(
        started,
        vec![
            (Level::INFO, "load".to_owned()),
            (Level::INFO, "save".to_owned())
        ]
    );
}

#[test]
fn short_circuit_is_logged_as_error() {
    let mut composer = SequenceComposer::new("guarded");
    composer
        .add_command(Arc::new(ErrorCommand::new("check", &["bad input"])))
        .add_command(Arc::new(TrailCommand("never")));

    let events = capture(|| {
        default_runner()
            .run(&mut trail_context(), &composer)
            .unwrap();
    });

    let short_circuit = events
        .iter()
        .find(|e| e.message() == "pipeline short-circuited")
        .unwrap();
    assert_eq!(short_circuit.level, Level::ERROR);
    assert_eq!(short_circuit.fields["command"], "check");
    assert_eq!(short_circuit.fields["error"], "bad input");
    assert!(!events
        .iter()
        .any(|e| e.fields.get("command").is_some_and(|c| c == "never")));
}
