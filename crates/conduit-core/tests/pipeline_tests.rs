//! Pipeline execution scenarios across composers, strategies and commands

use conduit_core::{
    Command, Context, ErrorCapsule, ErrorHandlingSelector, ErrorHandlingStrategyFactory,
    PipelineError, PipelineRunner, RunOutcome, SequenceBuilder, SequenceComposer,
};
use conduit_test_utils::{
    default_runner, recording_runner, trail, trail_context, ErrorCommand, FaultCommand, Greeting,
    RecordingStrategy, RespondCommand, TrailCommand,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

fn cmd(command: impl Command + 'static) -> Arc<dyn Command> {
    Arc::new(command)
}

struct Checkout;

impl SequenceBuilder for Checkout {
    fn build(&self, composer: &mut SequenceComposer) {
        let mut validation = SequenceComposer::new("validation");
        validation
            .add_command(cmd(TrailCommand("C")))
            .add_command(cmd(TrailCommand("D")));

        composer
            .add_command(cmd(TrailCommand("A")))
            .add_subsequence(Arc::new(validation))
            .add_command(cmd(TrailCommand("B")));
    }
}

#[test]
fn nested_sequence_flattens_in_declaration_order() {
    let composer = SequenceComposer::compose("checkout", &Checkout);
    assert_eq!(composer.flatten().names(), vec!["A", "C", "D", "B"]);

    let mut ctx = trail_context();
    let outcome = default_runner().run(&mut ctx, &composer).unwrap();

    assert_eq!(outcome, RunOutcome::Completed { executed: 4 });
    assert_eq!(trail(&ctx), vec!["A", "C", "D", "B"]);
}

#[test]
fn repeated_flatten_is_stable() {
    let composer = SequenceComposer::compose("checkout", &Checkout);
    let first = composer.flatten().names();
    for _ in 0..3 {
        assert_eq!(composer.flatten().names(), first);
    }
}

#[test]
fn short_circuit_stops_after_failing_command() {
    let strategy = Arc::new(RecordingStrategy::new("record"));
    let runner = recording_runner(Arc::clone(&strategy));

    let mut composer = SequenceComposer::new("guarded");
    composer
        .add_command(cmd(TrailCommand("A")))
        .add_command(cmd(ErrorCommand::new("E", &["invalid quantity"])))
        .add_command(cmd(TrailCommand("C")));

    let mut ctx = trail_context();
    let outcome = runner.run(&mut ctx, &composer).unwrap();

    assert_eq!(trail(&ctx), vec!["A", "E"]);
    assert_eq!(strategy.handled(), vec![ErrorCapsule::new("invalid quantity")]);
    assert_eq!(
        outcome,
        RunOutcome::ShortCircuited {
            executed: 2,
            command: "E".into(),
            error: ErrorCapsule::new("invalid quantity"),
        }
    );
}

#[test]
fn most_recent_capsule_is_handled() {
    let strategy = Arc::new(RecordingStrategy::new("record"));
    let runner = recording_runner(Arc::clone(&strategy));

    let mut composer = SequenceComposer::new("double");
    composer.add_command(cmd(ErrorCommand::new("E", &["e1", "e2"])));

    let mut ctx = trail_context();
    runner.run(&mut ctx, &composer).unwrap();

    assert_eq!(strategy.call_count(), 1);
    assert_eq!(strategy.handled()[0].message, "e2");
    assert_eq!(ctx.errors().len(), 2);
}

#[test]
fn completion_keeps_last_response_and_skips_strategy() {
    let strategy = Arc::new(RecordingStrategy::new("record"));
    let runner = recording_runner(Arc::clone(&strategy));

    let mut composer = SequenceComposer::new("greet");
    composer
        .add_command(cmd(RespondCommand::new("first", "hello")))
        .add_command(cmd(RespondCommand::new("second", "goodbye")));

    let mut ctx = trail_context();
    runner.run(&mut ctx, &composer).unwrap();

    assert_eq!(strategy.call_count(), 0);
    let greeting = ctx.response.unwrap();
    assert_eq!(
        greeting.downcast_ref::<Greeting>(),
        Some(&Greeting::new("goodbye"))
    );
}

#[test]
fn respond_strategy_replaces_payload_with_error() {
    let mut composer = SequenceComposer::new("respond-then-fail");
    composer
        .add_command(cmd(RespondCommand::new("greet", "hello")))
        .add_command(cmd(ErrorCommand::new("check", &["not allowed"])));

    let mut ctx = trail_context();
    default_runner().run(&mut ctx, &composer).unwrap();

    let response = ctx.response.unwrap();
    assert!(response.is_error());
    assert_eq!(response.as_error().unwrap().message, "not allowed");
}

#[test]
fn unknown_selector_fails_with_configuration_error() {
    let mut composer = SequenceComposer::new("guarded");
    composer.add_command(cmd(ErrorCommand::new("E", &["bad"])));

    let mut ctx = trail_context().with_error_handling(ErrorHandlingSelector::new("retry"));
    let err = default_runner().run(&mut ctx, &composer).unwrap_err();

    assert!(matches!(err, PipelineError::StrategyNotFound(ref s) if s == "retry"));
    assert!(err.is_configuration());
    assert!(ctx.response.is_none());
}

#[test]
fn unknown_selector_is_harmless_without_errors() {
    let mut composer = SequenceComposer::new("clean");
    composer.add_command(cmd(TrailCommand("A")));

    let mut ctx = trail_context().with_error_handling(ErrorHandlingSelector::new("retry"));
    assert!(default_runner().run(&mut ctx, &composer).is_ok());
}

#[test]
fn raise_strategy_escalates_after_short_circuit() {
    let mut composer = SequenceComposer::new("event");
    composer
        .add_command(cmd(ErrorCommand::new("E", &["duplicate order"])))
        .add_command(cmd(TrailCommand("after")));

    let mut ctx = trail_context().with_error_handling(ErrorHandlingSelector::raise());
    let err = default_runner().run(&mut ctx, &composer).unwrap_err();

    assert_eq!(err.capsule().unwrap().message, "duplicate order");
    assert_eq!(trail(&ctx), vec!["E"]);
}

#[test]
fn fault_aborts_without_strategy() {
    let strategy = Arc::new(RecordingStrategy::new("record"));
    let runner = recording_runner(Arc::clone(&strategy));

    let mut composer = SequenceComposer::new("faulty");
    composer
        .add_command(cmd(FaultCommand("boom")))
        .add_command(cmd(TrailCommand("after")));

    let mut ctx = trail_context();
    let err = runner.run(&mut ctx, &composer).unwrap_err();

    assert!(matches!(err, PipelineError::CommandAborted { ref command, .. } if command == "boom"));
    assert!(err.is_retryable());
    assert_eq!(strategy.call_count(), 0);
    assert_eq!(trail(&ctx), vec!["boom"]);
}

#[test]
fn run_plan_executes_prebuilt_plan() {
    let composer = SequenceComposer::compose("checkout", &Checkout);
    let plan = composer.flatten();
    let runner = default_runner();

    for _ in 0..2 {
        let mut ctx = trail_context();
        runner.run_plan(&mut ctx, &plan).unwrap();
        assert_eq!(trail(&ctx), vec!["A", "C", "D", "B"]);
    }
}

#[test]
fn factory_default_selector_applies_when_context_has_none() {
    let factory = ErrorHandlingStrategyFactory::with_defaults(ErrorHandlingSelector::raise());
    let runner = PipelineRunner::new(Arc::new(factory));

    let mut composer = SequenceComposer::new("guarded");
    composer.add_command(cmd(ErrorCommand::new("E", &["bad"])));

    let err = runner.run(&mut Context::default(), &composer).unwrap_err();
    assert!(matches!(err, PipelineError::Raised(_)));
}

const LABELS: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn nest(labels: &[usize], depth: usize) -> SequenceComposer {
    let mut composer = SequenceComposer::new(format!("level-{depth}"));
    if let Some((first, rest)) = labels.split_first() {
        composer
            .add_command(cmd(TrailCommand(LABELS[*first])))
            .add_subsequence(Arc::new(nest(rest, depth + 1)));
    }
    composer
}

proptest! {
    #[test]
    fn nesting_preserves_order(labels in prop::collection::vec(0..LABELS.len(), 0..12)) {
        let composer = nest(&labels, 0);
        let expected: Vec<&str> = labels.iter().map(|i| LABELS[*i]).collect();
        prop_assert_eq!(composer.flatten().names(), expected.clone());

        let mut ctx = trail_context();
        default_runner().run(&mut ctx, &composer).unwrap();
        prop_assert_eq!(trail(&ctx), expected);
    }
}
