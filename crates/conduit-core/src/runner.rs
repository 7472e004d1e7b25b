//! Pipeline runner
//!
//! Executes a flattened [`ExecutionPlan`] against one [`Context`], stopping
//! at the first command that leaves an error capsule behind.

use crate::capsule::ErrorCapsule;
use crate::context::Context;
use crate::error::PipelineError;
use crate::sequence::{ExecutionPlan, SequenceComposer};
use crate::strategy::ErrorHandlingStrategyFactory;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, trace};

/// Lifecycle of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Plan not yet entered
    NotStarted,
    /// Executing the command at this index
    Running(usize),
    /// Stopped after a command recorded a failure
    ShortCircuited,
    /// Every command executed without recording a failure
    Completed,
    /// A command faulted
    Aborted,
}

impl RunState {
    /// Check if no further command will execute
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ShortCircuited | Self::Completed | Self::Aborted)
    }
}

/// How a run that returned normally ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// All commands executed
    Completed {
        /// Number of commands executed
        executed: usize,
    },
    /// A command recorded a failure and the strategy handled it
    ShortCircuited {
        /// Number of commands executed, including the failing one
        executed: usize,
        /// Name of the failing command
        command: String,
        /// Capsule handed to the strategy
        error: ErrorCapsule,
    },
}

impl RunOutcome {
    /// Number of commands executed
    #[inline]
    #[must_use]
    pub fn executed(&self) -> usize {
        match self {
            Self::Completed { executed } | Self::ShortCircuited { executed, .. } => *executed,
        }
    }

    /// Check if the run stopped early
    #[inline]
    #[must_use]
    pub fn is_short_circuited(&self) -> bool {
        matches!(self, Self::ShortCircuited { .. })
    }
}

/// Runs composed sequences against contexts
///
/// Stateless between runs; one runner may serve any number of contexts.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    strategies: Arc<ErrorHandlingStrategyFactory>,
}

impl PipelineRunner {
    /// Create runner resolving strategies from `strategies`
    #[inline]
    #[must_use]
    pub fn new(strategies: Arc<ErrorHandlingStrategyFactory>) -> Self {
        Self { strategies }
    }

    /// Strategy factory in use
    #[inline]
    #[must_use]
    pub fn strategies(&self) -> &ErrorHandlingStrategyFactory {
        &self.strategies
    }

    /// Flatten `composer` and run it
    ///
    /// # Errors
    /// Returns error if a command faults, no strategy matches the selector,
    /// or the strategy escalates the failure
    pub fn run(
        &self,
        context: &mut Context,
        composer: &SequenceComposer,
    ) -> Result<RunOutcome, PipelineError> {
        let plan = composer.flatten();
        self.execute(context, &plan, composer.name())
    }

    /// Run an already flattened plan
    ///
    /// # Errors
    /// Same as [`PipelineRunner::run`]
    pub fn run_plan(
        &self,
        context: &mut Context,
        plan: &ExecutionPlan,
    ) -> Result<RunOutcome, PipelineError> {
        self.execute(context, plan, "plan")
    }

    fn execute(
        &self,
        context: &mut Context,
        plan: &ExecutionPlan,
        composer: &str,
    ) -> Result<RunOutcome, PipelineError> {
        let span = info_span!("pipeline", run_id = %context.run_id(), composer);
        let _enter = span.enter();

        let mut state = RunState::NotStarted;
        for (index, command) in plan.iter().enumerate() {
            transition(&mut state, RunState::Running(index));
            let name = command.name();

            info!(command = name, "command started");
            trace!(command = name, body = %context.body, "command input");

            if let Err(fault) = command.run(context) {
                transition(&mut state, RunState::Aborted);
                error!(command = name, error = %format!("{fault:#}"), "command aborted");
                return Err(PipelineError::CommandAborted {
                    command: name.to_owned(),
                    fault,
                });
            }

            trace!(command = name, response = ?context.response, "command output");
            info!(command = name, "command finished");

            if let Some(capsule) = context.last_error().cloned() {
                transition(&mut state, RunState::ShortCircuited);
                error!(
                    command = name,
                    error = %capsule,
                    recorded = context.errors().len(),
                    "pipeline short-circuited"
                );
                let strategy = self.strategies.resolve_for(context)?;
                debug!(strategy = strategy.identifier(), "delegating error");
                strategy.handle(context, &capsule)?;
                return Ok(RunOutcome::ShortCircuited {
                    executed: index + 1,
                    command: name.to_owned(),
                    error: capsule,
                });
            }
        }

        transition(&mut state, RunState::Completed);
        Ok(RunOutcome::Completed {
            executed: plan.len(),
        })
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = ?*state, to = ?next, "run state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use mockall::mock;
    use serde_json::json;

    mock! {
        Step {}

        impl Command for Step {
            fn run(&self, context: &mut Context) -> anyhow::Result<()>;
            fn name(&self) -> &'static str;
        }
    }

    fn runner() -> PipelineRunner {
        PipelineRunner::new(Arc::new(ErrorHandlingStrategyFactory::default()))
    }

    fn step(name: &'static str, calls: usize) -> MockStep {
        let mut step = MockStep::new();
        step.expect_name().return_const(name);
        step.expect_run().times(calls).returning(|_| Ok(()));
        step
    }

    #[test]
    fn terminal_states() {
        assert!(!RunState::NotStarted.is_terminal());
        assert!(!RunState::Running(3).is_terminal());
        assert!(RunState::ShortCircuited.is_terminal());
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Aborted.is_terminal());
    }

    #[test]
    fn empty_plan_completes() {
        let mut ctx = Context::default();
        let outcome = runner()
            .run(&mut ctx, &SequenceComposer::new("empty"))
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed { executed: 0 });
        assert!(ctx.response.is_none());
    }

    #[test]
    fn later_commands_skipped_after_error() {
        let mut failing = MockStep::new();
        failing.expect_name().return_const("validate");
        failing.expect_run().times(1).returning(|ctx| {
            ctx.push_error(ErrorCapsule::new("missing field"));
            Ok(())
        });

        let mut composer = SequenceComposer::new("guarded");
        composer
            .add_command(Arc::new(step("load", 1)))
            .add_command(Arc::new(failing))
            .add_command(Arc::new(step("save", 0)));

        let mut ctx = Context::new(json!({}));
        let outcome = runner().run(&mut ctx, &composer).unwrap();

        assert_eq!(outcome.executed(), 2);
        assert!(outcome.is_short_circuited());
        assert_eq!(
            ctx.response.unwrap().as_error().unwrap().message,
            "missing field"
        );
    }

    #[test]
    fn fault_aborts_with_command_name() {
        let mut faulty = MockStep::new();
        faulty.expect_name().return_const("fetch");
        faulty
            .expect_run()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        let mut composer = SequenceComposer::new("faulty");
        composer
            .add_command(Arc::new(faulty))
            .add_command(Arc::new(step("never", 0)));

        let err = runner().run(&mut Context::default(), &composer).unwrap_err();
        match err {
            PipelineError::CommandAborted { command, fault } => {
                assert_eq!(command, "fetch");
                assert_eq!(fault.to_string(), "connection reset");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
