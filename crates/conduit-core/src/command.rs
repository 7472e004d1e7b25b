//! Command abstraction

use crate::context::Context;

/// Smallest unit of business logic
///
/// A command reads and mutates the [`Context`]. Recoverable failures are
/// recorded with [`Context::push_error`]; returning `Err` signals a fault
/// that aborts the run.
pub trait Command: Send + Sync {
    /// Execute against the run's context
    ///
    /// # Errors
    /// Returns error on an unexpected fault
    fn run(&self, context: &mut Context) -> anyhow::Result<()>;

    /// Name used in logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl std::fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Command").field(&self.name()).finish()
    }
}
