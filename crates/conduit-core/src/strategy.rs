//! Error-handling strategies
//!
//! When a command leaves an [`ErrorCapsule`] on the context, the runner asks
//! the [`ErrorHandlingStrategyFactory`] for the strategy named by the run's
//! [`ErrorHandlingSelector`] and hands it the most recent capsule.

use crate::capsule::ErrorCapsule;
use crate::context::{Context, Response};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Identifier of the strategy that should handle a run's failure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorHandlingSelector(String);

impl ErrorHandlingSelector {
    /// Identifier of [`RespondStrategy`]
    pub const RESPOND: &'static str = "respond";

    /// Identifier of [`RaiseStrategy`]
    pub const RAISE: &'static str = "raise";

    /// Create selector from an identifier
    #[inline]
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into())
    }

    /// Select [`RespondStrategy`]
    #[inline]
    #[must_use]
    pub fn respond() -> Self {
        Self::new(Self::RESPOND)
    }

    /// Select [`RaiseStrategy`]
    #[inline]
    #[must_use]
    pub fn raise() -> Self {
        Self::new(Self::RAISE)
    }

    /// Identifier as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ErrorHandlingSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ErrorHandlingSelector {
    fn from(identifier: &str) -> Self {
        Self::new(identifier)
    }
}

/// Policy turning a recorded failure into an observable outcome
pub trait ErrorHandlingStrategy: Debug + Send + Sync {
    /// Handle the run's most recent failure
    ///
    /// # Errors
    /// Returns error when the failure must escalate past the adapter
    fn handle(&self, context: &mut Context, error: &ErrorCapsule) -> Result<(), PipelineError>;

    /// Key matched against the selector
    fn identifier(&self) -> &str;
}

/// Stores the failure as the run's response
#[derive(Debug, Clone, Copy, Default)]
pub struct RespondStrategy;

impl ErrorHandlingStrategy for RespondStrategy {
    fn handle(&self, context: &mut Context, error: &ErrorCapsule) -> Result<(), PipelineError> {
        context.response = Some(Response::Error(error.clone()));
        Ok(())
    }

    fn identifier(&self) -> &str {
        ErrorHandlingSelector::RESPOND
    }
}

/// Escalates the failure to the caller
#[derive(Debug, Clone, Copy, Default)]
pub struct RaiseStrategy;

impl ErrorHandlingStrategy for RaiseStrategy {
    fn handle(&self, _context: &mut Context, error: &ErrorCapsule) -> Result<(), PipelineError> {
        Err(PipelineError::Raised(error.clone()))
    }

    fn identifier(&self) -> &str {
        ErrorHandlingSelector::RAISE
    }
}

/// Registry of strategies, resolved by selector
///
/// Registration order is significant: when several strategies share an
/// identifier, the first registered wins.
#[derive(Debug, Clone)]
pub struct ErrorHandlingStrategyFactory {
    strategies: Vec<Arc<dyn ErrorHandlingStrategy>>,
    default_selector: ErrorHandlingSelector,
}

impl ErrorHandlingStrategyFactory {
    /// Create empty factory
    #[inline]
    #[must_use]
    pub fn new(default_selector: ErrorHandlingSelector) -> Self {
        Self {
            strategies: Vec::new(),
            default_selector,
        }
    }

    /// Create factory with [`RespondStrategy`] and [`RaiseStrategy`]
    #[must_use]
    pub fn with_defaults(default_selector: ErrorHandlingSelector) -> Self {
        let mut factory = Self::new(default_selector);
        factory.register(Arc::new(RespondStrategy));
        factory.register(Arc::new(RaiseStrategy));
        factory
    }

    /// Register a strategy after the existing ones
    pub fn register(&mut self, strategy: Arc<dyn ErrorHandlingStrategy>) -> &mut Self {
        self.strategies.push(strategy);
        self
    }

    /// Selector used for contexts that carry none
    #[inline]
    #[must_use]
    pub fn default_selector(&self) -> &ErrorHandlingSelector {
        &self.default_selector
    }

    /// Resolve the first strategy registered under `selector`
    ///
    /// # Errors
    /// Returns [`PipelineError::StrategyNotFound`] if nothing matches
    pub fn resolve(
        &self,
        selector: &ErrorHandlingSelector,
    ) -> Result<&Arc<dyn ErrorHandlingStrategy>, PipelineError> {
        self.strategies
            .iter()
            .find(|s| s.identifier() == selector.as_str())
            .ok_or_else(|| PipelineError::StrategyNotFound(selector.to_string()))
    }

    /// Resolve the strategy selected by the context, or the default
    ///
    /// # Errors
    /// Returns [`PipelineError::StrategyNotFound`] if nothing matches
    pub fn resolve_for(
        &self,
        context: &Context,
    ) -> Result<&Arc<dyn ErrorHandlingStrategy>, PipelineError> {
        self.resolve(context.error_handling().unwrap_or(&self.default_selector))
    }

    /// Registered identifiers, in registration order
    #[must_use]
    pub fn identifiers(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.identifier()).collect()
    }
}

impl Default for ErrorHandlingStrategyFactory {
    fn default() -> Self {
        Self::with_defaults(ErrorHandlingSelector::respond())
    }
}
