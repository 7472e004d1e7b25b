//! Execution context
//!
//! One [`Context`] is threaded through every command of a single run and is
//! owned by that run alone. Everything except the error capsule list may be
//! overwritten freely; capsules can only be appended.

use crate::capsule::ErrorCapsule;
use crate::strategy::ErrorHandlingSelector;
use conduit_mapper::{Mapped, MappingError, StructuralMapper};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use ulid::Ulid;

/// Unique run identifier (ULID for sortability), used for log correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Variable lookup failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    /// No value stored under the key
    #[error("variable `{0}` is not set")]
    Missing(String),

    /// Stored value has a different type than requested
    #[error("variable `{key}` is not a {expected}")]
    TypeMismatch {
        /// Variable key
        key: String,
        /// Requested type
        expected: &'static str,
    },
}

/// Typed scratch space shared between commands of one run
///
/// Keys are string constants owned by convention; readers must know the
/// stored type and fail fast on mismatch.
#[derive(Default)]
pub struct Variables {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Variables {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous one
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Borrow a value of the expected type
    ///
    /// # Errors
    /// Returns error if the key is unset or holds another type
    pub fn get<T: Any>(&self, key: &str) -> Result<&T, VariableError> {
        self.values
            .get(key)
            .ok_or_else(|| VariableError::Missing(key.to_owned()))?
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch::<T>(key))
    }

    /// Mutably borrow a value of the expected type
    ///
    /// # Errors
    /// Returns error if the key is unset or holds another type
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Result<&mut T, VariableError> {
        self.values
            .get_mut(key)
            .ok_or_else(|| VariableError::Missing(key.to_owned()))?
            .downcast_mut::<T>()
            .ok_or_else(|| mismatch::<T>(key))
    }

    /// Remove and return a value of the expected type
    ///
    /// A value of another type is left in place.
    ///
    /// # Errors
    /// Returns error if the key is unset or holds another type
    pub fn take<T: Any>(&mut self, key: &str) -> Result<T, VariableError> {
        let boxed = self
            .values
            .remove(key)
            .ok_or_else(|| VariableError::Missing(key.to_owned()))?;
        match boxed.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(original) => {
                self.values.insert(key.to_owned(), original);
                Err(mismatch::<T>(key))
            }
        }
    }

    /// Check whether a key is set
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate over set keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of stored values
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Debug for Variables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("Variables").field("keys", &keys).finish()
    }
}

fn mismatch<T: Any>(key: &str) -> VariableError {
    VariableError::TypeMismatch {
        key: key.to_owned(),
        expected: std::any::type_name::<T>(),
    }
}

/// Result payload a command can leave on the context
///
/// Implemented for every [`Mapped`] type.
pub trait ResponsePayload: Debug + Send + Sync + 'static {
    /// Stable key of the payload type, used for status lookups
    fn type_key(&self) -> &'static str;

    /// Sparse wire form of the payload
    ///
    /// # Errors
    /// Returns error if the payload cannot be reduced
    fn to_untyped(
        &self,
        preserve_decimal_as_string: bool,
    ) -> Result<serde_json::Map<String, serde_json::Value>, MappingError>;

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;
}

impl<T: Mapped + Debug + Send + Sync> ResponsePayload for T {
    fn type_key(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_untyped(
        &self,
        preserve_decimal_as_string: bool,
    ) -> Result<serde_json::Map<String, serde_json::Value>, MappingError> {
        StructuralMapper::new().map_to_untyped::<T, T>(self, preserve_decimal_as_string)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Outcome left on the context for the adapter to encode
#[derive(Debug)]
pub enum Response {
    /// Successful result set by a command
    Payload(Box<dyn ResponsePayload>),
    /// Recoverable failure stored by the error-handling strategy
    Error(ErrorCapsule),
}

impl Response {
    /// Wrap a payload
    #[inline]
    #[must_use]
    pub fn payload<T: ResponsePayload>(payload: T) -> Self {
        Self::Payload(Box::new(payload))
    }

    /// Check for an error response
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Borrow the error capsule, if any
    #[inline]
    #[must_use]
    pub fn as_error(&self) -> Option<&ErrorCapsule> {
        match self {
            Self::Error(capsule) => Some(capsule),
            Self::Payload(_) => None,
        }
    }

    /// Borrow the payload as its concrete type
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Payload(payload) => payload.as_any().downcast_ref::<T>(),
            Self::Error(_) => None,
        }
    }
}

/// Mutable state of one request/event run
#[derive(Debug)]
pub struct Context {
    /// Decoded inbound payload
    pub body: serde_json::Value,

    /// Identity of the caller, set by adapters only
    pub auth_principal: Option<String>,

    /// Typed scratch space
    pub variables: Variables,

    /// Result for the adapter
    pub response: Option<Response>,

    errors: Vec<ErrorCapsule>,
    error_handling: Option<ErrorHandlingSelector>,
    run_id: RunId,
}

impl Context {
    /// Create context around a decoded body
    #[must_use]
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            body,
            auth_principal: None,
            variables: Variables::new(),
            response: None,
            errors: Vec::new(),
            error_handling: None,
            run_id: RunId::new(),
        }
    }

    /// With caller identity
    #[inline]
    #[must_use]
    pub fn with_auth_principal(mut self, principal: impl Into<String>) -> Self {
        self.auth_principal = Some(principal.into());
        self
    }

    /// With pre-populated variables
    #[inline]
    #[must_use]
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// With the error-handling selector for this run
    #[inline]
    #[must_use]
    pub fn with_error_handling(mut self, selector: ErrorHandlingSelector) -> Self {
        self.error_handling = Some(selector);
        self
    }

    /// Selector chosen by the adapter, if any
    #[inline]
    #[must_use]
    pub fn error_handling(&self) -> Option<&ErrorHandlingSelector> {
        self.error_handling.as_ref()
    }

    /// Run identifier
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Append a recoverable failure
    pub fn push_error(&mut self, error: ErrorCapsule) {
        tracing::debug!(error = %error, "error capsule appended");
        self.errors.push(error);
    }

    /// Append several failures, in order
    pub fn extend_errors(&mut self, errors: impl IntoIterator<Item = ErrorCapsule>) {
        for error in errors {
            self.push_error(error);
        }
    }

    /// All appended failures, oldest first
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[ErrorCapsule] {
        &self.errors
    }

    /// Most recently appended failure
    #[inline]
    #[must_use]
    pub fn last_error(&self) -> Option<&ErrorCapsule> {
        self.errors.last()
    }

    /// Check whether any failure was appended
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Set a successful payload
    pub fn respond<T: ResponsePayload>(&mut self, payload: T) {
        self.response = Some(Response::payload(payload));
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(serde_json::Value::Null)
    }
}
