//! Error capsules
//!
//! An [`ErrorCapsule`] records one recoverable, domain-level failure
//! (validation, not-found, ...). Commands append capsules to the context;
//! the runner hands the most recent one to the active error-handling
//! strategy.

use serde::{Deserialize, Serialize};

/// Immutable description of one detected failure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCapsule {
    /// Human-readable message
    pub message: String,

    /// Optional status classification (e.g. HTTP-style code)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Optional machine-readable code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorCapsule {
    /// Create capsule with a message only
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
        }
    }

    /// With status classification
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// With machine-readable code
    #[inline]
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for ErrorCapsule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
