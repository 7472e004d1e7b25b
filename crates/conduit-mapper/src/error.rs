//! Mapping errors
//!
//! Every [`MappingError`] carries the dotted path of the field that failed
//! (`nested_list[1].date`) so callers can log it without guessing.

/// Reason a value could not be mapped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingErrorKind {
    /// Value has the wrong shape for the declared field type
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Declared shape
        expected: &'static str,
        /// Shape found in the source
        found: &'static str,
    },

    /// Mandatory field received a null
    #[error("value is required but was null")]
    MissingValue,

    /// Nested object field received something other than an object
    #[error("expected an object, found {0}")]
    NotAnObject(&'static str),

    /// Collection field received something other than a list
    #[error("expected a list, found {0}")]
    NotAList(&'static str),

    /// Textual timestamp could not be parsed
    #[error("cannot parse timestamp `{0}`")]
    UnparsableTimestamp(String),

    /// Textual or floating decimal could not be parsed exactly
    #[error("cannot parse decimal `{0}`")]
    UnparsableDecimal(String),

    /// Enumeration text did not name a known variant
    #[error("unknown variant `{0}`")]
    UnknownVariant(String),

    /// Numeric value does not fit the declared integer type
    #[error("number {0} is out of range")]
    OutOfRange(String),
}

/// Mapping failure with the path of the offending field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot map `{}`: {kind}", display_path(.path))]
pub struct MappingError {
    path: String,
    kind: MappingErrorKind,
}

impl MappingError {
    /// Create error at the root of the mapped value
    #[inline]
    #[must_use]
    pub fn new(kind: MappingErrorKind) -> Self {
        Self {
            path: String::new(),
            kind,
        }
    }

    /// Shorthand for a [`MappingErrorKind::TypeMismatch`]
    #[inline]
    #[must_use]
    pub fn type_mismatch(expected: &'static str, found: &crate::Value) -> Self {
        Self::new(MappingErrorKind::TypeMismatch {
            expected,
            found: found.kind_name(),
        })
    }

    /// Prefix the path with a field name
    #[must_use]
    pub fn at_field(mut self, field: &str) -> Self {
        self.path = if self.path.is_empty() {
            field.to_owned()
        } else if self.path.starts_with('[') {
            format!("{field}{}", self.path)
        } else {
            format!("{field}.{}", self.path)
        };
        self
    }

    /// Prefix the path with a list index
    #[must_use]
    pub fn at_index(mut self, index: usize) -> Self {
        self.path = if self.path.is_empty() || self.path.starts_with('[') {
            format!("[{index}]{}", self.path)
        } else {
            format!("[{index}].{}", self.path)
        };
        self
    }

    /// Dotted path of the failing field, empty for the root
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Failure reason
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &MappingErrorKind {
        &self.kind
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}
