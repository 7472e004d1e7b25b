//! Adapter configuration
//!
//! Loaded from TOML; every section and field has a default, so an empty
//! document is a valid configuration.

use conduit_core::{ErrorHandlingSelector, ErrorHandlingStrategyFactory};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Document is not valid TOML or has wrong field types
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    /// Strategy identifier for runs whose adapter selects none
    pub default_error_handling: String,
    /// Tracing subscriber settings
    pub logging: LoggingConfig,
    /// API response settings
    pub web: WebConfig,
}

impl ConduitConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not a valid configuration document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// With default error-handling strategy
    #[inline]
    #[must_use]
    pub fn with_default_error_handling(mut self, identifier: impl Into<String>) -> Self {
        self.default_error_handling = identifier.into();
        self
    }

    /// With logging settings
    #[inline]
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// With API response settings
    #[inline]
    #[must_use]
    pub fn with_web(mut self, web: WebConfig) -> Self {
        self.web = web;
        self
    }

    /// Default selector as a typed value
    #[inline]
    #[must_use]
    pub fn default_selector(&self) -> ErrorHandlingSelector {
        ErrorHandlingSelector::new(self.default_error_handling.as_str())
    }

    /// Factory with the built-in strategies and the configured default
    #[must_use]
    pub fn strategy_factory(&self) -> ErrorHandlingStrategyFactory {
        ErrorHandlingStrategyFactory::with_defaults(self.default_selector())
    }
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self {
            default_error_handling: ErrorHandlingSelector::RESPOND.to_owned(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
        }
    }
}

/// Tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines
    Pretty,
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, used when `RUST_LOG` is unset
    pub filter: String,
    /// Output format
    pub format: LogFormat,
}

impl LoggingConfig {
    /// With filter directive
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// With output format
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            format: LogFormat::Json,
        }
    }
}

/// API response settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// `content-type` header of every encoded response
    pub content_type: String,
    /// Status for unknown routes
    pub not_found_status: u16,
    /// Status for faults and escalated errors
    pub internal_error_status: u16,
    /// Status for runs that leave no response
    pub empty_status: u16,
    /// Render decimals in payloads as exact text instead of numbers
    pub preserve_decimal_as_string: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            content_type: "application/json".to_owned(),
            not_found_status: 404,
            internal_error_status: 500,
            empty_status: 204,
            preserve_decimal_as_string: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ConduitConfig::from_toml_str("").unwrap();
        assert_eq!(config, ConduitConfig::default());
        assert_eq!(config.default_selector().as_str(), "respond");
        assert_eq!(config.web.not_found_status, 404);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = ConduitConfig::from_toml_str(
            r#"
            default_error_handling = "raise"

            [logging]
            format = "pretty"

            [web]
            internal_error_status = 503
            "#,
        )
        .unwrap();

        assert_eq!(config.default_error_handling, "raise");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.web.internal_error_status, 503);
        assert_eq!(config.web.empty_status, 204);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = ConduitConfig::from_toml_str("[web]\nnot_found_status = \"x\"").unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn builders() {
        let config = ConduitConfig::new()
            .with_default_error_handling("raise")
            .with_logging(LoggingConfig::default().with_filter("debug"));
        assert_eq!(config.default_selector(), ErrorHandlingSelector::raise());
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.strategy_factory().default_selector().as_str(), "raise");
    }
}
