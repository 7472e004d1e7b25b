//! API request adapter
//!
//! Converts an inbound API request envelope into a [`Context`], runs the
//! route's pipeline with the `respond` strategy and encodes the outcome as
//! an [`ApiResponse`].

use crate::codec::{CaseConvertingCodec, CodecError};
use crate::config::WebConfig;
use crate::error::AdapterError;
use conduit_core::{
    Context, ErrorHandlingSelector, PipelineError, PipelineRunner, Response,
    SequenceComposer, Variables,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::any::type_name;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info_span};

/// Body of every internal-error response
pub const INTERNAL_ERROR_BODY: &str = r#"{"message":"internal server error"}"#;

/// JWT section of the request context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Jwt {
    /// Verified token claims
    #[serde(default)]
    pub claims: Map<String, Value>,
}

/// Authorizer section of the request context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Authorizer {
    /// JWT authorizer output
    #[serde(default)]
    pub jwt: Option<Jwt>,
}

/// Request context set by the gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Authorizer output
    #[serde(default)]
    pub authorizer: Option<Authorizer>,
}

/// Inbound API request envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    /// Route selector, e.g. `POST /orders`
    pub route_key: String,
    /// Path template values
    #[serde(default)]
    pub path_parameters: Option<BTreeMap<String, String>>,
    /// Query string values
    #[serde(default)]
    pub query_string_parameters: Option<BTreeMap<String, String>>,
    /// Gateway request context
    #[serde(default)]
    pub request_context: Option<RequestContext>,
    /// Raw body text
    #[serde(default)]
    pub body: Option<String>,
}

impl ApiRequest {
    /// Create request for a route
    #[inline]
    #[must_use]
    pub fn new(route_key: impl Into<String>) -> Self {
        Self {
            route_key: route_key.into(),
            ..Self::default()
        }
    }

    /// With raw body text
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// With one path parameter
    #[must_use]
    pub fn with_path_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_parameters
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// With one query string parameter
    #[must_use]
    pub fn with_query_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// With JWT claims
    #[must_use]
    pub fn with_claims(mut self, claims: Map<String, Value>) -> Self {
        self.request_context = Some(RequestContext {
            authorizer: Some(Authorizer {
                jwt: Some(Jwt { claims }),
            }),
        });
        self
    }

    /// JWT claims, if the request was authorized
    #[must_use]
    pub fn claims(&self) -> Option<&Map<String, Value>> {
        self.request_context
            .as_ref()?
            .authorizer
            .as_ref()?
            .jwt
            .as_ref()
            .map(|jwt| &jwt.claims)
    }
}

/// Outbound API response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Encoded body, absent for empty responses
    pub body: Option<String>,
}

/// Status code per response payload type
///
/// Error responses use the capsule's own status when it has one, otherwise
/// the configured error status.
#[derive(Debug, Clone)]
pub struct StatusCodeMapping {
    payloads: HashMap<&'static str, u16>,
    error_status: u16,
}

impl StatusCodeMapping {
    /// Create mapping with error status 400
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            payloads: HashMap::new(),
            error_status: 400,
        }
    }

    /// Register the status for payload type `T`
    pub fn add_mapping<T: 'static>(&mut self, status: u16) -> &mut Self {
        self.payloads.insert(type_name::<T>(), status);
        self
    }

    /// With status for error capsules that carry none
    #[inline]
    #[must_use]
    pub fn with_error_status(mut self, status: u16) -> Self {
        self.error_status = status;
        self
    }

    /// Status for a response
    ///
    /// # Errors
    /// Returns error if the payload type is not registered
    pub fn status_for(&self, response: &Response) -> Result<u16, AdapterError> {
        match response {
            Response::Payload(payload) => self
                .payloads
                .get(payload.type_key())
                .copied()
                .ok_or_else(|| AdapterError::StatusCodeNotMapped(payload.type_key().to_owned())),
            Response::Error(capsule) => Ok(capsule.status.unwrap_or(self.error_status)),
        }
    }
}

impl Default for StatusCodeMapping {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one route's pipeline for API requests
#[derive(Debug, Clone)]
pub struct RequestHandler {
    route_key: String,
    composer: Arc<SequenceComposer>,
    runner: PipelineRunner,
    codec: CaseConvertingCodec,
}

impl RequestHandler {
    /// Create handler for a route
    #[must_use]
    pub fn new(
        route_key: impl Into<String>,
        composer: Arc<SequenceComposer>,
        runner: PipelineRunner,
    ) -> Self {
        Self {
            route_key: route_key.into(),
            composer,
            runner,
            codec: CaseConvertingCodec::new(),
        }
    }

    /// Route served by this handler
    #[inline]
    #[must_use]
    pub fn route_key(&self) -> &str {
        &self.route_key
    }

    /// Build the run's context from `request` and run the pipeline
    ///
    /// Path, query and claim values become variables, later sources
    /// overriding earlier ones. The body is decoded as JSON with snake_case
    /// keys, or kept as a string when it is not JSON.
    ///
    /// # Errors
    /// Returns error if the pipeline faults or escalates
    pub fn handle(&self, request: &ApiRequest) -> Result<Context, PipelineError> {
        let mut variables = Variables::new();
        for (key, value) in request
            .path_parameters
            .iter()
            .chain(request.query_string_parameters.iter())
            .flatten()
        {
            variables.insert(key.as_str(), value.clone());
        }

        let mut principal = None;
        if let Some(claims) = request.claims() {
            for (key, value) in claims {
                match value {
                    Value::String(text) => variables.insert(key.as_str(), text.clone()),
                    other => variables.insert(key.as_str(), other.clone()),
                }
            }
            principal = claims.get("username").and_then(Value::as_str);
        }
        debug!(variables = ?variables, principal, "request variables");

        let body = match request.body.as_deref() {
            Some(text) => self.codec.deserialize(text).unwrap_or_else(|err| {
                debug!(error = %err, "body is not json, keeping raw text");
                Value::String(text.to_owned())
            }),
            None => Value::Null,
        };

        let mut context = Context::new(body)
            .with_variables(variables)
            .with_error_handling(ErrorHandlingSelector::respond());
        if let Some(principal) = principal {
            context = context.with_auth_principal(principal);
        }

        self.runner.run(&mut context, &self.composer)?;
        Ok(context)
    }
}

/// Routes API requests to their handlers and encodes the outcome
#[derive(Debug, Clone)]
pub struct WebRunner {
    handlers: Vec<RequestHandler>,
    status_codes: StatusCodeMapping,
    codec: CaseConvertingCodec,
    config: WebConfig,
}

impl WebRunner {
    /// Create runner
    #[must_use]
    pub fn new(handlers: Vec<RequestHandler>, status_codes: StatusCodeMapping) -> Self {
        Self {
            handlers,
            status_codes,
            codec: CaseConvertingCodec::new(),
            config: WebConfig::default(),
        }
    }

    /// With response settings
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: WebConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle one request
    ///
    /// Never fails: unknown routes become not-found responses and every
    /// error is logged and answered with an internal-error response.
    #[must_use]
    pub fn run(&self, request: &ApiRequest) -> ApiResponse {
        let span = info_span!("request", route_key = %request.route_key);
        let _enter = span.enter();

        self.try_run(request).unwrap_or_else(|err| {
            error!(error = %err, "request failed");
            self.response(
                self.config.internal_error_status,
                Some(INTERNAL_ERROR_BODY.to_owned()),
            )
        })
    }

    fn try_run(&self, request: &ApiRequest) -> Result<ApiResponse, AdapterError> {
        let Some(handler) = self
            .handlers
            .iter()
            .find(|h| h.route_key == request.route_key)
        else {
            let body = json!({ "message": format!("route {} not found", request.route_key) });
            return Ok(self.response(
                self.config.not_found_status,
                Some(self.codec.serialize(&body)?),
            ));
        };

        let context = handler.handle(request)?;
        let Some(response) = &context.response else {
            return Ok(self.response(self.config.empty_status, None));
        };

        let status = self.status_codes.status_for(response)?;
        let body = match response {
            Response::Payload(payload) => {
                Value::Object(payload.to_untyped(self.config.preserve_decimal_as_string)?)
            }
            Response::Error(capsule) => serde_json::to_value(capsule).map_err(CodecError::from)?,
        };
        Ok(self.response(status, Some(self.codec.serialize(&body)?)))
    }

    fn response(&self, status_code: u16, body: Option<String>) -> ApiResponse {
        let headers = BTreeMap::from([("Content-Type".to_owned(), self.config.content_type.clone())]);
        ApiResponse {
            status_code,
            headers,
            body,
        }
    }
}
