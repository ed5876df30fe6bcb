//! Core error types for A2E.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use a2e_core::OperationId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a failure, as surfaced to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or invalid credentials on an inbound request.
    Authentication,
    /// An allow-list denied access to a resource.
    Authorization,
    /// The workflow failed the validator or an input-shape check.
    Validation,
    /// Connection errors, timeouts, DNS failures.
    Network,
    /// An HTTP response indicated failure.
    ApiError,
    /// An expected data-model path was missing or had the wrong shape.
    DataError,
    /// A handler failed with a non-retryable, non-validation error.
    Execution,
    /// The rate limiter refused the request.
    RateLimited,
    /// Anything else.
    Unknown,
}

impl ErrorCategory {
    /// Stable wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::ApiError => "api_error",
            Self::DataError => "data_error",
            Self::Execution => "execution",
            Self::RateLimited => "rate_limited",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Specific error kinds, with per-category payloads.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("Authorization failed: access to {resource} denied")]
    Authorization { resource: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Api { status: Option<u16>, message: String },

    #[error("Data error{}: {message}", .path.as_deref().map(|p| format!(" at {p}")).unwrap_or_default())]
    Data { path: Option<String>, message: String },

    #[error("Execution error: {message}")]
    Execution { message: String },

    #[error("Rate limit exceeded: {limit} per {window}")]
    RateLimited { window: String, limit: u32 },

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl ErrorKind {
    /// The category this kind belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Api { .. } => ErrorCategory::ApiError,
            Self::Data { .. } => ErrorCategory::DataError,
            Self::Execution { .. } => ErrorCategory::Execution,
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::Unknown { .. } => ErrorCategory::Unknown,
        }
    }
}

/// Main error type for A2E.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub struct A2eError {
    /// The kind of error.
    pub kind: ErrorKind,
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Operation in which the error occurred, if any.
    pub operation_id: Option<OperationId>,
    /// Additional context entries; sanitized before leaving the service.
    pub context: BTreeMap<String, serde_json::Value>,
    /// Whether the retry handler may re-attempt the failed call.
    pub retryable: bool,
    /// Suggested minimum delay before re-attempting.
    pub retry_after: Option<Duration>,
}

impl A2eError {
    fn new(kind: ErrorKind, code: &str, message: String, retryable: bool) -> Self {
        Self {
            kind,
            code: code.to_string(),
            message,
            operation_id: None,
            context: BTreeMap::new(),
            retryable,
            retry_after: None,
        }
    }

    /// Missing or invalid inbound credentials.
    pub fn authentication(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            ErrorKind::Authentication {
                reason: reason.clone(),
            },
            "AUTHENTICATION_ERROR",
            format!("Authentication failed: {reason}"),
            false,
        )
    }

    /// An allow-list denied a resource.
    pub fn authorization(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::new(
            ErrorKind::Authorization {
                resource: resource.clone(),
            },
            "AUTHORIZATION_ERROR",
            format!("Access to '{resource}' denied"),
            false,
        )
    }

    /// A workflow or input failed validation.
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorKind::Validation {
                message: message.clone(),
            },
            "VALIDATION_ERROR",
            message,
            false,
        )
    }

    /// Connection failure, timeout, or DNS error. Retryable.
    pub fn network(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorKind::Network {
                message: message.clone(),
            },
            "NETWORK_ERROR",
            message,
            true,
        )
    }

    /// A remote API answered with a failure status. Server errors plus 408
    /// and 429 are retryable.
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let retryable = status >= 500 || status == 408 || status == 429;
        Self::new(
            ErrorKind::Api {
                status: Some(status),
                message: message.clone(),
            },
            "API_ERROR",
            format!("API returned {status}: {message}"),
            retryable,
        )
    }

    /// A data-model path was missing or carried the wrong shape.
    pub fn data(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorKind::Data {
                path: None,
                message: message.clone(),
            },
            "DATA_ERROR",
            message,
            false,
        )
    }

    /// Missing input at a specific data-model path.
    pub fn missing_input(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorKind::Data {
                path: Some(path.clone()),
                message: "no data found".to_string(),
            },
            "MISSING_INPUT",
            format!("No data found at path: {path}"),
            false,
        )
    }

    /// A requested entity does not exist.
    pub fn not_found(resource_type: impl Into<String>, resource_id: impl fmt::Display) -> Self {
        let resource_type = resource_type.into();
        let message = format!("{resource_type} '{resource_id}' not found");
        Self::new(
            ErrorKind::Data {
                path: None,
                message: message.clone(),
            },
            "NOT_FOUND",
            message,
            false,
        )
    }

    /// A handler failed in a non-retryable, non-validation way.
    pub fn execution(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorKind::Execution {
                message: message.clone(),
            },
            "EXECUTION_ERROR",
            message,
            false,
        )
    }

    /// The rate limiter refused the request.
    pub fn rate_limited(window: impl Into<String>, limit: u32, retry_after: Duration) -> Self {
        let window = window.into();
        let mut err = Self::new(
            ErrorKind::RateLimited {
                window: window.clone(),
                limit,
            },
            "RATE_LIMIT_ERROR",
            format!("Rate limit exceeded: {limit} per {window}"),
            true,
        );
        err.retry_after = Some(retry_after);
        err
    }

    /// Anything that does not fit a known category.
    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorKind::Unknown {
                message: message.clone(),
            },
            "UNKNOWN_ERROR",
            message,
            false,
        )
    }

    /// Stamp the operation in which the error occurred.
    pub fn with_operation(mut self, operation_id: OperationId) -> Self {
        self.operation_id = Some(operation_id);
        self
    }

    /// Attach a context entry.
    pub fn with_context_entry(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Override the suggested retry delay.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Mark the error retryable regardless of category defaults.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// HTTP status carried by an `ApiError`, if any.
    pub fn api_status(&self) -> Option<u16> {
        match self.kind {
            ErrorKind::Api { status, .. } => status,
            _ => None,
        }
    }

    /// Whether the agent can plausibly fix and resubmit.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::Validation
            | ErrorCategory::Network
            | ErrorCategory::DataError
            | ErrorCategory::RateLimited => true,
            ErrorCategory::ApiError => true,
            ErrorCategory::Authentication
            | ErrorCategory::Authorization
            | ErrorCategory::Execution
            | ErrorCategory::Unknown => false,
        }
    }

    /// Status code for the service's own HTTP surface.
    pub fn http_status(&self) -> u16 {
        if self.code == "NOT_FOUND" {
            return 404;
        }
        match self.category() {
            ErrorCategory::Authentication => 401,
            ErrorCategory::Authorization => 403,
            ErrorCategory::Validation => 400,
            ErrorCategory::RateLimited => 429,
            _ => 500,
        }
    }
}

impl fmt::Display for A2eError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;

        if let Some(ref op) = self.operation_id {
            write!(f, " (operation: {op})")?;
        }

        if self.retryable {
            write!(f, " [retryable]")?;
        }

        Ok(())
    }
}

/// Result type for A2E operations.
pub type Result<T> = std::result::Result<T, A2eError>;

impl From<serde_json::Error> for A2eError {
    fn from(err: serde_json::Error) -> Self {
        A2eError::validation(format!("JSON error: {err}"))
    }
}

impl From<std::io::Error> for A2eError {
    fn from(err: std::io::Error) -> Self {
        A2eError::execution(format!("I/O error: {err}"))
    }
}

impl From<a2e_core::id::IdParseError> for A2eError {
    fn from(err: a2e_core::id::IdParseError) -> Self {
        A2eError::validation(format!("Invalid identifier: {err}"))
    }
}
