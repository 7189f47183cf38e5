//! Error types for pipeline operations.
//!
//! The taxonomy mirrors how failures are handled by the capture and overlay
//! flows: transport and service failures are absorbed by the overlay fetcher
//! and the classification client, validation and permission failures are
//! surfaced to the user, and submission failures keep the draft for retry.

use std::fmt;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Structured context for pipeline errors.
///
/// Records which operation failed and against which endpoint, so absorbed
/// failures still produce a useful diagnostic line.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "fetch_risk_points", "classify")
    pub operation: Option<String>,
    /// The endpoint URL involved, if any
    pub endpoint: Option<String>,
    /// HTTP status code returned by the service, if any
    pub status: Option<u16>,
    /// Additional details about the error
    pub details: Option<String>,
    /// Whether repeating the same request may succeed
    pub retryable: bool,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Mark this error as retryable.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref endpoint) = self.endpoint {
            parts.push(format!("endpoint={}", endpoint));
        }
        if let Some(status) = self.status {
            parts.push(format!("status={}", status));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Coarse classification of a [`PipelineError`], used by callers that only
/// need to branch on the failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Service,
    Validation,
    Permission,
    Configuration,
}

/// Error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Network unreachable, connection reset, or timeout.
    #[error("Transport error: {message} {context}")]
    TransportError {
        message: String,
        context: ErrorContext,
    },

    /// Non-2xx status or a payload that does not match the contract.
    #[error("Service error: {message} {context}")]
    ServiceError {
        message: String,
        context: ErrorContext,
    },

    /// Submission attempted on an incomplete draft, or out-of-range input.
    #[error("Validation error: {message} {context}")]
    ValidationError {
        message: String,
        context: ErrorContext,
    },

    /// Geolocation denied by the user or the platform.
    #[error("Permission error: {message} {context}")]
    PermissionError {
        message: String,
        context: ErrorContext,
    },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {message} {context}")]
    ConfigurationError {
        message: String,
        context: ErrorContext,
    },
}

impl PipelineError {
    /// Create a transport error. Transport errors are retryable.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportError {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    /// Create a transport error with context.
    pub fn transport_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::TransportError {
            message: message.into(),
            context: context.retryable(),
        }
    }

    /// Create a service error.
    pub fn service(message: impl Into<String>) -> Self {
        Self::ServiceError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a service error with context.
    pub fn service_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ServiceError {
            message: message.into(),
            context,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a validation error with context.
    pub fn validation_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ValidationError {
            message: message.into(),
            context,
        }
    }

    /// Create a permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::PermissionError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a timeout error for an operation bounded by `timeout_ms`.
    pub fn timeout(operation: &str, timeout_ms: u64) -> Self {
        Self::transport_with_context(
            format!("{} timed out after {} ms", operation, timeout_ms),
            ErrorContext::new(operation),
        )
    }

    /// Failure family of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransportError { .. } => ErrorKind::Transport,
            Self::ServiceError { .. } => ErrorKind::Service,
            Self::ValidationError { .. } => ErrorKind::Validation,
            Self::PermissionError { .. } => ErrorKind::Permission,
            Self::ConfigurationError { .. } => ErrorKind::Configuration,
        }
    }

    /// Message without the context suffix, suitable for showing to a user.
    pub fn message(&self) -> &str {
        match self {
            Self::TransportError { message, .. }
            | Self::ServiceError { message, .. }
            | Self::ValidationError { message, .. }
            | Self::PermissionError { message, .. }
            | Self::ConfigurationError { message, .. } => message,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransportError { context, .. } => context.retryable,
            Self::ServiceError { context, .. } => context.retryable,
            _ => false,
        }
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::TransportError { context, .. }
            | Self::ServiceError { context, .. }
            | Self::ValidationError { context, .. }
            | Self::PermissionError { context, .. }
            | Self::ConfigurationError { context, .. } => context,
        }
    }

    /// Add or update the operation in the error context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        match &mut self {
            Self::TransportError { context, .. }
            | Self::ServiceError { context, .. }
            | Self::ValidationError { context, .. }
            | Self::PermissionError { context, .. }
            | Self::ConfigurationError { context, .. } => {
                context.operation = Some(operation.into());
            }
        }
        self
    }

    /// Map a reqwest error onto the taxonomy.
    ///
    /// Connection, timeout and request-building failures are transport errors;
    /// status and body decoding failures are service errors.
    pub fn from_reqwest(err: reqwest::Error, operation: &str) -> Self {
        let mut context = ErrorContext::new(operation);
        if let Some(url) = err.url() {
            context = context.with_endpoint(url.as_str());
        }
        if let Some(status) = err.status() {
            context = context.with_status(status.as_u16());
        }

        if err.is_decode() || err.is_status() {
            Self::service_with_context(err.to_string(), context)
        } else {
            Self::transport_with_context(err.to_string(), context)
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::service(format!("Malformed payload: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display_lists_fields_in_order() {
        let ctx = ErrorContext::new("classify")
            .with_endpoint("http://localhost:8000/predict_animal")
            .with_status(502)
            .with_details("bad gateway");
        assert_eq!(
            ctx.to_string(),
            "[operation=classify, endpoint=http://localhost:8000/predict_animal, status=502, details=bad gateway]"
        );
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(PipelineError::transport("connection refused").is_retryable());
        assert!(PipelineError::timeout("fetch_risk_points", 10).is_retryable());
        assert!(!PipelineError::validation("missing location").is_retryable());
        assert!(!PipelineError::service("HTTP 500").is_retryable());
    }

    #[test]
    fn test_kind_and_message() {
        let err = PipelineError::permission("location unavailable, request denied");
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(err.message(), "location unavailable, request denied");
        assert!(err.to_string().starts_with("Permission error:"));
    }

    #[test]
    fn test_with_operation_overrides_context() {
        let err = PipelineError::service("HTTP 503").with_operation("submit_report");
        assert_eq!(err.context().operation.as_deref(), Some("submit_report"));
    }

    #[test]
    fn test_serde_error_maps_to_service_error() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: PipelineError = parse.unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Service);
    }
}
