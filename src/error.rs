//! Error types for the dbt Cloud credential provider.

use thiserror::Error;

use crate::id::IdError;
use crate::schema::Diagnostic;

/// Prefix carried by every not-found error message.
///
/// The dbt Cloud API answers missing objects with a 404; callers that only
/// see the rendered message can still recognise the condition by this prefix.
pub const NOT_FOUND_PREFIX: &str = "resource-not-found";

/// Errors that can occur while serving a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested remote object does not exist (HTTP 404).
    #[error("resource-not-found: {0}")]
    NotFound(String),

    /// The configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A composite identifier could not be decoded.
    #[error(transparent)]
    InvalidId(#[from] IdError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered successfully but the payload is unusable.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// The API answered with a non-success status.
    #[error("{status}-{body}")]
    Api {
        /// HTTP status code returned by the API.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// A failed operation, titled for the user.
    #[error("{summary}: {source}")]
    Operation {
        /// Short title shown as the diagnostic summary.
        summary: String,
        /// The underlying failure.
        #[source]
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Attach a user-facing title to this error.
    pub fn context(self, summary: impl Into<String>) -> Self {
        Self::Operation {
            summary: summary.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error (or the error it wraps) is a 404 from the API.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Operation { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether the request that produced this error may be sent again.
    ///
    /// Connection failures and timeouts are always retried; API statuses only
    /// when listed in `retriable_status_codes`.
    pub fn is_retryable(&self, retriable_status_codes: &[u16]) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            Self::Api { status, .. } => retriable_status_codes.contains(status),
            _ => false,
        }
    }

    /// Get the error message without its diagnostic title.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::InvalidResponse(msg) => msg.clone(),
            Self::Operation { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }

    /// Render this error as a host diagnostic with a short title and a detail.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let summary = match self {
            Self::Operation { summary, .. } => summary.as_str(),
            Self::NotFound(_) => "Resource not found",
            Self::Validation(_) => "Invalid configuration",
            Self::Configuration(_) => "Provider not configured",
            Self::UnknownResource(_) => "Unknown resource type",
            Self::InvalidId(_) => "Invalid ID format",
            Self::Serialization(_) => "Unable to decode data",
            Self::Transport(_) => "Unable to reach the dbt Cloud API",
            Self::Api { .. } | Self::InvalidResponse(_) => "Unexpected dbt Cloud API response",
        };
        Diagnostic::error(summary).with_detail(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("credential 222".to_string());
        assert_eq!(format!("{}", err), "resource-not-found: credential 222");
        assert!(err.to_string().starts_with(NOT_FOUND_PREFIX));

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::Api {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(format!("{}", err), "500-boom");
    }

    #[test]
    fn test_not_found_through_context() {
        let err = ProviderError::NotFound("gone".to_string())
            .context("Error reading Apache Spark credential");
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Error reading Apache Spark credential: resource-not-found: gone"
        );

        let err = ProviderError::Validation("nope".to_string()).context("Error");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_retryable_statuses() {
        let codes = [429, 503];
        let err = ProviderError::Api {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_retryable(&codes));

        let err = ProviderError::Api {
            status: 400,
            body: String::new(),
        };
        assert!(!err.is_retryable(&codes));
        assert!(!ProviderError::NotFound("x".to_string()).is_retryable(&codes));
    }

    #[test]
    fn test_to_diagnostic() {
        let diag = ProviderError::NotFound("credential 222".to_string())
            .context("Error deleting Apache Spark credential")
            .to_diagnostic();
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Error deleting Apache Spark credential");
        assert_eq!(
            diag.detail.as_deref(),
            Some("resource-not-found: credential 222")
        );

        let diag = ProviderError::Configuration("missing token".to_string()).to_diagnostic();
        assert_eq!(diag.summary, "Provider not configured");
        assert_eq!(diag.detail.as_deref(), Some("missing token"));
    }
}
