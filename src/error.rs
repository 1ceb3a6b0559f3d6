//! Error handling for the Shavi admission and authorization core.
//!
//! The gate taxonomy is deliberately small:
//! - `RateLimitExceeded` is an expected outcome, surfaced as HTTP 429 and
//!   never logged as an application error
//! - `Unauthenticated` means no session could be resolved; recoverable by
//!   redirecting to login
//! - `Forbidden` means the session's role is not in the operation's
//!   allow-list; not recoverable without a role change
//!
//! The remaining variants cover ambient concerns (payload validation,
//! configuration, internal faults). Denials fail fast: nothing here retries
//! or repairs on the caller's behalf, and no error is fatal to the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimitExceeded,
    Unauthenticated,
    Forbidden,
    ValidationError,
    ConfigurationError,
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ConfigurationError | Self::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error category for metrics grouping.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded => "admission",
            Self::Unauthenticated | Self::Forbidden => "authorization",
            Self::ValidationError => "validation",
            Self::ConfigurationError => "configuration",
            Self::InternalError => "internal",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for the admission/authorization core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The client exceeded its request budget for the current window.
    /// Expected, recoverable by waiting; never an application fault.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// No valid session could be resolved for the caller.
    #[error("Authentication required for operation '{operation}'")]
    Unauthenticated { operation: String },

    /// The caller is authenticated but its role is not permitted.
    #[error("Role '{role}' is not permitted to perform '{operation}'")]
    Forbidden {
        operation: String,
        actor: String,
        role: String,
    },

    /// A payload failed normalization or validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for an unauthenticated-caller denial.
    pub fn unauthenticated(operation: impl Into<String>) -> Self {
        Self::Unauthenticated {
            operation: operation.into(),
        }
    }

    /// Shorthand for an insufficient-role denial.
    pub fn forbidden(
        operation: impl Into<String>,
        actor: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self::Forbidden {
            operation: operation.into(),
            actor: actor.into(),
            role: role.into(),
        }
    }

    /// Get the machine-readable code for this error.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::RateLimitExceeded => ErrorCode::RateLimitExceeded,
            Self::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Configuration(_) => ErrorCode::ConfigurationError,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code().http_status()
    }

    /// Log this error at the severity the audit policy prescribes.
    ///
    /// Unauthenticated callers are warnings (common, usually a stale session);
    /// forbidden callers are errors carrying actor identity for the audit
    /// trail. Rate-limit rejections are debug-only noise.
    pub fn log(&self) {
        match self {
            Self::RateLimitExceeded => {
                debug!("Request rejected by rate limiter");
            }
            Self::Unauthenticated { operation } => {
                warn!(operation = %operation, "Unauthenticated access attempt");
            }
            Self::Forbidden {
                operation,
                actor,
                role,
            } => {
                error!(
                    operation = %operation,
                    actor = %actor,
                    role = %role,
                    "Forbidden access attempt"
                );
            }
            Self::Validation(msg) => {
                debug!(reason = %msg, "Payload validation failed");
            }
            Self::Configuration(msg) => {
                error!(reason = %msg, "Configuration error");
            }
            Self::Internal(msg) => {
                error!(reason = %msg, "Internal error");
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "shavi_gate_denials_total",
            "code" => format!("{:?}", self.code()),
            "category" => self.code().category(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        self.log();
        self.record_metrics();

        // The 429 body is a fixed contract with the edge middleware's clients
        // and intentionally not the standard error envelope.
        if matches!(self, Self::RateLimitExceeded) {
            let body = serde_json::json!({
                "error": "Rate limit exceeded. Please try again later.",
            });
            return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        }

        let status = self.http_status();
        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "timestamp": chrono::Utc::now(),
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(error: config::ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Validation(error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(
            ErrorCode::RateLimitExceeded.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::Unauthenticated.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::Forbidden.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_denial_classifications_are_distinct() {
        let unauthenticated = CoreError::unauthenticated("assignTicket");
        let forbidden =
            CoreError::forbidden("assignTicket", "sam@shavi.academy", "customer_success");

        assert_eq!(unauthenticated.code(), ErrorCode::Unauthenticated);
        assert_eq!(forbidden.code(), ErrorCode::Forbidden);
        assert_ne!(unauthenticated.code(), forbidden.code());
    }

    #[test]
    fn test_forbidden_carries_audit_fields() {
        let err = CoreError::forbidden("generatePayroll", "pat@shavi.academy", "sales");
        let display = err.to_string();
        assert!(display.contains("sales"));
        assert!(display.contains("generatePayroll"));
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::RateLimitExceeded).unwrap();
        assert_eq!(json, "\"RATE_LIMIT_EXCEEDED\"");
    }
}
