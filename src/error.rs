//! Error taxonomy shared across the service.
//!
//! Every fallible boundary returns an [`AppError`] variant; each variant maps
//! 1:1 to one of the error kinds in the design spec and carries enough
//! context for logging without leaking filesystem paths or stderr tails to
//! clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("probe binary missing or failed startup validation: {0}")]
    ProbeMissing(String),

    #[error("probe failed: {0}")]
    ProbeFailed(String),

    #[error("probe output malformed: {0}")]
    ProbeOutputMalformed(String),

    #[error("external dependency unavailable: {0}")]
    ExternalDependencyUnavailable(String),

    #[error("cancelled")]
    Cancelled,

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("size exceeded: {0}")]
    SizeExceeded(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// Stable machine-readable kind string, surfaced to clients and used in logs.
impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::ProbeMissing(_) => "probe_missing",
            AppError::ProbeFailed(_) => "probe_failed",
            AppError::ProbeOutputMalformed(_) => "probe_output_malformed",
            AppError::ExternalDependencyUnavailable(_) => "external_dependency_unavailable",
            AppError::Cancelled => "cancelled",
            AppError::Timeout(_) => "timeout",
            AppError::SizeExceeded(_) => "size_exceeded",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ProbeMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ProbeFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ProbeOutputMalformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ExternalDependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Cancelled => StatusCode::CONFLICT,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::SizeExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message: never a filesystem path, stderr tail, or stack
    /// trace. Internal variants are fully redacted; the real cause is only
    /// ever logged.
    fn client_message(&self) -> String {
        match self {
            AppError::Internal(_) => "an internal error occurred".to_string(),
            AppError::ProbeFailed(_) => "the probe failed to analyze this media".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Internal(_)) {
            tracing::error!(error = %self, "internal error");
        }
        let status = self.status();
        let body = ErrorBody {
            error: self.client_message(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_message_is_redacted() {
        let err = AppError::Internal(anyhow::anyhow!("/etc/shadow leaked, stack: ..."));
        assert_eq!(err.client_message(), "an internal error occurred");
        assert_eq!(err.kind(), "internal");
    }

    #[test]
    fn validation_message_passes_through() {
        let err = AppError::Validation("bad field".to_string());
        assert_eq!(err.client_message(), "validation: bad field");
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::SizeExceeded("x".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(AppError::Cancelled.status(), StatusCode::CONFLICT);
    }
}
