// error.rs — HTTP error mapping.
//
// Every failure leaves the daemon as a JSON `{code, message}` body with a
// status derived from the engine error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sov_engine::EngineError;
use sov_policy::PolicyError;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A path or query parameter could not be parsed.
    #[error("bad parameter '{name}': {reason}")]
    BadParameter { name: &'static str, reason: String },

    /// `/admin/reload` was called on a daemon started without a policy file.
    #[error("no policy file configured; start the daemon with --policies")]
    ReloadUnavailable,

    /// A blocking engine task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn bad_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        ApiError::BadParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                EngineError::CheckNotFound(_) => StatusCode::NOT_FOUND,
                EngineError::AlreadyResolved { .. } => StatusCode::CONFLICT,
                EngineError::Configuration(PolicyError::LockPoisoned(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                EngineError::Configuration(_) => StatusCode::CONFLICT,
                EngineError::AuditBacklogFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
                EngineError::Audit(_)
                | EngineError::ConfigRead { .. }
                | EngineError::ConfigParse(_)
                | EngineError::LockPoisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadParameter { .. } | ApiError::ReloadUnavailable => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::InvalidRequest(_) => "INVALID_REQUEST",
                EngineError::CheckNotFound(_) => "CHECK_NOT_FOUND",
                EngineError::AlreadyResolved { .. } => "ALREADY_RESOLVED",
                EngineError::Configuration(PolicyError::LockPoisoned(_)) => "INTERNAL_ERROR",
                EngineError::Configuration(_) => "CONFIGURATION_ERROR",
                EngineError::Audit(_) => "AUDIT_ERROR",
                EngineError::AuditBacklogFull { .. } => "AUDIT_BACKLOG_FULL",
                EngineError::ConfigRead { .. } | EngineError::ConfigParse(_) => "ENGINE_CONFIG_ERROR",
                EngineError::LockPoisoned(_) => "INTERNAL_ERROR",
            },
            ApiError::BadParameter { .. } => "BAD_PARAMETER",
            ApiError::ReloadUnavailable => "RELOAD_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            code: self.error_code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sov_policy::{SectorMode, Verdict};
    use uuid::Uuid;

    #[test]
    fn engine_errors_map_to_statuses() {
        let cases = [
            (
                ApiError::from(EngineError::InvalidRequest("x".into())),
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST",
            ),
            (
                ApiError::from(EngineError::CheckNotFound(Uuid::nil())),
                StatusCode::NOT_FOUND,
                "CHECK_NOT_FOUND",
            ),
            (
                ApiError::from(EngineError::AlreadyResolved {
                    check_id: Uuid::nil(),
                    verdict: Verdict::Denied,
                }),
                StatusCode::CONFLICT,
                "ALREADY_RESOLVED",
            ),
            (
                ApiError::from(EngineError::Configuration(PolicyError::DuplicateSectorMode(
                    SectorMode::Military,
                ))),
                StatusCode::CONFLICT,
                "CONFIGURATION_ERROR",
            ),
            (
                ApiError::from(EngineError::Audit(sov_audit::AuditError::Unavailable(
                    "down".into(),
                ))),
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUDIT_ERROR",
            ),
            (
                ApiError::from(EngineError::Configuration(PolicyError::LockPoisoned(
                    "history".into(),
                ))),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
            (
                ApiError::from(EngineError::AuditBacklogFull { limit: 10 }),
                StatusCode::SERVICE_UNAVAILABLE,
                "AUDIT_BACKLOG_FULL",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.error_code(), code);
        }
    }

    #[test]
    fn engine_message_is_not_double_prefixed() {
        let err = ApiError::from(EngineError::InvalidRequest("operation is required".into()));
        assert_eq!(err.to_string(), "invalid request: operation is required");
    }

    #[test]
    fn reload_without_file_is_bad_request() {
        assert_eq!(
            ApiError::ReloadUnavailable.status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
