use axum::http::StatusCode;
use axum::response::IntoResponse;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid data: {reason} (content: {content})")]
    Validation { reason: String, content: String },
    #[error("Timed out after {waited_secs}s waiting for {pattern} in bucket {bucket}")]
    Timeout {
        bucket: String,
        pattern: String,
        waited_secs: u64,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("External error: {0}")]
    External(String),
}

impl AppError {
    pub fn validation(reason: impl Into<String>, content: impl Into<String>) -> Self {
        AppError::Validation {
            reason: reason.into(),
            content: content.into(),
        }
    }

    /// Whether the job runner should re-run the failed task.
    ///
    /// Sensor timeouts end the run; everything raised while talking to the
    /// store, the database or the payload itself gets the configured retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Timeout { .. } | AppError::Config(_) | AppError::Conflict(_) => false,
            AppError::NotFound => false,
            AppError::Db(_)
            | AppError::Storage(_)
            | AppError::Parse(_)
            | AppError::Validation { .. }
            | AppError::External(_) => true,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            AppError::Validation { reason, .. } => (StatusCode::BAD_REQUEST, reason).into_response(),
            AppError::Config(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, self.to_string()).into_response(),
            AppError::Storage(_) | AppError::External(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string()).into_response()
            }
            AppError::Db(_) | AppError::Parse(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_terminal() {
        let err = AppError::Timeout {
            bucket: "raw-data".into(),
            pattern: "*.json".into(),
            waited_secs: 64800,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_validation_is_retried_and_keeps_content() {
        let err = AppError::validation("missing bid", r#"{"USDBRL":{}}"#);
        assert!(err.is_retryable());
        assert!(err.to_string().contains(r#"{"USDBRL":{}}"#));
    }

    #[test]
    fn test_parse_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: AppError = parse.into();
        assert!(matches!(err, AppError::Parse(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
