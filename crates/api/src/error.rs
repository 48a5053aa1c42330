use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use weave_core::error::CoreError;
use weave_orchestrator::StepError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`StepError`] for lifecycle steps and [`CoreError`] for
/// read paths, and implements [`IntoResponse`] to produce the
/// `{ "status": "failed", ... }` error envelope. Step errors carry the
/// offending step name so clients can correlate with the integration's
/// `error_log`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A lifecycle step failed.
    #[error(transparent)]
    Step(#[from] StepError),

    /// A domain-level error outside a step (read paths).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, step) = match &self {
            AppError::Step(err) => {
                let status = status_for_core(&err.source);
                (status, core_message(&err.source), Some(err.step.as_str()))
            }
            AppError::Core(core) => (status_for_core(core), core_message(core), None),
            AppError::Database(err) => (classify_sqlx_error(err), sanitized_db_message(), None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
        };

        let mut body = json!({
            "status": "failed",
            "error": message,
            "http_status": status.as_u16(),
        });
        if let Some(step) = step {
            body["step"] = json!(step);
        }

        (status, axum::Json(body)).into_response()
    }
}

/// HTTP status for a domain error.
///
/// - Out-of-order steps, in-flight conflicts, and lost guarded updates
///   are conflicts (409).
/// - Fetch/parse/schema problems are the caller's input being
///   unusable (400), as are validation failures.
/// - Timeouts map to 504; driver and internal failures to 500.
fn status_for_core(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Precondition(_) => StatusCode::CONFLICT,
        CoreError::Fetch(_)
        | CoreError::Parse(_)
        | CoreError::UnsupportedSchema(_)
        | CoreError::IncompatibleSchema(_) => StatusCode::BAD_REQUEST,
        CoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CoreError::Build(_)
        | CoreError::Launch(_)
        | CoreError::QuotaExceeded(_)
        | CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn core_message(err: &CoreError) -> String {
    match err {
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            "An internal error occurred".to_string()
        }
        other => other.to_string(),
    }
}

fn sanitized_db_message() -> String {
    "An internal error occurred".to_string()
}

/// Classify a sqlx error into an HTTP status.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with
///   `uq_`) map to 409.
/// - Everything else maps to 500.
fn classify_sqlx_error(err: &sqlx::Error) -> StatusCode {
    match err {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505")
                && db_err.constraint().is_some_and(|c| c.starts_with("uq_"))
            {
                return StatusCode::CONFLICT;
            }
            tracing::error!(error = %db_err, "Database error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        other => {
            tracing::error!(error = %other, "Database error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_is_conflict() {
        assert_eq!(
            status_for_core(&CoreError::Precondition("busy".into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn fetch_and_parse_are_bad_request() {
        assert_eq!(
            status_for_core(&CoreError::Fetch("unreachable".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for_core(&CoreError::Parse("not json".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_message_is_sanitized() {
        assert_eq!(
            core_message(&CoreError::Internal("pool exhausted at 10.0.0.3".into())),
            "An internal error occurred"
        );
    }
}
