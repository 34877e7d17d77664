use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the userpool-local service.
///
/// Every variant maps to a wire error name (`__type` in the response body)
/// and an HTTP status, matching what hosted-service SDK clients expect.
#[derive(Debug, thiserror::Error)]
pub enum CognitoError {
    // ── Resource errors ─────────────────────────────────────────────────
    #[error("{0}")]
    ResourceNotFound(String),

    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UsernameExists,

    // ── Auth errors ─────────────────────────────────────────────────────
    #[error("{0}")]
    NotAuthorized(String),

    #[error("Incorrect username or password")]
    InvalidPassword,

    #[error("Password reset required for the user")]
    PasswordResetRequired,

    #[error("Invalid code provided, please request a code again")]
    CodeMismatch,

    #[error("{0}")]
    InvalidParameter(String),

    // ── Trigger / lambda errors ─────────────────────────────────────────
    #[error("Unexpected error when invoking lambda: {0}")]
    UnexpectedLambdaException(String),

    #[error("Invalid lambda response: {0}")]
    InvalidLambdaResponse(String),

    #[error("{0}")]
    UserLambdaValidation(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("{0} is not yet supported")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CognitoError {
    /// Wire error name used as the `__type` field of the error body.
    pub fn error_type(&self) -> &'static str {
        match self {
            CognitoError::ResourceNotFound(_) => "ResourceNotFoundError",
            CognitoError::UserNotFound => "UserNotFoundError",
            CognitoError::UsernameExists => "UsernameExistsError",
            CognitoError::NotAuthorized(_) => "NotAuthorizedError",
            CognitoError::InvalidPassword => "InvalidPasswordError",
            CognitoError::PasswordResetRequired => "PasswordResetRequiredError",
            CognitoError::CodeMismatch => "CodeMismatchError",
            CognitoError::InvalidParameter(_) => "InvalidParameterError",
            CognitoError::UnexpectedLambdaException(_) => "UnexpectedLambdaExceptionError",
            CognitoError::InvalidLambdaResponse(_) => "InvalidLambdaResponseError",
            CognitoError::UserLambdaValidation(_) => "UserLambdaValidationError",
            CognitoError::Unsupported(_) => "UnsupportedError",
            CognitoError::Internal(_) => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CognitoError::Unsupported(_)
            | CognitoError::UnexpectedLambdaException(_)
            | CognitoError::InvalidLambdaResponse(_)
            | CognitoError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<std::io::Error> for CognitoError {
    fn from(e: std::io::Error) -> Self {
        tracing::error!("I/O error: {e}");
        CognitoError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for CognitoError {
    fn from(e: serde_json::Error) -> Self {
        CognitoError::Internal(format!("serialization error: {e}"))
    }
}

impl IntoResponse for CognitoError {
    fn into_response(self) -> Response {
        let body = json!({
            "__type": self.error_type(),
            "message": self.to_string(),
        });

        (self.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_statuses() {
        assert_eq!(
            CognitoError::ResourceNotFound("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CognitoError::UserLambdaValidation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CognitoError::Unsupported("X".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            CognitoError::InvalidLambdaResponse("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn wire_names() {
        assert_eq!(CognitoError::CodeMismatch.error_type(), "CodeMismatchError");
        assert_eq!(
            CognitoError::UsernameExists.error_type(),
            "UsernameExistsError"
        );
    }
}
