//! Domain errors and their HTTP mapping.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: &'static str,
}

/// Failures reported by the user and verification-code stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed: {0:?}")]
    Validation(Vec<FieldViolation>),
    #[error("Email already in use")]
    DuplicateEmail,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("Verification code has expired")]
    ExpiredCode,
    #[error("storage error: {0}")]
    Storage(StoreError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            other => AuthError::Storage(other),
        }
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Storage(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct ValidationBody<'a> {
    errors: &'a [FieldViolation],
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AuthError::Validation(violations) => {
                (status, Json(ValidationBody { errors: violations })).into_response()
            }
            AuthError::Storage(_) | AuthError::Internal(_) => {
                error!(error = %self, "request failed");
                (status, Json(MessageBody { message: "Server error" })).into_response()
            }
            other => {
                let message = other.to_string();
                (status, Json(MessageBody { message: &message })).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AuthError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[test]
    fn duplicate_store_error_becomes_duplicate_email() {
        let err: AuthError = StoreError::DuplicateEmail.into();
        assert!(matches!(err, AuthError::DuplicateEmail));

        let err: AuthError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, AuthError::Storage(_)));
    }

    #[test]
    fn client_errors_map_to_bad_request() {
        for err in [
            AuthError::DuplicateEmail,
            AuthError::InvalidCredentials,
            AuthError::InvalidCode,
            AuthError::ExpiredCode,
            AuthError::Validation(vec![]),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(
            AuthError::Storage(StoreError::Unavailable("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn server_errors_are_opaque() {
        let (status, body) =
            body_json(AuthError::Storage(StoreError::Unavailable("pool timed out".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Server error");
        assert!(!body.to_string().contains("pool timed out"));
    }

    #[tokio::test]
    async fn validation_lists_every_violation() {
        let (status, body) = body_json(AuthError::Validation(vec![
            FieldViolation {
                field: "email",
                message: "Please provide a valid email",
            },
            FieldViolation {
                field: "password",
                message: "Password must be at least 8 characters long",
            },
        ]))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let errors = body["errors"].as_array().expect("errors array");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["field"], "email");
        assert_eq!(errors[1]["field"], "password");
    }

    #[tokio::test]
    async fn expired_code_message() {
        let (_, body) = body_json(AuthError::ExpiredCode).await;
        assert_eq!(body["message"], "Verification code has expired");
    }
}
