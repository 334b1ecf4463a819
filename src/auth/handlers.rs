use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, PublicUser, RegisterRequest,
            RegisterResponse, VerifyCodeRequest,
        },
        jwt::AuthUser,
    },
    error::{AuthError, FieldViolation},
    state::AppState,
};

/// Reported when the register body is not JSON or a field has the wrong type.
const MALFORMED_REGISTRATION: FieldViolation = FieldViolation {
    field: "body",
    message: "Request body must be JSON with string email and password",
};

/// Unwraps the JSON body, turning any rejection into the endpoint's own
/// 400 response instead of axum's default plain-text one.
fn body_or<T>(
    payload: Result<Json<T>, JsonRejection>,
    on_reject: impl FnOnce() -> AuthError,
) -> Result<T, AuthError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!(error = %rejection, "malformed request body");
            Err(on_reject())
        }
    }
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-code", post(verify_code))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let payload = body_or(payload, || AuthError::Validation(vec![MALFORMED_REGISTRATION]))?;
    let user_id = state.auth.register(&payload.email, &payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully. Please check your email to verify.",
            user_id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let payload = body_or(payload, || AuthError::InvalidCredentials)?;
    let token = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(LoginResponse {
        message: "Login successful",
        token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_code(
    State(state): State<AppState>,
    payload: Result<Json<VerifyCodeRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let payload = body_or(payload, || AuthError::InvalidCode)?;
    state.auth.verify_code(&payload.email, &payload.code).await?;
    Ok(Json(MessageResponse {
        message: "Email verified successfully",
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = match state.auth.user(user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return Err((StatusCode::UNAUTHORIZED, "User not found".into()));
        }
        Err(e) => {
            error!(error = %e, user_id = %user_id, "user lookup failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Server error".into()));
        }
    };

    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
    }))
}
