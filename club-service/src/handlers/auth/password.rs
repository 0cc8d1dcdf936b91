use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{PasswordLoginRequest, RegisterRequest, TokenResponse},
        ErrorResponse,
    },
    models::AccountProfile,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Register with email and password
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AccountProfile),
        (status = 400, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .auth_service
        .register(req.name, &req.email, Password::new(req.password))
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/password-login",
    request_body = PasswordLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn password_login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .auth_service
        .login(&req.email, Password::new(req.password))
        .await?;
    Ok((StatusCode::OK, Json(TokenResponse::from(session))))
}
