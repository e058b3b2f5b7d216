use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use crate::middleware::auth::RequireAdmin;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::validator::ValidatedJson;

use super::model::{
    AuthResponse, CheckEmailResponse, EmailDto, LoginDto, MessageResponse, RefreshTokenDto,
    RegisterDto, ResetPasswordDto, VerifyEmailDto,
};
use super::service::AuthService;

#[derive(ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CheckEmailQuery {
    pub email: String,
}

/// Register a new user and send a verification code
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterDto,
    responses(
        (status = 201, description = "User registered, verification code emailed", body = AuthResponse),
        (status = 409, description = "Email or username already taken", body = ErrorResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 502, description = "Verification email could not be sent", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<RegisterDto>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = AuthService::register(
        &state.db,
        &state.email_service,
        &state.jwt_config,
        &state.auth_config,
        dto,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Verify an email address with the 6-digit code
#[utoipa::path(
    post,
    path = "/api/auth/verify-email",
    request_body = VerifyEmailDto,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Missing, expired, or wrong code", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<VerifyEmailDto>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = AuthService::verify_email(&state.db, dto).await?;
    Ok(Json(response))
}

/// Issue a fresh verification code
#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    request_body = EmailDto,
    responses(
        (status = 200, description = "New code sent (or already verified)", body = MessageResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 502, description = "Verification email could not be sent", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip_all)]
pub async fn resend_otp(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<EmailDto>,
) -> Result<Json<MessageResponse>, AppError> {
    let response =
        AuthService::resend_otp(&state.db, &state.email_service, &state.auth_config, dto).await?;
    Ok(Json(response))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginDto,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<LoginDto>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = AuthService::login(&state.db, &state.jwt_config, &state.auth_config, dto).await?;
    Ok(Json(response))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshTokenDto,
    responses(
        (status = 200, description = "New token pair issued", body = AuthResponse),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<RefreshTokenDto>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = AuthService::refresh(&state.db, &state.jwt_config, dto).await?;
    Ok(Json(response))
}

/// Request a password-reset code by email
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = EmailDto,
    responses(
        (status = 200, description = "Reset code sent", body = MessageResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 502, description = "Reset email could not be sent", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<EmailDto>,
) -> Result<Json<MessageResponse>, AppError> {
    let response =
        AuthService::forgot_password(&state.db, &state.email_service, &state.auth_config, dto)
            .await?;
    Ok(Json(response))
}

/// Set a new password using the emailed code
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordDto,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Missing, expired, or wrong code", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<ResetPasswordDto>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = AuthService::reset_password(&state.db, dto).await?;
    Ok(Json(response))
}

/// Check whether an email is registered and verified
#[utoipa::path(
    get,
    path = "/api/auth/check-email",
    params(CheckEmailQuery),
    responses(
        (status = 200, description = "Existence and verification state", body = CheckEmailResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip(state))]
pub async fn check_email(
    State(state): State<AppState>,
    Query(query): Query<CheckEmailQuery>,
) -> Result<Json<CheckEmailResponse>, AppError> {
    let response = AuthService::check_email(&state.db, &query.email).await?;
    Ok(Json(response))
}

/// Delete a user account by email (admin only)
#[utoipa::path(
    delete,
    path = "/api/auth/account",
    request_body = EmailDto,
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
#[instrument(skip(state, _admin))]
pub async fn delete_account(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    ValidatedJson(dto): ValidatedJson<EmailDto>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = AuthService::delete_user(&state.db, &dto.email).await?;
    Ok(Json(response))
}
