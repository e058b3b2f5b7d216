use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::modules::auth::model::Claims;
use crate::modules::users::model::{User, UserRole};
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::jwt::verify_access_token;

/// Extractor that validates the bearer token and yields the access claims.
///
/// Accepts access tokens only; refresh tokens are rejected even though they
/// are signed with the same secret.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.0.sub)
            .map_err(|_| AppError::unauthorized(anyhow::anyhow!("Invalid user ID in token")))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::unauthorized(anyhow::anyhow!("Missing authorization header"))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::unauthorized(anyhow::anyhow!("Invalid authorization header format"))
        })?;

        let claims = verify_access_token(token, &state.jwt_config)?;

        Ok(AuthUser(claims))
    }
}

/// Extractor that resolves the token to a live user row.
///
/// A valid token whose user has since been deleted is rejected here, not in
/// the handler.
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_user = AuthUser::from_request_parts(parts, state).await?;
        let user_id = auth_user.user_id()?;

        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, username, password_hash, role, is_verified,
                    verification_code, verification_code_expires, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::unauthorized(anyhow::anyhow!("User no longer exists")))?;

        Ok(RequireUser(user))
    }
}

/// Extractor for content-management routes. Any non-admin gets a 403.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;

        if user.role != UserRole::Admin {
            return Err(AppError::forbidden(anyhow::anyhow!(
                "Administrator privileges required"
            )));
        }

        Ok(RequireAdmin(user))
    }
}
