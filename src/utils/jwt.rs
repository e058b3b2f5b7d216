use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::config::jwt::JwtConfig;
use crate::modules::auth::model::{Claims, TokenPair};
use crate::modules::users::model::UserRole;
use crate::utils::errors::AppError;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

fn create_token(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    token_type: &str,
    expiry_secs: i64,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role,
        token_type: token_type.to_string(),
        exp: now + expiry_secs as usize,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_config.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(anyhow::anyhow!("Failed to create token: {}", e)))
}

pub fn create_access_token(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    create_token(
        user_id,
        email,
        role,
        TOKEN_TYPE_ACCESS,
        jwt_config.access_token_expiry,
        jwt_config,
    )
}

pub fn create_refresh_token(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    create_token(
        user_id,
        email,
        role,
        TOKEN_TYPE_REFRESH,
        jwt_config.refresh_token_expiry,
        jwt_config,
    )
}

/// Issue the access/refresh pair bound to a user.
pub fn create_token_pair(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    jwt_config: &JwtConfig,
) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access_token: create_access_token(user_id, email, role, jwt_config)?,
        refresh_token: create_refresh_token(user_id, email, role, jwt_config)?,
    })
}

fn verify_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized(anyhow::anyhow!("Invalid or expired token")))
}

/// Verify a bearer token presented for API access. Refresh tokens are
/// rejected here so they cannot authenticate requests.
pub fn verify_access_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, AppError> {
    let claims = verify_token(token, jwt_config)?;
    if claims.token_type != TOKEN_TYPE_ACCESS {
        return Err(AppError::unauthorized(anyhow::anyhow!(
            "Invalid or expired token"
        )));
    }
    Ok(claims)
}

pub fn verify_refresh_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, AppError> {
    let claims = verify_token(token, jwt_config)?;
    if claims.token_type != TOKEN_TYPE_REFRESH {
        return Err(AppError::unauthorized(anyhow::anyhow!(
            "Invalid refresh token"
        )));
    }
    Ok(claims)
}
