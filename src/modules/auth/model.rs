use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::modules::users::model::{PublicUser, UserRole};

/// JWT claims. `token_type` distinguishes access tokens from refresh
/// tokens so one cannot stand in for the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub role: UserRole,
    pub token_type: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Tokens plus the user they are bound to, returned by register, login,
/// and refresh.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

impl AuthResponse {
    pub fn new(tokens: TokenPair, user: PublicUser) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterDto {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3, max = 80))]
    pub username: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginDto {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyEmailDto {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6))]
    pub verification_code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailDto {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordDto {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6))]
    pub verification_code: String,
    #[validate(length(min = 6))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshTokenDto {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Existence probe for the registration flow.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckEmailResponse {
    pub exists: bool,
    pub is_verified: Option<bool>,
}
