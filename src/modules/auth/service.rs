use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::config::auth::AuthConfig;
use crate::config::jwt::JwtConfig;
use crate::modules::users::model::User;
use crate::utils::email::EmailService;
use crate::utils::errors::AppError;
use crate::utils::jwt::{create_token_pair, verify_refresh_token};
use crate::utils::password::{hash_password, verify_password};

use super::model::{
    AuthResponse, CheckEmailResponse, EmailDto, LoginDto, MessageResponse, RefreshTokenDto,
    RegisterDto, ResetPasswordDto, VerifyEmailDto,
};

const USER_COLUMNS: &str = "id, email, username, password_hash, role, is_verified, \
     verification_code, verification_code_expires, created_at, updated_at";

fn generate_verification_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Registration, verification, login, and password-reset flows.
///
/// Every user moves `unverified -> verified`; the verification-code pair
/// doubles as the transient password-reset state. Code-bearing emails are
/// sent before the surrounding write commits, so a mail transport failure
/// leaves no half-updated user behind.
pub struct AuthService;

impl AuthService {
    async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;

        Ok(user)
    }

    #[instrument(skip_all, fields(email = %dto.email))]
    pub async fn register(
        db: &PgPool,
        email_service: &EmailService,
        jwt_config: &JwtConfig,
        auth_config: &AuthConfig,
        dto: RegisterDto,
    ) -> Result<AuthResponse, AppError> {
        let email_taken =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(&dto.email)
                .fetch_one(db)
                .await?;
        if email_taken {
            return Err(AppError::conflict(anyhow::anyhow!(
                "Email already registered"
            )));
        }

        let username_taken =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(&dto.username)
                .fetch_one(db)
                .await?;
        if username_taken {
            return Err(AppError::conflict(anyhow::anyhow!("Username already taken")));
        }

        let password_hash = hash_password(&dto.password)?;
        let code = generate_verification_code();
        let expires = Utc::now() + Duration::minutes(auth_config.verification_code_ttl_minutes);

        let mut tx = db.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, username, password_hash, verification_code, verification_code_expires)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&dto.email)
        .bind(&dto.username)
        .bind(&password_hash)
        .bind(&code)
        .bind(expires)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_unique_violation()
            {
                return AppError::conflict(anyhow::anyhow!("Email or username already exists"));
            }
            AppError::from(e)
        })?;

        // Mail goes out before the commit: a transport failure rolls the
        // registration back instead of stranding an unreachable account.
        if !email_service
            .send_verification_email(&user.email, &code)
            .await
        {
            return Err(AppError::dependency(anyhow::anyhow!(
                "Failed to send verification email"
            )));
        }

        tx.commit().await?;

        let tokens = create_token_pair(user.id, &user.email, user.role, jwt_config)?;
        Ok(AuthResponse::new(tokens, user.into()))
    }

    #[instrument(skip_all, fields(email = %dto.email))]
    pub async fn verify_email(db: &PgPool, dto: VerifyEmailDto) -> Result<MessageResponse, AppError> {
        let user = Self::find_by_email(db, &dto.email)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("User not found")))?;

        if user.is_verified {
            return Ok(MessageResponse::new("Email already verified"));
        }

        let (code, expires) = match (&user.verification_code, user.verification_code_expires) {
            (Some(code), Some(expires)) => (code, expires),
            _ => {
                return Err(AppError::bad_request(anyhow::anyhow!(
                    "No verification code found"
                )));
            }
        };

        if Utc::now() > expires {
            return Err(AppError::bad_request(anyhow::anyhow!(
                "Verification code has expired"
            )));
        }

        if *code != dto.verification_code {
            return Err(AppError::bad_request(anyhow::anyhow!(
                "Invalid verification code"
            )));
        }

        sqlx::query(
            "UPDATE users
             SET is_verified = TRUE, verification_code = NULL,
                 verification_code_expires = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(user.id)
        .execute(db)
        .await?;

        Ok(MessageResponse::new("Email verified successfully"))
    }

    #[instrument(skip_all, fields(email = %dto.email))]
    pub async fn resend_otp(
        db: &PgPool,
        email_service: &EmailService,
        auth_config: &AuthConfig,
        dto: EmailDto,
    ) -> Result<MessageResponse, AppError> {
        let user = Self::find_by_email(db, &dto.email)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("User not found")))?;

        if user.is_verified {
            return Ok(MessageResponse::new("Email already verified"));
        }

        let code = generate_verification_code();
        let expires = Utc::now() + Duration::minutes(auth_config.verification_code_ttl_minutes);

        if !email_service
            .send_verification_email(&user.email, &code)
            .await
        {
            return Err(AppError::dependency(anyhow::anyhow!(
                "Failed to send verification email"
            )));
        }

        sqlx::query(
            "UPDATE users
             SET verification_code = $1, verification_code_expires = $2, updated_at = NOW()
             WHERE id = $3",
        )
        .bind(&code)
        .bind(expires)
        .bind(user.id)
        .execute(db)
        .await?;

        Ok(MessageResponse::new(
            "New verification code sent successfully",
        ))
    }

    #[instrument(skip_all, fields(email = %dto.email))]
    pub async fn login(
        db: &PgPool,
        jwt_config: &JwtConfig,
        auth_config: &AuthConfig,
        dto: LoginDto,
    ) -> Result<AuthResponse, AppError> {
        let invalid = || AppError::unauthorized(anyhow::anyhow!("Invalid email or password"));

        let user = Self::find_by_email(db, &dto.email)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&dto.password, &user.password_hash)? {
            return Err(invalid());
        }

        // The unverified case deliberately reads the same as a bad
        // password, so login responses never leak account state.
        if auth_config.require_verified_login && !user.is_verified {
            return Err(invalid());
        }

        let tokens = create_token_pair(user.id, &user.email, user.role, jwt_config)?;
        Ok(AuthResponse::new(tokens, user.into()))
    }

    #[instrument(skip_all)]
    pub async fn refresh(
        db: &PgPool,
        jwt_config: &JwtConfig,
        dto: RefreshTokenDto,
    ) -> Result<AuthResponse, AppError> {
        let claims = verify_refresh_token(&dto.refresh_token, jwt_config)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::unauthorized(anyhow::anyhow!("Invalid refresh token")))?;

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::unauthorized(anyhow::anyhow!("User no longer exists")))?;

        let tokens = create_token_pair(user.id, &user.email, user.role, jwt_config)?;
        Ok(AuthResponse::new(tokens, user.into()))
    }

    #[instrument(skip_all, fields(email = %dto.email))]
    pub async fn forgot_password(
        db: &PgPool,
        email_service: &EmailService,
        auth_config: &AuthConfig,
        dto: EmailDto,
    ) -> Result<MessageResponse, AppError> {
        let user = Self::find_by_email(db, &dto.email)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("User not found")))?;

        let code = generate_verification_code();
        let expires = Utc::now() + Duration::minutes(auth_config.verification_code_ttl_minutes);

        if !email_service
            .send_password_reset_email(&user.email, &code)
            .await
        {
            return Err(AppError::dependency(anyhow::anyhow!(
                "Failed to send password reset email"
            )));
        }

        sqlx::query(
            "UPDATE users
             SET verification_code = $1, verification_code_expires = $2, updated_at = NOW()
             WHERE id = $3",
        )
        .bind(&code)
        .bind(expires)
        .bind(user.id)
        .execute(db)
        .await?;

        Ok(MessageResponse::new("Verification code sent to your email"))
    }

    #[instrument(skip_all, fields(email = %dto.email))]
    pub async fn reset_password(
        db: &PgPool,
        dto: ResetPasswordDto,
    ) -> Result<MessageResponse, AppError> {
        let user = Self::find_by_email(db, &dto.email)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("User not found")))?;

        let (code, expires) = match (&user.verification_code, user.verification_code_expires) {
            (Some(code), Some(expires)) => (code, expires),
            _ => {
                return Err(AppError::bad_request(anyhow::anyhow!(
                    "No verification code found"
                )));
            }
        };

        if Utc::now() > expires {
            return Err(AppError::bad_request(anyhow::anyhow!(
                "Verification code has expired"
            )));
        }

        if *code != dto.verification_code {
            return Err(AppError::bad_request(anyhow::anyhow!(
                "Invalid verification code"
            )));
        }

        let password_hash = hash_password(&dto.new_password)?;

        sqlx::query(
            "UPDATE users
             SET password_hash = $1, verification_code = NULL,
                 verification_code_expires = NULL, updated_at = NOW()
             WHERE id = $2",
        )
        .bind(&password_hash)
        .bind(user.id)
        .execute(db)
        .await?;

        Ok(MessageResponse::new("Password updated successfully"))
    }

    #[instrument(skip(db))]
    pub async fn check_email(db: &PgPool, email: &str) -> Result<CheckEmailResponse, AppError> {
        let user = Self::find_by_email(db, email).await?;

        Ok(CheckEmailResponse {
            exists: user.is_some(),
            is_verified: user.map(|u| u.is_verified),
        })
    }

    #[instrument(skip(db))]
    pub async fn delete_user(db: &PgPool, email: &str) -> Result<MessageResponse, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow::anyhow!("User not found")));
        }

        Ok(MessageResponse::new("User deleted successfully"))
    }
}
