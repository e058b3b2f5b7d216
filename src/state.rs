use std::sync::Arc;

use sqlx::PgPool;

use crate::config::auth::AuthConfig;
use crate::config::cors::CorsConfig;
use crate::config::database::init_db_pool;
use crate::config::email::EmailConfig;
use crate::config::jwt::JwtConfig;
use crate::config::storage::StorageConfig;
use crate::storage::{LocalMediaStore, MediaStore};
use crate::utils::email::EmailService;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_config: JwtConfig,
    pub auth_config: AuthConfig,
    pub cors_config: CorsConfig,
    pub email_service: EmailService,
    pub media: Arc<dyn MediaStore>,
}

pub async fn init_app_state() -> AppState {
    let db = init_db_pool().await;
    let storage_config = StorageConfig::from_env();

    AppState {
        db,
        jwt_config: JwtConfig::from_env(),
        auth_config: AuthConfig::from_env(),
        cors_config: CorsConfig::from_env(),
        email_service: EmailService::new(EmailConfig::from_env()),
        media: Arc::new(LocalMediaStore::new(&storage_config)),
    }
}
