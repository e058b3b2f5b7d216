use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

use super::controller::{
    check_email, delete_account, forgot_password, login, refresh, register, resend_otp,
    reset_password, verify_email,
};

pub fn init_auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/resend-otp", post(resend_otp))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/check-email", get(check_email))
        .route("/account", delete(delete_account))
}
