use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use linguazone::config::auth::AuthConfig;
use linguazone::config::cors::CorsConfig;
use linguazone::config::email::EmailConfig;
use linguazone::config::jwt::JwtConfig;
use linguazone::config::storage::StorageConfig;
use linguazone::router::init_router;
use linguazone::state::AppState;
use linguazone::storage::LocalMediaStore;
use linguazone::utils::email::EmailService;
use serde_json::json;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

fn setup_test_app(pool: PgPool, dir: &TempDir) -> axum::Router {
    let storage_config = StorageConfig {
        upload_dir: dir.path().to_path_buf(),
        max_file_size: 1024 * 1024,
    };
    let state = AppState {
        db: pool,
        jwt_config: JwtConfig::from_env(),
        auth_config: AuthConfig::default(),
        cors_config: CorsConfig::from_env(),
        email_service: EmailService::new(EmailConfig {
            enabled: false,
            ..EmailConfig::from_env()
        }),
        media: Arc::new(LocalMediaStore::new(&storage_config)),
    };
    init_router(state)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn stored_code(pool: &PgPool, email: &str) -> String {
    sqlx::query_scalar::<_, Option<String>>(
        "SELECT verification_code FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap()
    .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn test_register_verify_login_flow(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let app = setup_test_app(pool.clone(), &dir);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            json!({
                "email": "marie@test.com",
                "username": "marie",
                "password": "secret123"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    assert!(body.get("access_token").is_some());
    assert!(body.get("refresh_token").is_some());
    assert_eq!(body["user"]["email"], "marie@test.com");

    // Unverified accounts cannot log in yet.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "marie@test.com", "password": "secret123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let code = stored_code(&pool, "marie@test.com").await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/verify-email",
            json!({ "email": "marie@test.com", "verification_code": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "marie@test.com", "password": "secret123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert!(body.get("access_token").is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_invalid_credentials(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let app = setup_test_app(pool, &dir);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "nobody@test.com", "password": "wrongpass" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_invalid_email_format(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let app = setup_test_app(pool, &dir);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "not-an-email", "password": "secret123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_levels_require_token(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let app = setup_test_app(pool.clone(), &dir);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/levels")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            json!({
                "email": "paul@test.com",
                "username": "paul",
                "password": "secret123"
            }),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    let access_token = body["access_token"].as_str().unwrap().to_string();
    let refresh_token = body["refresh_token"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/levels")
                .header("authorization", format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));

    // A refresh token never stands in for an access token.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/levels")
                .header("authorization", format!("Bearer {refresh_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_level_writes_require_admin(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let app = setup_test_app(pool.clone(), &dir);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            json!({
                "email": "eve@test.com",
                "username": "eve",
                "password": "secret123"
            }),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let boundary = "LvlBoundary";
    let multipart = format!(
        "--{boundary}\r\ncontent-disposition: form-data; name=\"name\"\r\n\r\nBeginner\r\n--{boundary}--\r\n"
    );
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/levels")
                .header("authorization", format!("Bearer {access_token}"))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(multipart))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
