//! Database configuration and connection pool initialization.
//!
//! The connection string is read from the `DATABASE_URL` environment
//! variable. The returned pool is cheaply cloneable and lives in
//! [`crate::state::AppState`] for the lifetime of the process.
//!
//! # Panics
//!
//! [`init_db_pool`] panics if `DATABASE_URL` is unset or the database is
//! unreachable; both are startup-fatal conditions.

use sqlx::PgPool;
use std::env;

pub async fn init_db_pool() -> PgPool {
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to database")
}
