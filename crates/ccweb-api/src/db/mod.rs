//! # Database Persistence Layer
//!
//! Postgres persistence for the object catalog via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, stored
//! objects and access grants live in PostgreSQL and survive restarts. When
//! absent, the API uses the in-memory catalog (suitable for development
//! and testing).
//!
//! ## What is persisted
//!
//! - `uploaded_files`: one row per distinct content fingerprint
//! - `file_access`: one row per (principal, file) grant
//!
//! Blob bytes are never stored in the database; they live in the storage
//! directory under their content-addressed key.

pub mod files;

use sqlx::postgres::{PgPool, PgPoolOptions};

pub use files::PgCatalog;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, using in-memory catalog. \
                 Uploaded file records will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
