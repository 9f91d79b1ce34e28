//! Database connection pool
//!
//! SQLite-backed pool factory for single-binary deployment. File-based
//! databases get their parent directory created and are opened in
//! read-write-create mode; foreign key enforcement is switched on for
//! every pool.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;

/// Alias used throughout the crate for the connection pool
pub type DbPool = SqlitePool;

/// Create a database connection pool based on configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let url = &config.url;

    // Ensure the database directory exists for file-based SQLite
    if !url.starts_with(":memory:") && !url.starts_with("sqlite::memory:") {
        let path = if url.starts_with("sqlite:") {
            url.trim_start_matches("sqlite:")
        } else {
            url
        };

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
            }
        }
    }

    // Build the connection URL with create=true for file-based databases
    let connection_url = if url.starts_with("sqlite:") {
        if url.contains('?') {
            url.to_string()
        } else {
            format!("{}?mode=rwc", url)
        }
    } else if url == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite:{}?mode=rwc", url)
    };

    // An in-memory database exists per connection, so the pool must not
    // grow beyond one.
    let max_connections = if connection_url.starts_with("sqlite::memory:") {
        1
    } else {
        20
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&connection_url)
        .await
        .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .context("Failed to enable foreign keys")?;

    Ok(pool)
}

/// Create an in-memory database pool for testing.
pub async fn create_test_pool() -> Result<DbPool> {
    let config = DatabaseConfig {
        url: ":memory:".to_string(),
    };
    create_pool(&config).await
}
