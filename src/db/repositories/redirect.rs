//! Redirect repository

use crate::db::DbPool;
use crate::models::Redirect;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;

#[async_trait]
pub trait RedirectRepository: Send + Sync {
    async fn get_by_page_url(&self, page_url: &str) -> Result<Option<Redirect>>;
    async fn list(&self) -> Result<Vec<Redirect>>;
    async fn create_in(&self, conn: &mut SqliteConnection, redirect: &Redirect) -> Result<Redirect>;
}

pub struct SqlxRedirectRepository {
    pool: DbPool,
}

impl SqlxRedirectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn RedirectRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RedirectRepository for SqlxRedirectRepository {
    async fn get_by_page_url(&self, page_url: &str) -> Result<Option<Redirect>> {
        let row = sqlx::query("SELECT id, page_url, redirect_url FROM redirects WHERE page_url = ?")
            .bind(page_url)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get redirect")?;
        Ok(row.map(|r| row_to_redirect(&r)))
    }

    async fn list(&self) -> Result<Vec<Redirect>> {
        let rows = sqlx::query("SELECT id, page_url, redirect_url FROM redirects ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list redirects")?;
        Ok(rows.iter().map(row_to_redirect).collect())
    }

    async fn create_in(&self, conn: &mut SqliteConnection, redirect: &Redirect) -> Result<Redirect> {
        // A URL the page left before may already carry a redirect; repoint
        // it instead of duplicating.
        sqlx::query(
            "INSERT INTO redirects (page_url, redirect_url) VALUES (?, ?) \
             ON CONFLICT(page_url) DO UPDATE SET redirect_url = excluded.redirect_url",
        )
        .bind(&redirect.page_url)
        .bind(&redirect.redirect_url)
        .execute(&mut *conn)
        .await
        .context("Failed to create redirect")?;

        let row = sqlx::query("SELECT id, page_url, redirect_url FROM redirects WHERE page_url = ?")
            .bind(&redirect.page_url)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to reload redirect")?;
        Ok(row_to_redirect(&row))
    }
}

fn row_to_redirect(row: &sqlx::sqlite::SqliteRow) -> Redirect {
    Redirect {
        id: row.get("id"),
        page_url: row.get("page_url"),
        redirect_url: row.get("redirect_url"),
    }
}
