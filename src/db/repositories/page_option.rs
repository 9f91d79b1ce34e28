//! Page option repository

use crate::db::DbPool;
use crate::models::PageOption;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;

#[async_trait]
pub trait PageOptionRepository: Send + Sync {
    async fn list_for_page(&self, page_id: i64) -> Result<Vec<PageOption>>;
    async fn insert_in(&self, conn: &mut SqliteConnection, option: &PageOption) -> Result<()>;
    async fn update_value_in(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        value: &str,
    ) -> Result<()>;
    async fn delete_in(&self, conn: &mut SqliteConnection, id: i64) -> Result<()>;
}

pub struct SqlxPageOptionRepository {
    pool: DbPool,
}

impl SqlxPageOptionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn PageOptionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PageOptionRepository for SqlxPageOptionRepository {
    async fn list_for_page(&self, page_id: i64) -> Result<Vec<PageOption>> {
        let rows = sqlx::query(
            "SELECT id, page_id, key, value FROM page_options WHERE page_id = ? ORDER BY key",
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list page options")?;
        Ok(rows
            .iter()
            .map(|r| PageOption {
                id: r.get("id"),
                page_id: r.get("page_id"),
                key: r.get("key"),
                value: r.get("value"),
            })
            .collect())
    }

    async fn insert_in(&self, conn: &mut SqliteConnection, option: &PageOption) -> Result<()> {
        sqlx::query("INSERT INTO page_options (page_id, key, value) VALUES (?, ?, ?)")
            .bind(option.page_id)
            .bind(&option.key)
            .bind(&option.value)
            .execute(&mut *conn)
            .await
            .context("Failed to insert page option")?;
        Ok(())
    }

    async fn update_value_in(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        value: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE page_options SET value = ? WHERE id = ?")
            .bind(value)
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("Failed to update page option")?;
        Ok(())
    }

    async fn delete_in(&self, conn: &mut SqliteConnection, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM page_options WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("Failed to delete page option")?;
        Ok(())
    }
}
