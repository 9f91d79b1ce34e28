//! Tag repository

use crate::db::DbPool;
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;
    async fn list(&self) -> Result<Vec<Tag>>;
    async fn list_for_page(&self, page_id: i64) -> Result<Vec<Tag>>;
    async fn create_in(&self, conn: &mut SqliteConnection, name: &str) -> Result<Tag>;
    async fn add_page_tag_in(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
        tag_id: i64,
    ) -> Result<()>;
    async fn remove_page_tag_in(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
        tag_id: i64,
    ) -> Result<()>;
}

pub struct SqlxTagRepository {
    pool: DbPool,
}

impl SqlxTagRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT id, name FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get tag by name")?;
        Ok(row.map(|r| row_to_tag(&r)))
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list tags")?;
        Ok(rows.iter().map(row_to_tag).collect())
    }

    async fn list_for_page(&self, page_id: i64) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            "SELECT t.id, t.name FROM tags t \
             INNER JOIN page_tags pt ON pt.tag_id = t.id \
             WHERE pt.page_id = ? ORDER BY t.name",
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list page tags")?;
        Ok(rows.iter().map(row_to_tag).collect())
    }

    async fn create_in(&self, conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
        let result = sqlx::query("INSERT INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await
            .context("Failed to create tag")?;
        Ok(Tag {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    async fn add_page_tag_in(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
        tag_id: i64,
    ) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO page_tags (page_id, tag_id) VALUES (?, ?)")
            .bind(page_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to add page tag")?;
        Ok(())
    }

    async fn remove_page_tag_in(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
        tag_id: i64,
    ) -> Result<()> {
        sqlx::query("DELETE FROM page_tags WHERE page_id = ? AND tag_id = ?")
            .bind(page_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to remove page tag")?;
        Ok(())
    }
}

fn row_to_tag(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
    }
}
