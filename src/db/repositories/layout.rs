//! Layout repository

use crate::db::DbPool;
use crate::models::Layout;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait LayoutRepository: Send + Sync {
    async fn create(&self, layout: &Layout) -> Result<Layout>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Layout>>;
}

pub struct SqlxLayoutRepository {
    pool: DbPool,
}

impl SqlxLayoutRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn LayoutRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LayoutRepository for SqlxLayoutRepository {
    async fn create(&self, layout: &Layout) -> Result<Layout> {
        let result = sqlx::query("INSERT INTO layouts (name, layout_path) VALUES (?, ?)")
            .bind(&layout.name)
            .bind(&layout.layout_path)
            .execute(&self.pool)
            .await
            .context("Failed to create layout")?;

        let mut created = layout.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Layout>> {
        let row = sqlx::query("SELECT id, name, layout_path FROM layouts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get layout")?;
        Ok(row.map(|r| Layout {
            id: r.get("id"),
            name: r.get("name"),
            layout_path: r.get("layout_path"),
        }))
    }
}
