//! Master page lineage repository

use crate::db::DbPool;
use crate::models::MasterPage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;

#[async_trait]
pub trait MasterPageRepository: Send + Sync {
    /// Distinct master ids recorded for a page (its flattened ancestor chain)
    async fn lineage_ids(&self, page_id: i64) -> Result<Vec<i64>>;
    /// True when `master_id` appears in the page's recorded lineage
    async fn has_master(&self, page_id: i64, master_id: i64) -> Result<bool>;
    /// Distinct ids of pages that record `master_id` in their lineage
    async fn pages_referencing(&self, master_id: i64) -> Result<Vec<i64>>;
    /// Existing lineage rows of the given pages that reference any of the
    /// given master ids
    async fn rows_referencing(&self, page_ids: &[i64], master_ids: &[i64])
        -> Result<Vec<MasterPage>>;
    async fn insert_in(&self, conn: &mut SqliteConnection, page_id: i64, master_id: i64)
        -> Result<()>;
    async fn delete_in(&self, conn: &mut SqliteConnection, id: i64) -> Result<()>;
}

pub struct SqlxMasterPageRepository {
    pool: DbPool,
}

impl SqlxMasterPageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn MasterPageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MasterPageRepository for SqlxMasterPageRepository {
    async fn lineage_ids(&self, page_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query("SELECT DISTINCT master_id FROM master_pages WHERE page_id = ?")
            .bind(page_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load lineage ids")?;
        Ok(rows.iter().map(|r| r.get("master_id")).collect())
    }

    async fn has_master(&self, page_id: i64, master_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM master_pages WHERE page_id = ? AND master_id = ?) as found",
        )
        .bind(page_id)
        .bind(master_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check lineage")?;
        Ok(row.get("found"))
    }

    async fn pages_referencing(&self, master_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query("SELECT DISTINCT page_id FROM master_pages WHERE master_id = ?")
            .bind(master_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load referencing pages")?;
        Ok(rows.iter().map(|r| r.get("page_id")).collect())
    }

    async fn rows_referencing(
        &self,
        page_ids: &[i64],
        master_ids: &[i64],
    ) -> Result<Vec<MasterPage>> {
        if page_ids.is_empty() || master_ids.is_empty() {
            return Ok(Vec::new());
        }

        let page_placeholders = vec!["?"; page_ids.len()].join(", ");
        let master_placeholders = vec!["?"; master_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, page_id, master_id FROM master_pages \
             WHERE page_id IN ({}) AND master_id IN ({})",
            page_placeholders, master_placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in page_ids {
            query = query.bind(id);
        }
        for id in master_ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("Failed to load lineage rows")?;
        Ok(rows
            .iter()
            .map(|r| MasterPage {
                id: r.get("id"),
                page_id: r.get("page_id"),
                master_id: r.get("master_id"),
            })
            .collect())
    }

    async fn insert_in(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
        master_id: i64,
    ) -> Result<()> {
        sqlx::query("INSERT INTO master_pages (page_id, master_id) VALUES (?, ?)")
            .bind(page_id)
            .bind(master_id)
            .execute(&mut *conn)
            .await
            .context("Failed to insert lineage row")?;
        Ok(())
    }

    async fn delete_in(&self, conn: &mut SqliteConnection, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM master_pages WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("Failed to delete lineage row")?;
        Ok(())
    }
}
