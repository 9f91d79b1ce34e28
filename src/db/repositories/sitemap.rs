//! Sitemap repository

use crate::db::DbPool;
use crate::models::{Sitemap, SitemapNode};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;

#[async_trait]
pub trait SitemapRepository: Send + Sync {
    async fn create(&self, sitemap: &Sitemap) -> Result<Sitemap>;
    async fn create_node(&self, node: &SitemapNode) -> Result<SitemapNode>;
    async fn get_node(&self, id: i64) -> Result<Option<SitemapNode>>;
    /// All nodes across all sitemaps whose URL matches exactly
    async fn nodes_by_url(&self, url: &str) -> Result<Vec<SitemapNode>>;
    async fn update_node_url_in(
        &self,
        conn: &mut SqliteConnection,
        node_id: i64,
        url: &str,
    ) -> Result<()>;
}

pub struct SqlxSitemapRepository {
    pool: DbPool,
}

impl SqlxSitemapRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn SitemapRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SitemapRepository for SqlxSitemapRepository {
    async fn create(&self, sitemap: &Sitemap) -> Result<Sitemap> {
        let result = sqlx::query("INSERT INTO sitemaps (title) VALUES (?)")
            .bind(&sitemap.title)
            .execute(&self.pool)
            .await
            .context("Failed to create sitemap")?;

        let mut created = sitemap.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }

    async fn create_node(&self, node: &SitemapNode) -> Result<SitemapNode> {
        let result = sqlx::query(
            "INSERT INTO sitemap_nodes (sitemap_id, parent_id, title, url, display_order) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(node.sitemap_id)
        .bind(node.parent_id)
        .bind(&node.title)
        .bind(&node.url)
        .bind(node.display_order)
        .execute(&self.pool)
        .await
        .context("Failed to create sitemap node")?;

        let mut created = node.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }

    async fn get_node(&self, id: i64) -> Result<Option<SitemapNode>> {
        let row = sqlx::query(
            "SELECT id, sitemap_id, parent_id, title, url, display_order \
             FROM sitemap_nodes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get sitemap node")?;
        Ok(row.map(|r| row_to_node(&r)))
    }

    async fn nodes_by_url(&self, url: &str) -> Result<Vec<SitemapNode>> {
        let rows = sqlx::query(
            "SELECT id, sitemap_id, parent_id, title, url, display_order \
             FROM sitemap_nodes WHERE url = ? ORDER BY sitemap_id, id",
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load sitemap nodes by url")?;
        Ok(rows.iter().map(row_to_node).collect())
    }

    async fn update_node_url_in(
        &self,
        conn: &mut SqliteConnection,
        node_id: i64,
        url: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE sitemap_nodes SET url = ? WHERE id = ?")
            .bind(url)
            .bind(node_id)
            .execute(&mut *conn)
            .await
            .context("Failed to update sitemap node url")?;
        Ok(())
    }
}

fn row_to_node(row: &sqlx::sqlite::SqliteRow) -> SitemapNode {
    SitemapNode {
        id: row.get("id"),
        sitemap_id: row.get("sitemap_id"),
        parent_id: row.get("parent_id"),
        title: row.get("title"),
        url: row.get("url"),
        display_order: row.get("display_order"),
    }
}
