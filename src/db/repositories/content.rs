//! Page content repository

use crate::db::DbPool;
use crate::models::PageContent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;

#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn create(&self, content: &PageContent) -> Result<PageContent>;
    async fn list_for_page(&self, page_id: i64) -> Result<Vec<PageContent>>;
    /// Promote the page's draft revisions to published, archiving the
    /// previously published revision of each affected region.
    /// Returns the number of revisions published.
    async fn publish_drafts_in(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
        published_on: DateTime<Utc>,
    ) -> Result<u64>;
}

pub struct SqlxContentRepository {
    pool: DbPool,
}

impl SqlxContentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn create(&self, content: &PageContent) -> Result<PageContent> {
        let result = sqlx::query(
            "INSERT INTO page_contents (page_id, region, content, status, published_on, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(content.page_id)
        .bind(&content.region)
        .bind(&content.content)
        .bind(content.status.to_string())
        .bind(content.published_on)
        .bind(content.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create page content")?;

        let mut created = content.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }

    async fn list_for_page(&self, page_id: i64) -> Result<Vec<PageContent>> {
        let rows = sqlx::query(
            "SELECT id, page_id, region, content, status, published_on, created_at \
             FROM page_contents WHERE page_id = ? ORDER BY region, id",
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list page contents")?;

        rows.iter()
            .map(|r| -> Result<PageContent> {
                let status: String = r.get("status");
                Ok(PageContent {
                    id: r.get("id"),
                    page_id: r.get("page_id"),
                    region: r.get("region"),
                    content: r.get("content"),
                    status: status.parse()?,
                    published_on: r.get("published_on"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }

    async fn publish_drafts_in(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
        published_on: DateTime<Utc>,
    ) -> Result<u64> {
        // Archive published revisions that a draft is about to supersede
        sqlx::query(
            "UPDATE page_contents SET status = 'archived' \
             WHERE page_id = ? AND status = 'published' AND region IN \
             (SELECT region FROM page_contents WHERE page_id = ? AND status = 'draft')",
        )
        .bind(page_id)
        .bind(page_id)
        .execute(&mut *conn)
        .await
        .context("Failed to archive published contents")?;

        let result = sqlx::query(
            "UPDATE page_contents SET status = 'published', published_on = ? \
             WHERE page_id = ? AND status = 'draft'",
        )
        .bind(published_on)
        .bind(page_id)
        .execute(&mut *conn)
        .await
        .context("Failed to publish draft contents")?;

        Ok(result.rows_affected())
    }
}
