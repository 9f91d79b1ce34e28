//! Content service

use crate::db::repositories::ContentRepository;
use crate::models::PageContent;
use anyhow::Result;
use chrono::Utc;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::debug;

pub struct ContentService {
    repo: Arc<dyn ContentRepository>,
}

impl ContentService {
    pub fn new(repo: Arc<dyn ContentRepository>) -> Self {
        Self { repo }
    }

    /// Promote the page's draft revisions to published inside the caller's
    /// transaction. Returns the number of revisions published.
    pub async fn publish_draft_content(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
    ) -> Result<u64> {
        let published = self.repo.publish_drafts_in(conn, page_id, Utc::now()).await?;
        if published > 0 {
            debug!("Published {} draft revision(s) for page {}", published, page_id);
        }
        Ok(published)
    }

    pub async fn get_page_contents(&self, page_id: i64) -> Result<Vec<PageContent>> {
        self.repo.list_for_page(page_id).await
    }

    pub async fn add_draft(&self, content: &PageContent) -> Result<PageContent> {
        self.repo.create(content).await
    }
}
