//! Sitemap service
//!
//! When a page URL changes, every sitemap node pointing at the old URL
//! must follow it. The rewrite is split into a read phase (collect the
//! matching nodes, outside any transaction) and a write phase executed
//! inside the caller's transaction, so a cancelled save leaves sitemaps
//! untouched.

use crate::db::repositories::SitemapRepository;
use crate::models::SitemapNode;
use anyhow::Result;
use sqlx::SqliteConnection;
use std::sync::Arc;

pub struct SitemapService {
    repo: Arc<dyn SitemapRepository>,
}

impl SitemapService {
    pub fn new(repo: Arc<dyn SitemapRepository>) -> Self {
        Self { repo }
    }

    /// Nodes across all sitemaps whose URL matches exactly.
    pub async fn nodes_matching(&self, url: &str) -> Result<Vec<SitemapNode>> {
        self.repo.nodes_by_url(url).await
    }

    /// Rewrite the given nodes to the new URL inside the caller's
    /// transaction. Returns the nodes with their URL updated.
    pub async fn rewrite_nodes(
        &self,
        conn: &mut SqliteConnection,
        nodes: &[SitemapNode],
        new_url: &str,
    ) -> Result<Vec<SitemapNode>> {
        let mut updated = Vec::with_capacity(nodes.len());
        for node in nodes {
            self.repo.update_node_url_in(conn, node.id, new_url).await?;
            let mut changed = node.clone();
            changed.url = new_url.to_string();
            updated.push(changed);
        }
        Ok(updated)
    }

    /// Distinct sitemap ids over a set of nodes, in first-seen order.
    pub fn distinct_sitemap_ids(nodes: &[SitemapNode]) -> Vec<i64> {
        let mut ids = Vec::new();
        for node in nodes {
            if !ids.contains(&node.sitemap_id) {
                ids.push(node.sitemap_id);
            }
        }
        ids
    }
}
