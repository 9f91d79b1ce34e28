//! Page repository

use crate::db::DbPool;
use crate::models::{AccessRule, Layout, LayoutOption, MasterPage, Page, PageOption};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;

/// The page together with its loaded object graph.
///
/// `is_master_page` is derived at load time: true when any other page
/// records this page as one of its masters.
#[derive(Debug, Clone)]
pub struct PageGraph {
    pub page: Page,
    pub options: Vec<PageOption>,
    pub layout: Option<Layout>,
    pub layout_options: Vec<LayoutOption>,
    pub master_lineage: Vec<MasterPage>,
    pub access_rules: Vec<AccessRule>,
    pub is_master_page: bool,
}

#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn create(&self, page: &Page) -> Result<Page>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Page>>;
    async fn get_by_url(&self, url: &str) -> Result<Option<Page>>;
    /// Load the page with options, layout (+ its options), master lineage
    /// and, when requested, access rules.
    async fn load_graph(&self, id: i64, include_access_rules: bool) -> Result<Option<PageGraph>>;
    /// True when another page already owns this URL
    async fn url_taken(&self, url: &str, excluding_page_id: i64) -> Result<bool>;
    /// Persist the page inside the caller's transaction, guarded by the
    /// optimistic version token. Returns the number of rows affected; zero
    /// means the token was stale.
    async fn update_in(&self, conn: &mut SqliteConnection, page: &Page, expected_version: i64)
        -> Result<u64>;
}

pub struct SqlxPageRepository {
    pool: DbPool,
}

impl SqlxPageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn PageRepository> {
        Arc::new(Self::new(pool))
    }
}

const PAGE_COLUMNS: &str = "id, page_url, page_url_hash, title, layout_id, master_page_id, \
     category_id, status, published_on, version, meta_title, meta_keywords, meta_description, \
     description, canonical_url, use_canonical_url, use_no_follow, use_no_index, custom_css, \
     custom_js, image_id, secondary_image_id, featured_image_id, is_archived, \
     node_count_in_sitemap, created_at, updated_at";

#[async_trait]
impl PageRepository for SqlxPageRepository {
    async fn create(&self, page: &Page) -> Result<Page> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO pages (page_url, page_url_hash, title, layout_id, master_page_id, \
             category_id, status, published_on, version, meta_title, meta_keywords, \
             meta_description, description, canonical_url, use_canonical_url, use_no_follow, \
             use_no_index, custom_css, custom_js, image_id, secondary_image_id, \
             featured_image_id, is_archived, node_count_in_sitemap, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&page.page_url)
        .bind(&page.page_url_hash)
        .bind(&page.title)
        .bind(page.layout_id)
        .bind(page.master_page_id)
        .bind(page.category_id)
        .bind(page.status.to_string())
        .bind(page.published_on)
        .bind(page.version)
        .bind(&page.meta_title)
        .bind(&page.meta_keywords)
        .bind(&page.meta_description)
        .bind(&page.description)
        .bind(&page.canonical_url)
        .bind(page.use_canonical_url)
        .bind(page.use_no_follow)
        .bind(page.use_no_index)
        .bind(&page.custom_css)
        .bind(&page.custom_js)
        .bind(page.image_id)
        .bind(page.secondary_image_id)
        .bind(page.featured_image_id)
        .bind(page.is_archived)
        .bind(page.node_count_in_sitemap)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create page")?;

        let mut created = page.clone();
        created.id = result.last_insert_rowid();
        created.created_at = now;
        created.updated_at = now;
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Page>> {
        let row = sqlx::query(&format!("SELECT {} FROM pages WHERE id = ?", PAGE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get page")?;
        row.map(|r| row_to_page(&r)).transpose()
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Page>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pages WHERE page_url = ?",
            PAGE_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get page by url")?;
        row.map(|r| row_to_page(&r)).transpose()
    }

    async fn load_graph(&self, id: i64, include_access_rules: bool) -> Result<Option<PageGraph>> {
        let page = match self.get_by_id(id).await? {
            Some(page) => page,
            None => return Ok(None),
        };

        let option_rows =
            sqlx::query("SELECT id, page_id, key, value FROM page_options WHERE page_id = ? ORDER BY key")
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to load page options")?;
        let options = option_rows
            .iter()
            .map(|r| PageOption {
                id: r.get("id"),
                page_id: r.get("page_id"),
                key: r.get("key"),
                value: r.get("value"),
            })
            .collect();

        let (layout, layout_options) = match page.layout_id {
            Some(layout_id) => {
                let layout_row =
                    sqlx::query("SELECT id, name, layout_path FROM layouts WHERE id = ?")
                        .bind(layout_id)
                        .fetch_optional(&self.pool)
                        .await
                        .context("Failed to load layout")?;
                let layout = layout_row.map(|r| Layout {
                    id: r.get("id"),
                    name: r.get("name"),
                    layout_path: r.get("layout_path"),
                });
                let option_rows = sqlx::query(
                    "SELECT id, layout_id, key, default_value FROM layout_options WHERE layout_id = ? ORDER BY key",
                )
                .bind(layout_id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to load layout options")?;
                let layout_options = option_rows
                    .iter()
                    .map(|r| LayoutOption {
                        id: r.get("id"),
                        layout_id: r.get("layout_id"),
                        key: r.get("key"),
                        default_value: r.get("default_value"),
                    })
                    .collect();
                (layout, layout_options)
            }
            None => (None, Vec::new()),
        };

        let lineage_rows =
            sqlx::query("SELECT id, page_id, master_id FROM master_pages WHERE page_id = ?")
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to load master lineage")?;
        let master_lineage = lineage_rows
            .iter()
            .map(|r| MasterPage {
                id: r.get("id"),
                page_id: r.get("page_id"),
                master_id: r.get("master_id"),
            })
            .collect();

        let access_rules = if include_access_rules {
            let rule_rows = sqlx::query(
                "SELECT id, page_id, identity, is_for_role, access_level FROM access_rules WHERE page_id = ?",
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load access rules")?;
            rule_rows
                .iter()
                .map(|r| -> Result<AccessRule> {
                    let level: String = r.get("access_level");
                    Ok(AccessRule {
                        id: r.get("id"),
                        page_id: r.get("page_id"),
                        identity: r.get("identity"),
                        is_for_role: r.get("is_for_role"),
                        access_level: level.parse()?,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let is_master_row =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM master_pages WHERE master_id = ?) as used")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to check master page usage")?;
        let is_master_page: bool = is_master_row.get("used");

        Ok(Some(PageGraph {
            page,
            options,
            layout,
            layout_options,
            master_lineage,
            access_rules,
            is_master_page,
        }))
    }

    async fn url_taken(&self, url: &str, excluding_page_id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM pages WHERE page_url = ? AND id != ?")
            .bind(url)
            .bind(excluding_page_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check url uniqueness")?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    async fn update_in(
        &self,
        conn: &mut SqliteConnection,
        page: &Page,
        expected_version: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE pages SET page_url = ?, page_url_hash = ?, title = ?, layout_id = ?, \
             master_page_id = ?, category_id = ?, status = ?, published_on = ?, version = ?, \
             meta_title = ?, meta_keywords = ?, meta_description = ?, description = ?, \
             canonical_url = ?, use_canonical_url = ?, use_no_follow = ?, use_no_index = ?, \
             custom_css = ?, custom_js = ?, image_id = ?, secondary_image_id = ?, \
             featured_image_id = ?, is_archived = ?, node_count_in_sitemap = ?, updated_at = ? \
             WHERE id = ? AND version = ?",
        )
        .bind(&page.page_url)
        .bind(&page.page_url_hash)
        .bind(&page.title)
        .bind(page.layout_id)
        .bind(page.master_page_id)
        .bind(page.category_id)
        .bind(page.status.to_string())
        .bind(page.published_on)
        .bind(page.version)
        .bind(&page.meta_title)
        .bind(&page.meta_keywords)
        .bind(&page.meta_description)
        .bind(&page.description)
        .bind(&page.canonical_url)
        .bind(page.use_canonical_url)
        .bind(page.use_no_follow)
        .bind(page.use_no_index)
        .bind(&page.custom_css)
        .bind(&page.custom_js)
        .bind(page.image_id)
        .bind(page.secondary_image_id)
        .bind(page.featured_image_id)
        .bind(page.is_archived)
        .bind(page.node_count_in_sitemap)
        .bind(page.updated_at)
        .bind(page.id)
        .bind(expected_version)
        .execute(&mut *conn)
        .await
        .context("Failed to update page")?;

        Ok(result.rows_affected())
    }
}

fn row_to_page(row: &sqlx::sqlite::SqliteRow) -> Result<Page> {
    let status: String = row.get("status");
    Ok(Page {
        id: row.get("id"),
        page_url: row.get("page_url"),
        page_url_hash: row.get("page_url_hash"),
        title: row.get("title"),
        layout_id: row.get("layout_id"),
        master_page_id: row.get("master_page_id"),
        category_id: row.get("category_id"),
        status: status.parse()?,
        published_on: row.get("published_on"),
        version: row.get("version"),
        meta_title: row.get("meta_title"),
        meta_keywords: row.get("meta_keywords"),
        meta_description: row.get("meta_description"),
        description: row.get("description"),
        canonical_url: row.get("canonical_url"),
        use_canonical_url: row.get("use_canonical_url"),
        use_no_follow: row.get("use_no_follow"),
        use_no_index: row.get("use_no_index"),
        custom_css: row.get("custom_css"),
        custom_js: row.get("custom_js"),
        image_id: row.get("image_id"),
        secondary_image_id: row.get("secondary_image_id"),
        featured_image_id: row.get("featured_image_id"),
        is_archived: row.get("is_archived"),
        node_count_in_sitemap: row.get("node_count_in_sitemap"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
