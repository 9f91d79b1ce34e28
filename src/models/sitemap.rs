//! Sitemap models

use serde::{Deserialize, Serialize};

/// A named navigational tree of URL entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sitemap {
    pub id: i64,
    pub title: String,
}

impl Sitemap {
    pub fn new(title: String) -> Self {
        Self { id: 0, title }
    }
}

/// An entry in a sitemap referencing a page URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapNode {
    pub id: i64,
    pub sitemap_id: i64,
    pub parent_id: Option<i64>,
    pub title: String,
    pub url: String,
    pub display_order: i32,
}

impl SitemapNode {
    pub fn new(sitemap_id: i64, title: String, url: String) -> Self {
        Self {
            id: 0,
            sitemap_id,
            parent_id: None,
            title,
            url,
            display_order: 0,
        }
    }
}
