//! Page model
//!
//! A page is the central entity of the CMS. It carries its own URL, SEO
//! metadata, appearance settings and a layout association: either a plain
//! layout template or another page acting as its master page, never both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Draft,
    Unpublished,
    Published,
}

impl Default for PageStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Unpublished => write!(f, "unpublished"),
            Self::Published => write!(f, "published"),
        }
    }
}

impl std::str::FromStr for PageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "unpublished" => Ok(Self::Unpublished),
            "published" => Ok(Self::Published),
            _ => Err(anyhow::anyhow!("Invalid page status: {}", s)),
        }
    }
}

/// Page entity
///
/// `layout_id` and `master_page_id` are mutually exclusive; assigning one
/// clears the other. `version` is the optimistic concurrency token: a save
/// carrying a stale version is rejected as a conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub page_url: String,
    /// md5 hash of the lowercased page URL, kept for indexed lookups
    pub page_url_hash: String,
    pub title: String,
    pub layout_id: Option<i64>,
    pub master_page_id: Option<i64>,
    pub category_id: Option<i64>,
    pub status: PageStatus,
    pub published_on: Option<DateTime<Utc>>,
    pub version: i64,

    // SEO
    pub meta_title: String,
    pub meta_keywords: String,
    pub meta_description: String,
    pub description: String,
    pub canonical_url: String,
    pub use_canonical_url: bool,
    pub use_no_follow: bool,
    pub use_no_index: bool,

    // Appearance
    pub custom_css: String,
    pub custom_js: String,
    pub image_id: Option<i64>,
    pub secondary_image_id: Option<i64>,
    pub featured_image_id: Option<i64>,

    pub is_archived: bool,
    /// Number of sitemap nodes currently referencing this page's URL
    pub node_count_in_sitemap: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn new(page_url: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            page_url,
            page_url_hash: String::new(),
            title,
            layout_id: None,
            master_page_id: None,
            category_id: None,
            status: PageStatus::Draft,
            published_on: None,
            version: 1,
            meta_title: String::new(),
            meta_keywords: String::new(),
            meta_description: String::new(),
            description: String::new(),
            canonical_url: String::new(),
            use_canonical_url: false,
            use_no_follow: false,
            use_no_index: false,
            custom_css: String::new(),
            custom_js: String::new(),
            image_id: None,
            secondary_image_id: None,
            featured_image_id: None,
            is_archived: false,
            node_count_in_sitemap: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// A page counts as search-engine optimized only when all meta fields
    /// are filled in and at least one sitemap node points at it.
    pub fn has_seo(&self) -> bool {
        !self.meta_title.trim().is_empty()
            && !self.meta_keywords.trim().is_empty()
            && !self.meta_description.trim().is_empty()
            && self.node_count_in_sitemap > 0
    }

    /// Copy SEO, layout and appearance data into a fresh unsaved page.
    /// Identity, URL and publication state are not carried over.
    pub fn duplicate(&self, page_url: String, title: String) -> Page {
        let mut copy = Page::new(page_url, title);
        copy.meta_title = self.meta_title.clone();
        copy.meta_keywords = self.meta_keywords.clone();
        copy.meta_description = self.meta_description.clone();
        copy.description = self.description.clone();
        copy.use_canonical_url = self.use_canonical_url;
        copy.use_no_follow = self.use_no_follow;
        copy.use_no_index = self.use_no_index;
        copy.custom_css = self.custom_css.clone();
        copy.custom_js = self.custom_js.clone();
        copy.layout_id = self.layout_id;
        copy.master_page_id = self.master_page_id;
        copy.category_id = self.category_id;
        copy.image_id = self.image_id;
        copy
    }
}

/// Submitted state for the page properties save workflow.
///
/// Exactly one of `master_page_id` / `layout_id` must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct EditPagePropertiesInput {
    pub id: i64,
    /// Optimistic concurrency token of the page as the caller last saw it
    pub version: i64,
    pub title: String,
    pub page_url: String,
    /// Create a redirect from the old URL when the URL changes
    #[serde(default)]
    pub redirect_from_old_url: bool,
    /// Rewrite sitemap node URLs when the URL changes
    #[serde(default)]
    pub update_sitemap: bool,
    pub master_page_id: Option<i64>,
    pub layout_id: Option<i64>,
    pub category_id: Option<i64>,
    /// Whether the caller is managing publication state with this save
    #[serde(default)]
    pub update_publish_state: bool,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_keywords: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub use_canonical_url: bool,
    #[serde(default)]
    pub use_no_follow: bool,
    #[serde(default)]
    pub use_no_index: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub custom_css: String,
    #[serde(default)]
    pub custom_js: String,
    pub image_id: Option<i64>,
    pub secondary_image_id: Option<i64>,
    pub featured_image_id: Option<i64>,
    #[serde(default)]
    pub option_values: Vec<crate::models::OptionValueInput>,
    #[serde(default)]
    pub user_access_list: Vec<crate::models::AccessRuleInput>,
    #[serde(default)]
    pub tags: Vec<String>,
}
