//! Page content revision model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content revision status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Draft,
    Published,
    Archived,
}

impl Default for ContentStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for ContentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            _ => Err(anyhow::anyhow!("Invalid content status: {}", s)),
        }
    }
}

/// A content revision attached to a page region.
///
/// Drafts are promoted to published when the page itself transitions to
/// published; the previously published revision is archived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    pub id: i64,
    pub page_id: i64,
    pub region: String,
    pub content: String,
    pub status: ContentStatus,
    pub published_on: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PageContent {
    pub fn new(page_id: i64, region: String, content: String) -> Self {
        Self {
            id: 0,
            page_id,
            region,
            content,
            status: ContentStatus::Draft,
            published_on: None,
            created_at: Utc::now(),
        }
    }
}
