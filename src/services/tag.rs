//! Tag service
//!
//! Page tags are replaced wholesale on save: the submitted name set becomes
//! the page's tag set. Missing tags are created on the fly and reported
//! back so listeners can react to brand-new tags.

use crate::db::repositories::TagRepository;
use crate::models::Tag;
use anyhow::Result;
use sqlx::SqliteConnection;
use std::sync::Arc;

/// Computed tag changes for one page
#[derive(Debug, Clone, Default)]
pub struct TagPlan {
    /// Existing tags to associate
    pub attach: Vec<Tag>,
    /// Tag names that do not exist yet
    pub create: Vec<String>,
    /// Currently associated tags to detach
    pub detach: Vec<Tag>,
}

impl TagPlan {
    pub fn is_empty(&self) -> bool {
        self.attach.is_empty() && self.create.is_empty() && self.detach.is_empty()
    }
}

pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    /// Compute the changes needed to make the page's tag set equal the
    /// submitted names. Names are trimmed; empty and duplicate names are
    /// ignored. Comparison is case-insensitive against existing tags.
    pub async fn plan_page_tags(&self, page_id: i64, submitted: &[String]) -> Result<TagPlan> {
        let current = self.repo.list_for_page(page_id).await?;

        let mut wanted: Vec<&str> = Vec::new();
        for name in submitted {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !wanted.iter().any(|w| w.eq_ignore_ascii_case(trimmed)) {
                wanted.push(trimmed);
            }
        }

        let mut plan = TagPlan::default();

        for name in &wanted {
            if current.iter().any(|t| t.name.eq_ignore_ascii_case(name)) {
                continue;
            }
            match self.repo.get_by_name(name).await? {
                Some(tag) => plan.attach.push(tag),
                None => plan.create.push(name.to_string()),
            }
        }

        for tag in current {
            if !wanted.iter().any(|w| w.eq_ignore_ascii_case(&tag.name)) {
                plan.detach.push(tag);
            }
        }

        Ok(plan)
    }

    /// Apply a computed plan inside the caller's transaction. Returns the
    /// newly created tags.
    pub async fn apply_page_tags(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
        plan: &TagPlan,
    ) -> Result<Vec<Tag>> {
        for tag in &plan.detach {
            self.repo.remove_page_tag_in(conn, page_id, tag.id).await?;
        }

        for tag in &plan.attach {
            self.repo.add_page_tag_in(conn, page_id, tag.id).await?;
        }

        let mut new_tags = Vec::with_capacity(plan.create.len());
        for name in &plan.create {
            let tag = self.repo.create_in(conn, name).await?;
            self.repo.add_page_tag_in(conn, page_id, tag.id).await?;
            new_tags.push(tag);
        }

        Ok(new_tags)
    }

    pub async fn get_page_tags(&self, page_id: i64) -> Result<Vec<Tag>> {
        self.repo.list_for_page(page_id).await
    }
}
