//! Master page hierarchy service
//!
//! A page's master chain is stored flattened: one row per ancestor. When a
//! page's master assignment changes, its own rows and the rows of every
//! page that has it as an ancestor must be brought in line. The service
//! computes that change set up front (reads only) and applies it inside
//! the save transaction.

use crate::db::repositories::MasterPageRepository;
use crate::models::MasterPage;
use anyhow::Result;
use sqlx::SqliteConnection;
use std::sync::Arc;

/// Computed lineage delta for a master page reassignment
#[derive(Debug, Clone)]
pub struct LineageChange {
    /// Ancestor ids to remove from every affected page
    pub old_master_ids: Vec<i64>,
    /// Ancestor ids to add to every affected page
    pub new_master_ids: Vec<i64>,
    /// The page itself plus every page that records it as an ancestor
    pub affected_page_ids: Vec<i64>,
    /// Existing lineage rows of the affected pages referencing any id
    /// under change
    pub existing_rows: Vec<MasterPage>,
}

pub struct MasterPageService {
    repo: Arc<dyn MasterPageRepository>,
}

impl MasterPageService {
    pub fn new(repo: Arc<dyn MasterPageRepository>) -> Self {
        Self { repo }
    }

    /// Full ancestor chain a page would inherit from the given master:
    /// the master itself plus the master's own recorded ancestors.
    pub async fn get_page_master_page_ids(&self, master_page_id: i64) -> Result<Vec<i64>> {
        let mut ids = vec![master_page_id];
        for id in self.repo.lineage_ids(master_page_id).await? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// True when `candidate_master_id` has `page_id` somewhere in its own
    /// lineage, i.e. assigning it would close a cycle.
    pub async fn is_descendant(&self, page_id: i64, candidate_master_id: i64) -> Result<bool> {
        self.repo.has_master(candidate_master_id, page_id).await
    }

    /// Compute the lineage delta for changing the page's master assignment.
    ///
    /// Returns `None` when the assignment is not actually changing.
    /// `current_master_id` / `current_lineage` describe the page as loaded;
    /// `new_master_id` is `None` when switching to a plain layout.
    pub async fn plan_lineage_change(
        &self,
        page_id: i64,
        current_master_id: Option<i64>,
        current_lineage: &[MasterPage],
        new_master_id: Option<i64>,
    ) -> Result<Option<LineageChange>> {
        if current_master_id == new_master_id {
            return Ok(None);
        }

        let mut new_master_ids = match new_master_id {
            Some(master_id) => self.get_page_master_page_ids(master_id).await?,
            None => Vec::new(),
        };

        let mut old_master_ids: Vec<i64> = if current_master_id.is_some() {
            let mut ids = Vec::new();
            for row in current_lineage {
                if !ids.contains(&row.master_id) {
                    ids.push(row.master_id);
                }
            }
            ids
        } else {
            Vec::new()
        };

        // Ancestors shared between the old and new chain stay untouched
        let shared: Vec<i64> = new_master_ids
            .iter()
            .copied()
            .filter(|id| old_master_ids.contains(id))
            .collect();
        old_master_ids.retain(|id| !shared.contains(id));
        new_master_ids.retain(|id| !shared.contains(id));

        let mut updating_ids = new_master_ids.clone();
        for id in &old_master_ids {
            if !updating_ids.contains(id) {
                updating_ids.push(*id);
            }
        }

        let mut affected_page_ids = self.repo.pages_referencing(page_id).await?;
        if !affected_page_ids.contains(&page_id) {
            affected_page_ids.push(page_id);
        }

        let existing_rows = self
            .repo
            .rows_referencing(&affected_page_ids, &updating_ids)
            .await?;

        Ok(Some(LineageChange {
            old_master_ids,
            new_master_ids,
            affected_page_ids,
            existing_rows,
        }))
    }

    /// Apply a computed lineage delta inside the caller's transaction:
    /// per affected page, delete rows referencing removed ancestors and
    /// insert rows for added ancestors not already present.
    pub async fn apply_lineage_change(
        &self,
        conn: &mut SqliteConnection,
        change: &LineageChange,
    ) -> Result<()> {
        for &page_id in &change.affected_page_ids {
            for row in change
                .existing_rows
                .iter()
                .filter(|r| r.page_id == page_id && change.old_master_ids.contains(&r.master_id))
            {
                self.repo.delete_in(conn, row.id).await?;
            }

            for &master_id in &change.new_master_ids {
                let already_present = change
                    .existing_rows
                    .iter()
                    .any(|r| r.page_id == page_id && r.master_id == master_id);
                if !already_present {
                    self.repo.insert_in(conn, page_id, master_id).await?;
                }
            }
        }
        Ok(())
    }
}
