//! Page option service
//!
//! Reconciles a page's stored key-value options against the submitted set:
//! submitted keys are inserted or updated, stored keys missing from the
//! submission are removed.

use crate::db::repositories::PageOptionRepository;
use crate::models::{OptionValueInput, PageOption};
use anyhow::Result;
use sqlx::SqliteConnection;
use std::sync::Arc;

/// Computed option changes, applied inside the save transaction
#[derive(Debug, Clone, Default)]
pub struct OptionDiff {
    pub inserts: Vec<PageOption>,
    /// (option id, new value)
    pub updates: Vec<(i64, String)>,
    pub deletes: Vec<i64>,
}

impl OptionDiff {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

pub struct OptionService {
    repo: Arc<dyn PageOptionRepository>,
}

impl OptionService {
    pub fn new(repo: Arc<dyn PageOptionRepository>) -> Self {
        Self { repo }
    }

    /// Diff the submitted options against the stored set. Pure; duplicate
    /// submitted keys keep the last occurrence.
    pub fn reconcile(
        &self,
        page_id: i64,
        submitted: &[OptionValueInput],
        existing: &[PageOption],
    ) -> OptionDiff {
        let mut diff = OptionDiff::default();

        let mut wanted: Vec<(&str, &str)> = Vec::new();
        for input in submitted {
            if let Some(entry) = wanted.iter_mut().find(|(key, _)| *key == input.key) {
                entry.1 = &input.value;
            } else {
                wanted.push((&input.key, &input.value));
            }
        }

        for (key, value) in &wanted {
            match existing.iter().find(|o| o.key == *key) {
                Some(option) => {
                    if option.value != *value {
                        diff.updates.push((option.id, value.to_string()));
                    }
                }
                None => diff.inserts.push(PageOption::new(
                    page_id,
                    key.to_string(),
                    value.to_string(),
                )),
            }
        }

        for option in existing {
            if !wanted.iter().any(|(key, _)| *key == option.key) {
                diff.deletes.push(option.id);
            }
        }

        diff
    }

    /// Apply a computed diff inside the caller's transaction.
    pub async fn apply_in(&self, conn: &mut SqliteConnection, diff: &OptionDiff) -> Result<()> {
        for id in &diff.deletes {
            self.repo.delete_in(conn, *id).await?;
        }
        for (id, value) in &diff.updates {
            self.repo.update_value_in(conn, *id, value).await?;
        }
        for option in &diff.inserts {
            self.repo.insert_in(conn, option).await?;
        }
        Ok(())
    }

    pub async fn list_for_page(&self, page_id: i64) -> Result<Vec<PageOption>> {
        self.repo.list_for_page(page_id).await
    }
}
