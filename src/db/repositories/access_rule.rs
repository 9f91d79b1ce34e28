//! Access rule repository

use crate::db::DbPool;
use crate::models::AccessRule;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;

#[async_trait]
pub trait AccessRuleRepository: Send + Sync {
    async fn list_for_page(&self, page_id: i64) -> Result<Vec<AccessRule>>;
    /// Replace the page's rule set wholesale inside the caller's transaction
    async fn replace_in(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
        rules: &[AccessRule],
    ) -> Result<()>;
}

pub struct SqlxAccessRuleRepository {
    pool: DbPool,
}

impl SqlxAccessRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn AccessRuleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AccessRuleRepository for SqlxAccessRuleRepository {
    async fn list_for_page(&self, page_id: i64) -> Result<Vec<AccessRule>> {
        let rows = sqlx::query(
            "SELECT id, page_id, identity, is_for_role, access_level \
             FROM access_rules WHERE page_id = ? ORDER BY identity",
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list access rules")?;

        rows.iter()
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
            .collect()
    }

    async fn replace_in(
        &self,
        conn: &mut SqliteConnection,
        page_id: i64,
        rules: &[AccessRule],
    ) -> Result<()> {
        sqlx::query("DELETE FROM access_rules WHERE page_id = ?")
            .bind(page_id)
            .execute(&mut *conn)
            .await
            .context("Failed to clear access rules")?;

        for rule in rules {
            sqlx::query(
                "INSERT INTO access_rules (page_id, identity, is_for_role, access_level) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(page_id)
            .bind(&rule.identity)
            .bind(rule.is_for_role)
            .bind(rule.access_level.to_string())
            .execute(&mut *conn)
            .await
            .context("Failed to insert access rule")?;
        }

        Ok(())
    }
}
